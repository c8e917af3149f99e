use crate::infra::{midday, sample_providers, seed_marketplace, SAMPLE_ZIP};
use chrono::{NaiveDate, Utc};
use clap::Args;
use leadflow::distribution::{
    DistributionConfig, EstimatedValue, FixedClock, InMemoryMarketplace, LeadDistributionService,
    LeadItem, LeadLocation, LeadSubmission, RankedProvider, RecordingNotificationSink,
};
use leadflow::error::AppError;
use rust_decimal::Decimal;
use std::sync::Arc;

type DemoService = LeadDistributionService<InMemoryMarketplace, RecordingNotificationSink>;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// ZIP code of the sample pickup
    #[arg(long, default_value = SAMPLE_ZIP)]
    pub(crate) zip: String,
    /// Low end of the quoted price range
    #[arg(long, default_value = "600")]
    pub(crate) low: Decimal,
    /// High end of the quoted price range
    #[arg(long, default_value = "900")]
    pub(crate) high: Decimal,
    /// Flag the lead as urgent
    #[arg(long)]
    pub(crate) urgent: bool,
    /// Date the demo runs on (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the auto-assignment portion of the demo.
    #[arg(long)]
    pub(crate) skip_assignment: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        zip,
        low,
        high,
        urgent,
        today,
        skip_assignment,
    } = args;

    let now = today.and_then(midday).unwrap_or_else(Utc::now);
    let notifications = Arc::new(RecordingNotificationSink::default());
    let service: DemoService = LeadDistributionService::new(
        seed_marketplace(sample_providers())?,
        notifications.clone(),
        DistributionConfig::default(),
    )
    .with_clock(Arc::new(FixedClock(now)));

    let submission = LeadSubmission {
        location: LeadLocation::zip(&zip),
        estimated_value: Some(EstimatedValue::Range { low, high }),
        urgent,
        items: vec![
            LeadItem {
                item_type: "sectional sofa".to_string(),
                quantity: 1,
            },
            LeadItem {
                item_type: "box spring".to_string(),
                quantity: 2,
            },
        ],
    };

    println!("Lead distribution demo ({})", now.format("%Y-%m-%d %H:%M UTC"));
    let lead = match service.submit_lead(submission.clone()) {
        Ok(lead) => lead,
        Err(err) => {
            println!("  Quote rejected: {}", err);
            return Ok(());
        }
    };
    println!(
        "- Captured {} in {} | estimate {} | urgent {}",
        lead.id,
        zip,
        lead.point_estimate().unwrap_or_default(),
        lead.urgent
    );

    let ranking = service.rank_candidates(&lead.id)?;
    render_ranking(&ranking);

    let offers = service.distribute_lead(&lead.id)?;
    println!("\nFan-out: {} offers sent", offers.len());
    for offer in &offers {
        let bid = offer
            .bid_amount
            .map(|amount| amount.to_string())
            .unwrap_or_else(|| "manual quote".to_string());
        println!(
            "  {}. {} -> {} ({})",
            offer.priority, offer.id, offer.provider_id, bid
        );
    }
    for notification in notifications.delivered() {
        println!(
            "  notified {} (priority {}, typical reply {} min)",
            notification.provider_id, notification.priority, notification.estimated_response_minutes
        );
    }

    if skip_assignment {
        return Ok(());
    }

    println!("\nAuto-assignment for a second quote at the same address");
    let second = service.submit_lead(submission)?;
    let result = service.auto_assign(&second)?;
    println!("- {}: {}", second.id, result.summary());
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("  Assignment payload:\n{}", json),
        Err(err) => println!("  Assignment payload unavailable: {}", err),
    }

    Ok(())
}

fn render_ranking(ranking: &[RankedProvider]) {
    if ranking.is_empty() {
        println!("\nNo eligible providers serve this area");
        return;
    }
    println!("\nProvider ranking");
    for ranked in ranking {
        println!(
            "  #{} {} ({:?}) score {:.1}",
            ranked.rank,
            ranked.eligible.provider.business_name,
            ranked.eligible.provider.tier,
            ranked.score.total
        );
        for component in &ranked.score.components {
            println!(
                "    - {:?}: {:.1} x {:.1} = {:.1}",
                component.signal, component.points, component.weight, component.contribution
            );
        }
    }
}
