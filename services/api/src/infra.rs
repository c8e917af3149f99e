use chrono::{DateTime, NaiveDate, Utc};
use leadflow::distribution::{
    AutoBidSettings, BidStrategy, InMemoryMarketplace, Provider, ProviderId, ProviderStatus,
    RepositoryError, ServiceArea, SubscriptionTier,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const SAMPLE_ZIP: &str = "78704";

fn austin(zip: &str, primary: bool) -> ServiceArea {
    ServiceArea {
        zip_code: zip.to_string(),
        city: Some("Austin".to_string()),
        state: Some("TX".to_string()),
        is_primary: primary,
    }
}

/// Sample Austin-area haulers covering every subscription tier and bid strategy.
pub(crate) fn sample_providers() -> Vec<Provider> {
    vec![
        Provider {
            id: ProviderId("prov-eastside".to_string()),
            business_name: "Eastside Haul Away".to_string(),
            status: ProviderStatus::Active,
            tier: SubscriptionTier::Elite,
            service_areas: vec![austin(SAMPLE_ZIP, true), austin("78702", false)],
            lead_credits: 40,
            avg_response_minutes: 12.0,
            acceptance_rate: 88.0,
            rating: 4.9,
            total_jobs: 640,
            auto_bid: AutoBidSettings {
                enabled: true,
                strategy: Some(BidStrategy::PercentageBelow),
                percentage: Some(dec!(12)),
                max_bid_amount: Some(dec!(90)),
                min_job_value: Some(dec!(150)),
                max_jobs_per_day: Some(6),
                ..AutoBidSettings::default()
            },
        },
        Provider {
            id: ProviderId("prov-bouldin".to_string()),
            business_name: "Bouldin Creek Junk Co".to_string(),
            status: ProviderStatus::Active,
            tier: SubscriptionTier::Professional,
            service_areas: vec![austin(SAMPLE_ZIP, false)],
            lead_credits: 15,
            avg_response_minutes: 25.0,
            acceptance_rate: 74.0,
            rating: 4.6,
            total_jobs: 210,
            auto_bid: AutoBidSettings {
                enabled: true,
                strategy: Some(BidStrategy::FixedAmount),
                fixed_amount: Some(dec!(325)),
                max_bid_amount: Some(dec!(60)),
                max_jobs_per_day: Some(4),
                ..AutoBidSettings::default()
            },
        },
        Provider {
            id: ProviderId("prov-zilker".to_string()),
            business_name: "Zilker Clean Sweep".to_string(),
            status: ProviderStatus::Active,
            tier: SubscriptionTier::Basic,
            service_areas: vec![austin(SAMPLE_ZIP, true)],
            lead_credits: 6,
            avg_response_minutes: 45.0,
            acceptance_rate: 61.0,
            rating: 4.2,
            total_jobs: 38,
            auto_bid: AutoBidSettings::default(),
        },
        Provider {
            id: ProviderId("prov-mueller".to_string()),
            business_name: "Mueller Moving & Hauling".to_string(),
            status: ProviderStatus::Suspended,
            tier: SubscriptionTier::Professional,
            service_areas: vec![austin(SAMPLE_ZIP, false)],
            lead_credits: 22,
            avg_response_minutes: 18.0,
            acceptance_rate: 80.0,
            rating: 4.4,
            total_jobs: 150,
            auto_bid: AutoBidSettings::default(),
        },
    ]
}

pub(crate) fn seed_marketplace(
    providers: Vec<Provider>,
) -> Result<Arc<InMemoryMarketplace>, RepositoryError> {
    let store = Arc::new(InMemoryMarketplace::new());
    for provider in providers {
        store.upsert_provider(provider)?;
    }
    Ok(store)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

/// Midday UTC on the given date, so daily capacity lands on that calendar day.
pub(crate) fn midday(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(12, 0, 0).map(|naive| naive.and_utc())
}
