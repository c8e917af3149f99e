use std::sync::Arc;

use chrono::Duration;

use super::common::*;
use crate::distribution::domain::{DistributionStatus, JobStatus, LeadStatus, SubscriptionTier};
use crate::distribution::memory::{InMemoryMarketplace, RecordingNotificationSink};
use crate::distribution::repository::{DistributionLedger, LeadStore, RepositoryError};
use crate::distribution::{
    DistributionConfig, DistributionError, DistributionId, DistributionRecord, FixedClock,
    LeadDistributionService, ProviderResponse, ValidationError,
};
use rust_decimal_macros::dec;

fn offered(estimate: rust_decimal::Decimal) -> (Arc<InMemoryMarketplace>, Vec<DistributionRecord>) {
    let store = marketplace(vec![
        percentage_bidder("elite", dec!(10)),
        fixed_bidder("fixed", dec!(380)),
        provider("manual", SubscriptionTier::Professional),
    ]);
    let (service, _) = build_service(store.clone());
    let lead = service.submit_lead(submission(estimate)).expect("lead stored");
    let sent = service.distribute_lead(&lead.id).expect("distributed");
    (store, sent)
}

fn offer_for<'a>(sent: &'a [DistributionRecord], provider: &str) -> &'a DistributionRecord {
    sent.iter()
        .find(|record| record.provider_id.0 == provider)
        .expect("provider offered")
}

#[test]
fn viewing_is_recorded_once() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());
    let offer = offer_for(&sent, "elite");

    let viewed = service.mark_viewed(&offer.id).expect("viewed");
    assert_eq!(viewed.status, DistributionStatus::Viewed);
    assert_eq!(viewed.viewed_at, Some(now()));

    let again = service.mark_viewed(&offer.id).expect("repeat view");
    assert_eq!(again, viewed);
    let stored = store
        .fetch_distribution(&offer.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, DistributionStatus::Viewed);
}

#[test]
fn decline_closes_only_that_offer() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());
    let offer = offer_for(&sent, "fixed");

    let outcome = service
        .respond(&offer.id, ProviderResponse::Decline)
        .expect("declined");
    assert_eq!(outcome.distribution.status, DistributionStatus::Declined);
    assert_eq!(outcome.distribution.responded_at, Some(now()));
    assert!(outcome.job.is_none());

    let lead = store
        .fetch_lead(&offer.lead_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(lead.status, LeadStatus::Sent);
}

#[test]
fn accepting_uses_the_recorded_bid_and_books_the_job() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());
    let offer = offer_for(&sent, "elite");
    service.mark_viewed(&offer.id).expect("viewed");

    let outcome = service
        .respond(&offer.id, ProviderResponse::Accept { price: None })
        .expect("accepted");

    assert_eq!(outcome.distribution.status, DistributionStatus::Accepted);
    let job = outcome.job.expect("job booked");
    assert_eq!(job.final_price, dec!(720));
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.provider_id, offer.provider_id);

    let lead = store
        .fetch_lead(&offer.lead_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(lead.status, LeadStatus::Accepted);
}

#[test]
fn manual_acceptance_falls_back_to_quoted_price_then_estimate() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());

    let quoted = service
        .respond(
            &offer_for(&sent, "manual").id,
            ProviderResponse::Accept {
                price: Some(dec!(655.555)),
            },
        )
        .expect("accepted");
    assert_eq!(quoted.job.expect("job").final_price, dec!(655.56));

    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store);
    let estimated = service
        .respond(
            &offer_for(&sent, "manual").id,
            ProviderResponse::Accept { price: None },
        )
        .expect("accepted");
    assert_eq!(estimated.job.expect("job").final_price, dec!(800));
}

#[test]
fn non_positive_price_is_rejected() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store);

    assert!(matches!(
        service.respond(
            &offer_for(&sent, "manual").id,
            ProviderResponse::Accept {
                price: Some(dec!(0))
            },
        ),
        Err(DistributionError::Validation(ValidationError::NonPositivePrice(_)))
    ));
}

#[test]
fn only_the_first_acceptance_wins() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());

    service
        .respond(
            &offer_for(&sent, "elite").id,
            ProviderResponse::Accept { price: None },
        )
        .expect("first accept");
    let late = service.respond(
        &offer_for(&sent, "fixed").id,
        ProviderResponse::Accept { price: None },
    );

    assert!(matches!(
        late,
        Err(DistributionError::Repository(
            RepositoryError::StaleLeadStatus {
                expected: LeadStatus::Sent,
                found: LeadStatus::Accepted,
            }
        ))
    ));
    let late_offer = store
        .fetch_distribution(&offer_for(&sent, "fixed").id)
        .expect("fetch")
        .expect("present");
    assert_eq!(late_offer.status, DistributionStatus::Sent);
    assert_eq!(store.jobs_for_lead(&late_offer.lead_id).expect("jobs").len(), 1);

    assert!(matches!(
        service.distribute_lead(&late_offer.lead_id),
        Err(DistributionError::LeadClosed { .. })
    ));
}

#[test]
fn closed_offers_cannot_change() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store);
    let offer = offer_for(&sent, "fixed");
    service
        .respond(&offer.id, ProviderResponse::Decline)
        .expect("declined");

    match service.mark_viewed(&offer.id) {
        Err(DistributionError::InvalidTransition { from, to }) => {
            assert_eq!(from, DistributionStatus::Declined);
            assert_eq!(to, DistributionStatus::Viewed);
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
    assert!(matches!(
        service.respond(&offer.id, ProviderResponse::Accept { price: None }),
        Err(DistributionError::InvalidTransition { .. })
    ));
    assert!(matches!(
        service.mark_viewed(&DistributionId("dist-missing".to_string())),
        Err(DistributionError::DistributionNotFound(_))
    ));
}

#[test]
fn stale_offers_expire_after_the_response_window() {
    let (store, sent) = offered(dec!(800));
    let (service, _) = build_service(store.clone());
    service
        .respond(&offer_for(&sent, "fixed").id, ProviderResponse::Decline)
        .expect("declined");

    let later = |minutes: i64| {
        LeadDistributionService::new(
            store.clone(),
            Arc::new(RecordingNotificationSink::default()),
            DistributionConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(now() + Duration::minutes(minutes))))
    };

    assert!(later(60).expire_stale().expect("sweep").is_empty());

    let expired = later(61).expire_stale().expect("sweep");
    assert_eq!(expired.len(), 2);
    assert!(expired
        .iter()
        .all(|record| record.status == DistributionStatus::Expired));

    let statuses: Vec<_> = store
        .distributions_for(&sent[0].lead_id)
        .expect("list")
        .into_iter()
        .map(|record| (record.provider_id.0, record.status))
        .collect();
    assert!(statuses.contains(&("fixed".to_string(), DistributionStatus::Declined)));
    assert!(later(120).expire_stale().expect("sweep").is_empty());
}

fn interleaved_offers() -> (
    InMemoryMarketplace,
    Arc<InterleavingMarketplace>,
    Vec<DistributionRecord>,
) {
    let inner = InMemoryMarketplace::new();
    for provider in [
        percentage_bidder("elite", dec!(10)),
        fixed_bidder("fixed", dec!(380)),
        provider("manual", SubscriptionTier::Professional),
    ] {
        inner.upsert_provider(provider).expect("seed");
    }
    let store = Arc::new(InterleavingMarketplace::wrapping(&inner));
    let (service, _) = build_service(store.clone());
    let lead = service.submit_lead(submission(dec!(800))).expect("lead stored");
    let sent = service.distribute_lead(&lead.id).expect("distributed");
    (inner, store, sent)
}

fn service_at(
    store: Arc<InMemoryMarketplace>,
    minutes_later: i64,
) -> LeadDistributionService<InMemoryMarketplace, RecordingNotificationSink> {
    LeadDistributionService::new(
        store,
        Arc::new(RecordingNotificationSink::default()),
        DistributionConfig::default(),
    )
    .with_clock(Arc::new(FixedClock(now() + Duration::minutes(minutes_later))))
}

#[test]
fn a_late_view_never_overwrites_an_acceptance() {
    let (inner, store, sent) = interleaved_offers();
    let offer = offer_for(&sent, "elite").clone();
    let (service, _) = build_service(store.clone());

    let rival = service_at(Arc::new(inner.clone()), 0);
    let accepted_id = offer.id.clone();
    store.before_next_write(move || {
        rival
            .respond(&accepted_id, ProviderResponse::Accept { price: None })
            .expect("rival accepts first");
    });

    match service.mark_viewed(&offer.id) {
        Err(DistributionError::Repository(RepositoryError::StaleDistributionStatus {
            expected,
            found,
        })) => {
            assert_eq!(expected, DistributionStatus::Sent);
            assert_eq!(found, DistributionStatus::Accepted);
        }
        other => panic!("expected stale status, got {other:?}"),
    }

    let stored = inner
        .fetch_distribution(&offer.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, DistributionStatus::Accepted);
    assert_eq!(inner.jobs_for_lead(&offer.lead_id).expect("jobs").len(), 1);
}

#[test]
fn an_expired_offer_cannot_be_accepted() {
    let (inner, store, sent) = interleaved_offers();
    let offer = offer_for(&sent, "fixed").clone();
    let (service, _) = build_service(store.clone());

    let sweeper = service_at(Arc::new(inner.clone()), 61);
    store.before_next_write(move || {
        assert_eq!(sweeper.expire_stale().expect("sweep").len(), 3);
    });

    assert!(matches!(
        service.respond(&offer.id, ProviderResponse::Accept { price: None }),
        Err(DistributionError::Repository(
            RepositoryError::StaleDistributionStatus {
                expected: DistributionStatus::Sent,
                found: DistributionStatus::Expired,
            }
        ))
    ));

    let stored = inner
        .fetch_distribution(&offer.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, DistributionStatus::Expired);
    assert!(inner.jobs_for_lead(&offer.lead_id).expect("jobs").is_empty());
    let lead = inner
        .fetch_lead(&offer.lead_id)
        .expect("fetch")
        .expect("present");
    assert_eq!(lead.status, LeadStatus::Sent);
}

#[test]
fn expiry_sweep_skips_offers_answered_mid_sweep() {
    let (inner, store, sent) = interleaved_offers();
    let last = sent
        .iter()
        .max_by(|left, right| left.id.cmp(&right.id))
        .expect("offers sent")
        .clone();

    let responder = service_at(Arc::new(inner.clone()), 61);
    let declined_id = last.id.clone();
    store.before_next_write(move || {
        responder
            .respond(&declined_id, ProviderResponse::Decline)
            .expect("decline lands first");
    });

    let sweeper = LeadDistributionService::new(
        store.clone(),
        Arc::new(RecordingNotificationSink::default()),
        DistributionConfig::default(),
    )
    .with_clock(Arc::new(FixedClock(now() + Duration::minutes(61))));
    let expired = sweeper.expire_stale().expect("sweep");

    assert_eq!(expired.len(), 2);
    assert!(expired.iter().all(|record| record.id != last.id));
    let stored = inner
        .fetch_distribution(&last.id)
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, DistributionStatus::Declined);
}
