//! Tag validation.
//!
//! The decision is a fixed, short-circuiting sequence of checks; the first
//! one that matches decides the category:
//!
//! 1. no tag id                          → `NoTagSupplied` (lookup is never called)
//! 2. no record carries the tag          → `NotFound`
//! 3. no RFID info, or the tag is off    → `Inactive`
//! 4. application not `completed`        → `NotCompleted`
//! 5. `valid_until` strictly before now  → `Expired`
//! 6. otherwise                          → `Granted`

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::pass::{ApplicationStatus, VehiclePassRecord};
use crate::models::scan::{ScanCategory, ValidationOutcome};

/// Infrastructure failure while looking up a tag. Never a denial.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed pass record {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("lookup unavailable: {0}")]
    Unavailable(String),

    #[error("lookup task failed: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// "Find the vehicle pass assigned this tag" collaborator.
///
/// Must return `Ok(None)` rather than an error when nothing matches.
#[async_trait]
pub trait PassLookup: Send + Sync {
    async fn find_by_tag(&self, tag_id: &str) -> Result<Option<VehiclePassRecord>, LookupError>;

    /// Readiness probe for the backing store.
    async fn ping(&self) -> Result<(), LookupError> {
        Ok(())
    }
}

/// Decide the category for a record (or its absence) at `now`. Pure.
pub fn classify(record: Option<&VehiclePassRecord>, now: DateTime<Utc>) -> ValidationOutcome {
    let Some(record) = record else {
        return ValidationOutcome::without_record(ScanCategory::NotFound);
    };

    let category = match &record.rfid {
        None => ScanCategory::Inactive,
        Some(rfid) if !rfid.is_active => ScanCategory::Inactive,
        Some(_) if record.status != ApplicationStatus::Completed => ScanCategory::NotCompleted,
        // A tag expiring exactly at `now` is still valid.
        Some(rfid) if rfid.valid_until.is_some_and(|until| now > until) => ScanCategory::Expired,
        Some(_) => ScanCategory::Granted,
    };

    ValidationOutcome::with_record(category, record)
}

/// Validate `tag_id` against the pass store at `now`.
///
/// An absent or empty tag is decided without touching `lookup`. Lookup
/// faults are returned as errors, not folded into a denial.
pub async fn validate<L>(
    tag_id: Option<&str>,
    now: DateTime<Utc>,
    lookup: &L,
) -> Result<ValidationOutcome, LookupError>
where
    L: PassLookup + ?Sized,
{
    let tag_id = match tag_id {
        Some(t) if !t.is_empty() => t,
        _ => return Ok(ValidationOutcome::without_record(ScanCategory::NoTagSupplied)),
    };

    let record = lookup.find_by_tag(tag_id).await?;
    Ok(classify(record.as_ref(), now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pass::{RfidInfo, VehicleInfo};
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    fn record(
        status: ApplicationStatus,
        active: bool,
        valid_until: Option<DateTime<Utc>>,
    ) -> VehiclePassRecord {
        VehiclePassRecord {
            id: Uuid::new_v4(),
            status,
            vehicle: VehicleInfo {
                plate_number: "ABC-1234".into(),
                vehicle_type: "motorcycle".into(),
                driver_name: Some("J. Dela Cruz".into()),
            },
            rfid: Some(RfidInfo {
                tag_id: "E2800001".into(),
                is_active: active,
                valid_until,
                assigned_at: None,
            }),
            linked_user_id: None,
        }
    }

    struct CountingLookup {
        record: Option<VehiclePassRecord>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PassLookup for CountingLookup {
        async fn find_by_tag(&self, _tag_id: &str) -> Result<Option<VehiclePassRecord>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.record.clone())
        }
    }

    struct BrokenLookup;

    #[async_trait]
    impl PassLookup for BrokenLookup {
        async fn find_by_tag(&self, _tag_id: &str) -> Result<Option<VehiclePassRecord>, LookupError> {
            Err(LookupError::Unavailable("pool timed out".into()))
        }
    }

    #[test]
    fn test_missing_record_is_not_found_without_snapshot() {
        let outcome = classify(None, now());
        assert_eq!(outcome.category, ScanCategory::NotFound);
        assert!(outcome.vehicle.is_none());
        assert!(outcome.rfid_validity.is_none());
        assert!(outcome.application_id.is_none());
    }

    #[test]
    fn test_inactive_dominates_status_and_expiry() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Completed,
            ApplicationStatus::Rejected,
        ] {
            for until in [None, Some(now() - Duration::days(1)), Some(now() + Duration::days(1))] {
                let r = record(status, false, until);
                assert_eq!(classify(Some(&r), now()).category, ScanCategory::Inactive);
            }
        }
    }

    #[test]
    fn test_record_without_rfid_is_inactive() {
        let mut r = record(ApplicationStatus::Completed, true, None);
        r.rfid = None;
        let outcome = classify(Some(&r), now());
        assert_eq!(outcome.category, ScanCategory::Inactive);
        assert!(outcome.vehicle.is_some());
        assert!(outcome.rfid_validity.is_none());
    }

    #[test]
    fn test_not_completed_dominates_expiry() {
        for status in [
            ApplicationStatus::Pending,
            ApplicationStatus::Approved,
            ApplicationStatus::Rejected,
        ] {
            let r = record(status, true, Some(now() - Duration::days(30)));
            assert_eq!(classify(Some(&r), now()).category, ScanCategory::NotCompleted);
        }
    }

    #[test]
    fn test_expired_when_past_valid_until() {
        let r = record(ApplicationStatus::Completed, true, Some(now() - Duration::days(1)));
        let outcome = classify(Some(&r), now());
        assert_eq!(outcome.category, ScanCategory::Expired);
        assert_eq!(outcome.status_code(), 410);
        assert_eq!(outcome.vehicle.as_ref().unwrap().plate_number, "ABC-1234");
    }

    #[test]
    fn test_expiry_boundary_is_granted() {
        let r = record(ApplicationStatus::Completed, true, Some(now()));
        assert_eq!(classify(Some(&r), now()).category, ScanCategory::Granted);

        let r = record(ApplicationStatus::Completed, true, Some(now() - Duration::milliseconds(1)));
        assert_eq!(classify(Some(&r), now()).category, ScanCategory::Expired);
    }

    #[test]
    fn test_granted_without_expiry() {
        let r = record(ApplicationStatus::Completed, true, None);
        let outcome = classify(Some(&r), now());
        assert_eq!(outcome.category, ScanCategory::Granted);
        assert_eq!(outcome.error_code(), None);
        assert_eq!(outcome.application_id, Some(r.id));
    }

    #[test]
    fn test_classify_is_deterministic() {
        let r = record(ApplicationStatus::Completed, true, Some(now() + Duration::hours(2)));
        assert_eq!(classify(Some(&r), now()), classify(Some(&r), now()));
    }

    #[tokio::test]
    async fn test_absent_or_empty_tag_skips_lookup() {
        let lookup = CountingLookup {
            record: Some(record(ApplicationStatus::Completed, true, None)),
            calls: AtomicUsize::new(0),
        };

        let outcome = validate(None, now(), &lookup).await.unwrap();
        assert_eq!(outcome.category, ScanCategory::NoTagSupplied);
        let outcome = validate(Some(""), now(), &lookup).await.unwrap();
        assert_eq!(outcome.category, ScanCategory::NoTagSupplied);
        assert!(outcome.vehicle.is_none());

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_present_tag_looks_up_once() {
        let lookup = CountingLookup {
            record: None,
            calls: AtomicUsize::new(0),
        };
        let outcome = validate(Some("E2801234"), now(), &lookup).await.unwrap();
        assert_eq!(outcome.category, ScanCategory::NotFound);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_fault_propagates() {
        let err = validate(Some("E2800001"), now(), &BrokenLookup).await.unwrap_err();
        assert!(matches!(err, LookupError::Unavailable(_)));
    }
}
