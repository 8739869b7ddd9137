//! Ingestion window scanner: fetch a bounded slice of recent events, classify,
//! fingerprint, and record each candidate exactly once.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::classify::{classify_event, Candidate};
use crate::error::{EngineError, Result};
use crate::fingerprint::Fingerprint;
use crate::traits::{policy::PointPolicy, sink::MirrorSink, source::EventSource, store::PointsStore};
use crate::types::{
    config::ScanConfig,
    ledger::CalendarMonth,
    report::{CandidateOutcome, ScanDecision, ScanSummary},
    submission::{NewSubmission, RecordOutcome, ValidityStatus},
};

/// Scan the trailing window ending at `now`.
///
/// Only a store or source failure aborts the pass. Everything recorded before
/// the failure stays committed, and a retry over the same window re-detects
/// those events as already seen.
pub async fn scan_window<S, E, P, K>(
    store: &S,
    source: &E,
    policy: &P,
    sink: &K,
    config: &ScanConfig,
    now: DateTime<Utc>,
) -> Result<ScanSummary>
where
    S: PointsStore + ?Sized,
    E: EventSource + ?Sized,
    P: PointPolicy + ?Sized,
    K: MirrorSink + ?Sized,
{
    config.validate()?;
    let since = now
        .checked_sub_signed(config.window_span()?)
        .ok_or_else(|| EngineError::Config("scan window reaches before the earliest date".into()))?;
    let mut summary = ScanSummary::new(since);

    info!(channel = %config.channel, since = %since, "Scanning submission window");
    let events = source
        .fetch_events(&config.channel, since, config.limit)
        .await?;
    summary.events_scanned = events.len();

    let mut candidates: Vec<Candidate> = Vec::new();
    for event in &events {
        if event.created_at < since {
            debug!(event_id = %event.id, created_at = %event.created_at, "Dropping event outside window");
            summary.out_of_window += 1;
            continue;
        }

        let classified = classify_event(event);
        if classified.is_empty() {
            summary.ignored_events += 1;
            continue;
        }

        for err in classified.malformed {
            warn!(event_id = %event.id, error = %err, "Skipping malformed candidate");
            summary.record(CandidateOutcome {
                source_event_id: event.id.clone(),
                ambassador_id: event.author_id.clone(),
                fingerprint: None,
                decision: ScanDecision::Malformed {
                    reason: err.to_string(),
                },
            });
        }
        candidates.extend(classified.candidates);
    }

    // Earliest first, so the earliest copy within a batch becomes canonical
    candidates.sort_by(|a, b| {
        (a.submitted_at, &a.source_event_id).cmp(&(b.submitted_at, &b.source_event_id))
    });

    let period = CalendarMonth::of(now);
    for candidate in candidates {
        let event_id = candidate.source_event_id.clone();
        let ambassador_id = candidate.ambassador_id.clone();
        match ingest_candidate(store, policy, sink, candidate, period, now).await {
            Ok(outcome) => summary.record(outcome),
            Err(err) if err.is_batch_fatal() => return Err(err),
            Err(err) => {
                warn!(event_id = %event_id, error = %err, "Skipping candidate");
                summary.record(CandidateOutcome {
                    source_event_id: event_id,
                    ambassador_id,
                    fingerprint: None,
                    decision: ScanDecision::Malformed {
                        reason: err.to_string(),
                    },
                });
            }
        }
    }

    info!(
        events = summary.events_scanned,
        accepted = summary.accepted,
        pending = summary.pending,
        duplicates = summary.duplicates_skipped(),
        malformed = summary.malformed,
        points = summary.points_awarded,
        "Scan complete"
    );
    Ok(summary)
}

/// Fingerprint, price, and record one candidate.
async fn ingest_candidate<S, P, K>(
    store: &S,
    policy: &P,
    sink: &K,
    candidate: Candidate,
    period: CalendarMonth,
    now: DateTime<Utc>,
) -> Result<CandidateOutcome>
where
    S: PointsStore + ?Sized,
    P: PointPolicy + ?Sized,
    K: MirrorSink + ?Sized,
{
    let fingerprint = Fingerprint::of(&candidate.ambassador_id, &candidate.content);
    let kind = candidate.content.kind();

    let (points_awarded, validity_status) =
        match policy.value_for(kind, &candidate.platform, &candidate.post_type) {
            Some(points) => (points, ValidityStatus::Accepted),
            None => {
                let miss = EngineError::PolicyLookupMiss {
                    kind: kind.to_string(),
                    platform: candidate.platform.clone(),
                    post_type: candidate.post_type.clone(),
                };
                warn!(event_id = %candidate.source_event_id, error = %miss, "Storing submission as pending");
                (0, ValidityStatus::Pending)
            }
        };

    let source_event_id = candidate.source_event_id.clone();
    let ambassador_id = candidate.ambassador_id.clone();
    let submission = NewSubmission {
        ambassador_id: candidate.ambassador_id,
        fingerprint: fingerprint.clone(),
        content: candidate.content,
        platform: candidate.platform,
        post_type: candidate.post_type,
        points_awarded,
        validity_status,
        submitted_at: candidate.submitted_at,
        source_event_id: candidate.source_event_id,
    };

    let decision = match store.record_and_credit(submission, period, now).await? {
        RecordOutcome::Accepted(row) => {
            let (credit, _) = row.provisional_credit(period);

            if let Err(err) = sink.submission_recorded(&row).await {
                warn!(submission_id = %row.id, error = %err, "Mirror sink rejected submission");
            }

            debug!(submission_id = %row.id, ambassador_id = %row.ambassador_id, points = credit, "Recorded submission");
            if row.is_credited() {
                ScanDecision::Accepted {
                    submission_id: row.id,
                    points: credit,
                }
            } else {
                ScanDecision::Pending {
                    submission_id: row.id,
                }
            }
        }
        RecordOutcome::Duplicate {
            recorded,
            canonical,
        } => {
            debug!(
                submission_id = %recorded.id,
                canonical_id = %canonical.id,
                "Recorded duplicate submission"
            );
            ScanDecision::Duplicate {
                submission_id: recorded.id,
                canonical_id: canonical.id,
            }
        }
        RecordOutcome::AlreadySeen(row) => ScanDecision::AlreadySeen {
            submission_id: row.id,
        },
    };

    Ok(CandidateOutcome {
        source_event_id,
        ambassador_id,
        fingerprint: Some(fingerprint),
        decision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesTable;
    use crate::stores::MemoryStore;
    use crate::testing::{MockEventSource, RecordingSink};
    use crate::traits::store::{LedgerStore, SubmissionStore};
    use crate::types::event::{Attachment, SourceEvent};
    use crate::types::submission::SubmissionFilter;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    fn event(id: &str, author: &str, hours_ago: i64, content: &str) -> SourceEvent {
        SourceEvent::new(id, author, now() - Duration::hours(hours_ago), content)
    }

    fn config() -> ScanConfig {
        ScanConfig::new("ambassadors")
    }

    #[tokio::test]
    async fn test_scan_accepts_and_credits() {
        let store = MemoryStore::new();
        let source = MockEventSource::new().with_events(vec![
            event("m1", "u1", 2, "new video https://youtu.be/abc"),
            event("m2", "u1", 1, "").with_attachment(Attachment::new("proof.png", 2048)),
        ]);
        let sink = RecordingSink::new();

        let summary = scan_window(&store, &source, &RulesTable::default(), &sink, &config(), now())
            .await
            .unwrap();

        assert_eq!(summary.events_scanned, 2);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.points_awarded, 18);
        assert_eq!(sink.recorded().len(), 2);

        let ledger = store.get_ledger("u1").await.unwrap().unwrap();
        assert_eq!(ledger.current_period_points, 18);
        assert_eq!(ledger.lifetime_points, 18);
    }

    #[tokio::test]
    async fn test_scan_passes_window_to_source() {
        let store = MemoryStore::new();
        let source = MockEventSource::new();

        scan_window(&store, &source, &RulesTable::default(), &RecordingSink::new(), &config(), now())
            .await
            .unwrap();

        let calls = source.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].channel, "ambassadors");
        assert_eq!(calls[0].since, now() - Duration::hours(7));
        assert_eq!(calls[0].limit, 500);
    }

    #[tokio::test]
    async fn test_scan_drops_events_the_source_should_have_filtered() {
        let store = MemoryStore::new();
        let source = MockEventSource::new()
            .ignoring_since()
            .with_events(vec![event("old", "u1", 8, "https://youtu.be/old")]);

        let summary = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config(),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(summary.events_scanned, 1);
        assert_eq!(summary.out_of_window, 1);
        assert_eq!(summary.accepted, 0);
        assert_eq!(store.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_earliest_in_batch_is_canonical() {
        let store = MemoryStore::new();
        // Source returns newest first
        let source = MockEventSource::new().with_events(vec![
            event("m2", "u1", 1, "https://youtu.be/abc"),
            event("m1", "u1", 3, "https://youtu.be/abc"),
        ]);

        let summary = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config(),
            now(),
        )
        .await
        .unwrap();
        assert_eq!((summary.accepted, summary.duplicates), (1, 1));

        let credited = store
            .submissions_for("u1", &SubmissionFilter::credited())
            .await
            .unwrap();
        assert_eq!(credited.len(), 1);
        assert_eq!(credited[0].source_event_id, "m1");
    }

    #[tokio::test]
    async fn test_policy_miss_is_pending() {
        let store = MemoryStore::new();
        let source =
            MockEventSource::new().with_events(vec![event("m1", "u1", 1, "https://example.com/post")]);

        let summary = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config(),
            now(),
        )
        .await
        .unwrap();
        assert_eq!((summary.accepted, summary.pending), (0, 1));

        let rows = store
            .submissions_for("u1", &SubmissionFilter::all())
            .await
            .unwrap();
        assert_eq!(rows[0].validity_status, ValidityStatus::Pending);
        assert_eq!(rows[0].points_awarded, 0);

        // Ledger row exists from first sight, but with nothing credited
        let ledger = store.get_ledger("u1").await.unwrap().unwrap();
        assert_eq!(ledger.lifetime_points, 0);
    }

    #[tokio::test]
    async fn test_malformed_candidates_do_not_abort() {
        let store = MemoryStore::new();
        let source = MockEventSource::new().with_events(vec![
            event("m1", "", 2, "https://youtu.be/orphan"),
            event("m2", "u1", 1, "chatting"),
            event("m3", "u1", 1, "https://youtu.be/ok"),
        ]);

        let summary = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config(),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.ignored_events, 1);
        assert_eq!(summary.accepted, 1);
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_submission() {
        let store = MemoryStore::new();
        let source =
            MockEventSource::new().with_events(vec![event("m1", "u1", 1, "https://youtu.be/abc")]);
        let sink = RecordingSink::new().failing();

        let summary = scan_window(&store, &source, &RulesTable::default(), &sink, &config(), now())
            .await
            .unwrap();

        assert_eq!(summary.accepted, 1);
        assert_eq!(store.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_window_before_earliest_date_is_config_error() {
        let store = MemoryStore::new();
        let source = MockEventSource::new();
        let ages = std::time::Duration::from_secs(400_000 * 365 * 24 * 3600);

        let err = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config().with_window(ages),
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_aborts() {
        let store = MemoryStore::new();
        let source = MockEventSource::new().failing();

        let err = scan_window(
            &store,
            &source,
            &RulesTable::default(),
            &RecordingSink::new(),
            &config(),
            now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Source(_)));
    }
}
