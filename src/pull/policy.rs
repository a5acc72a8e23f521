use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

use crate::storage::Feed;

/// Minimum time between two scheduled pulls of the same feed.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Why a feed update was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Suspended,
    LastUpdateFailed,
    TooSoon,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Suspended => "user suspended feed updates",
            SkipReason::LastUpdateFailed => "last update failed",
            SkipReason::TooSoon => "feed was updated too recently",
        };
        f.write_str(reason)
    }
}

/// What to do with a feed on this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fetch,
    Skip(SkipReason),
}

impl Decision {
    /// Apply a caller's force flag. Forcing bypasses
    /// [`SkipReason::LastUpdateFailed`] and [`SkipReason::TooSoon`], never
    /// [`SkipReason::Suspended`].
    pub fn with_force(self, force: bool) -> Self {
        match self {
            Decision::Skip(SkipReason::Suspended) => self,
            Decision::Skip(_) if force => Decision::Fetch,
            other => other,
        }
    }

    pub fn skip_reason(self) -> Option<SkipReason> {
        match self {
            Decision::Fetch => None,
            Decision::Skip(reason) => Some(reason),
        }
    }
}

/// Decide whether `feed` should be fetched at `now`.
///
/// Rules, first match wins:
/// 1. suspended feeds are skipped
/// 2. feeds whose last attempt failed are skipped
/// 3. feeds touched less than `interval` ago are skipped
/// 4. everything else is fetched
///
/// A feed touched exactly `interval` ago is fetched. An `updated_at` in the
/// future (clock skew) counts as too soon.
pub fn decide(feed: &Feed, now: DateTime<Utc>, interval: Duration) -> Decision {
    if feed.suspended {
        return Decision::Skip(SkipReason::Suspended);
    }
    if feed.failure.is_failed() {
        return Decision::Skip(SkipReason::LastUpdateFailed);
    }

    let too_soon = match now.signed_duration_since(feed.updated_at).to_std() {
        Ok(elapsed) => elapsed < interval,
        Err(_) => true,
    };
    if too_soon {
        return Decision::Skip(SkipReason::TooSoon);
    }

    Decision::Fetch
}

/// [`decide`] with the force flag applied, reduced to a yes/no.
pub fn should_fetch(feed: &Feed, now: DateTime<Utc>, interval: Duration, force: bool) -> bool {
    decide(feed, now, interval).with_force(force) == Decision::Fetch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FailureState, RequestOptions};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn feed(suspended: bool, failure: FailureState, minutes_ago: i64) -> Feed {
        Feed {
            id: 7,
            name: Some("Test".into()),
            link: Some("https://example.com/rss".into()),
            last_build: None,
            failure,
            suspended,
            updated_at: now() - chrono::Duration::minutes(minutes_ago),
            request_options: RequestOptions::default(),
        }
    }

    #[test]
    fn test_suspended_feed_skips() {
        let f = feed(true, FailureState::Succeeded, 0);
        assert_eq!(
            decide(&f, now(), DEFAULT_INTERVAL),
            Decision::Skip(SkipReason::Suspended)
        );
    }

    #[test]
    fn test_failed_feed_skips() {
        let f = feed(false, FailureState::Failed("dummy previous error".into()), 0);
        assert_eq!(
            decide(&f, now(), DEFAULT_INTERVAL),
            Decision::Skip(SkipReason::LastUpdateFailed)
        );
    }

    #[test]
    fn test_recently_updated_feed_skips() {
        let f = feed(false, FailureState::Succeeded, 15);
        assert_eq!(
            decide(&f, now(), DEFAULT_INTERVAL),
            Decision::Skip(SkipReason::TooSoon)
        );
    }

    #[test]
    fn test_stale_feed_with_empty_failure_fetches() {
        let f = feed(false, FailureState::Succeeded, 45);
        assert_eq!(decide(&f, now(), DEFAULT_INTERVAL), Decision::Fetch);
    }

    #[test]
    fn test_stale_feed_with_no_recorded_failure_fetches() {
        let f = feed(false, FailureState::NotRecorded, 45);
        assert_eq!(decide(&f, now(), DEFAULT_INTERVAL), Decision::Fetch);
    }

    #[test]
    fn test_failed_stale_feed_fetches_only_when_forced() {
        let f = feed(false, FailureState::Failed("boom".into()), 45);
        let decision = decide(&f, now(), DEFAULT_INTERVAL);
        assert_eq!(decision, Decision::Skip(SkipReason::LastUpdateFailed));
        assert_eq!(decision.with_force(false), decision);
        assert_eq!(decision.with_force(true), Decision::Fetch);
    }

    #[test]
    fn test_interval_boundary_fetches() {
        let f = feed(false, FailureState::Succeeded, 30);
        assert_eq!(decide(&f, now(), DEFAULT_INTERVAL), Decision::Fetch);

        let just_inside = Feed {
            updated_at: now() - chrono::Duration::minutes(30) + chrono::Duration::seconds(1),
            ..f
        };
        assert_eq!(
            decide(&just_inside, now(), DEFAULT_INTERVAL),
            Decision::Skip(SkipReason::TooSoon)
        );
    }

    #[test]
    fn test_future_updated_at_is_too_soon() {
        let f = feed(false, FailureState::Succeeded, -5);
        assert_eq!(
            decide(&f, now(), DEFAULT_INTERVAL),
            Decision::Skip(SkipReason::TooSoon)
        );
    }

    #[test]
    fn test_force_never_overrides_suspension() {
        let decision = Decision::Skip(SkipReason::Suspended);
        assert_eq!(decision.with_force(true), decision);
        assert_eq!(decision.skip_reason(), Some(SkipReason::Suspended));
        assert_eq!(Decision::Fetch.skip_reason(), None);
    }

    #[test]
    fn test_should_fetch() {
        let recent = feed(false, FailureState::Succeeded, 5);
        assert!(!should_fetch(&recent, now(), DEFAULT_INTERVAL, false));
        assert!(should_fetch(&recent, now(), DEFAULT_INTERVAL, true));

        let suspended = feed(true, FailureState::NotRecorded, 90);
        assert!(!should_fetch(&suspended, now(), DEFAULT_INTERVAL, true));
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(
            SkipReason::Suspended.to_string(),
            "user suspended feed updates"
        );
        assert_eq!(SkipReason::LastUpdateFailed.to_string(), "last update failed");
        assert_eq!(
            SkipReason::TooSoon.to_string(),
            "feed was updated too recently"
        );
    }

    fn failure_strategy() -> impl Strategy<Value = FailureState> {
        prop_oneof![
            Just(FailureState::NotRecorded),
            Just(FailureState::Succeeded),
            "[a-z ]{1,20}".prop_map(FailureState::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_suspended_always_skips(
            failure in failure_strategy(),
            minutes_ago in -120i64..10_000,
            force in any::<bool>(),
        ) {
            let f = feed(true, failure, minutes_ago);
            prop_assert_eq!(
                decide(&f, now(), DEFAULT_INTERVAL).with_force(force),
                Decision::Skip(SkipReason::Suspended)
            );
        }

        #[test]
        fn prop_failed_skips_unless_forced(
            message in "[a-z]{1,20}",
            minutes_ago in -120i64..10_000,
            force in any::<bool>(),
        ) {
            let f = feed(false, FailureState::Failed(message), minutes_ago);
            let expected = if force {
                Decision::Fetch
            } else {
                Decision::Skip(SkipReason::LastUpdateFailed)
            };
            prop_assert_eq!(decide(&f, now(), DEFAULT_INTERVAL).with_force(force), expected);
        }

        #[test]
        fn prop_recent_skips_unless_forced(
            seconds_ago in 0i64..(30 * 60),
            ok in prop_oneof![Just(FailureState::NotRecorded), Just(FailureState::Succeeded)],
            force in any::<bool>(),
        ) {
            let f = Feed {
                updated_at: now() - chrono::Duration::seconds(seconds_ago),
                ..feed(false, ok, 0)
            };
            let expected = if force {
                Decision::Fetch
            } else {
                Decision::Skip(SkipReason::TooSoon)
            };
            prop_assert_eq!(decide(&f, now(), DEFAULT_INTERVAL).with_force(force), expected);
        }
    }
}
