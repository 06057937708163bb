//! Per-account boosting configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::client::TitleId;

/// Upper bound on concurrently played titles accepted by the service.
pub const MAX_CONCURRENT_TITLES: usize = 32;

/// Upper bound for the boost interval (minutes).
pub const MAX_BOOST_INTERVAL: u32 = 720;

/// Boosting settings for one account.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BoostConfig {
    /// How many titles are boosted at once.
    pub max_concurrently_boosting_apps: usize,

    /// Lower bound of the jittered achieve interval (minutes).
    pub min_boost_interval: u32,

    /// Upper bound of the jittered achieve interval (minutes).
    pub max_boost_interval: u32,

    /// Minutes a title is boosted before it rests (0 = unlimited).
    pub boost_duration_per_app: u32,

    /// Minutes a title rests after its boost duration is used up.
    pub boost_rest_time_per_app: u32,

    /// Length of the daily rest window (minutes, starting 00:00 UTC).
    pub rest_time_per_day: u32,

    /// Skip titles with anti-cheat enabled.
    pub restrict_app_with_vac: bool,

    /// Skip titles that have DLC.
    pub restrict_app_with_dlc: bool,

    /// Skip titles by these developers.
    pub restrict_developers: HashSet<String>,

    /// Skip titles by these publishers.
    pub restrict_publishers: HashSet<String>,

    /// Titles that bypass every restriction except the blacklist.
    pub unrestricted_apps: HashSet<TitleId>,

    /// Titles never boosted on this account.
    pub blacklist: HashSet<TitleId>,

    /// Boost the idle queue when the account is idling.
    pub boost_hours_when_idle: bool,

    /// Cooldown after an achievement keeps failing (hours).
    pub stuck_cooldown_hours: u32,

    /// Cooldown after a failed play/commit call (minutes).
    pub commit_failure_cooldown_minutes: u32,

    /// Fixed pause between requests to the achievement service.
    pub request_delay_ms: u64,

    /// Tries per metadata/statistics lookup.
    pub lookup_retries: u32,

    /// Heartbeat delay while the session is unusable (minutes).
    pub disconnected_recheck_minutes: u32,

    /// How often owned titles are refetched (hours).
    pub ownership_refresh_hours: u32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            max_concurrently_boosting_apps: 1,
            min_boost_interval: 30,
            max_boost_interval: 60,
            boost_duration_per_app: 0,
            boost_rest_time_per_app: 600,
            rest_time_per_day: 0,
            restrict_app_with_vac: true,
            restrict_app_with_dlc: false,
            restrict_developers: HashSet::new(),
            restrict_publishers: HashSet::new(),
            unrestricted_apps: HashSet::new(),
            blacklist: HashSet::new(),
            boost_hours_when_idle: false,
            stuck_cooldown_hours: 12,
            commit_failure_cooldown_minutes: 5,
            request_delay_ms: 500,
            lookup_retries: 3,
            disconnected_recheck_minutes: 1,
            ownership_refresh_hours: 12,
        }
    }
}

fn clamp_warn<T>(name: &str, value: &mut T, lo: T, hi: T)
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let clamped = if *value < lo {
        lo
    } else if *value > hi {
        hi
    } else {
        return;
    };
    log::warn!("{} = {} is out of range [{}, {}], using {}", name, value, lo, hi, clamped);
    *value = clamped;
}

impl BoostConfig {
    /// Clamp every option into its valid range, warning for each change.
    pub fn sanitize(&mut self) {
        clamp_warn(
            "max-concurrently-boosting-apps",
            &mut self.max_concurrently_boosting_apps,
            1,
            MAX_CONCURRENT_TITLES,
        );
        clamp_warn("min-boost-interval", &mut self.min_boost_interval, 1, MAX_BOOST_INTERVAL);
        let min = self.min_boost_interval;
        clamp_warn("max-boost-interval", &mut self.max_boost_interval, min, MAX_BOOST_INTERVAL);
        clamp_warn("boost-rest-time-per-app", &mut self.boost_rest_time_per_app, 0, 7 * 24 * 60);
        clamp_warn("rest-time-per-day", &mut self.rest_time_per_day, 0, crate::time::MINUTES_PER_DAY);
        clamp_warn("stuck-cooldown-hours", &mut self.stuck_cooldown_hours, 1, 168);
        clamp_warn(
            "commit-failure-cooldown-minutes",
            &mut self.commit_failure_cooldown_minutes,
            1,
            24 * 60,
        );
        clamp_warn("request-delay-ms", &mut self.request_delay_ms, 100, 10_000);
        clamp_warn("lookup-retries", &mut self.lookup_retries, 1, 10);
        clamp_warn("disconnected-recheck-minutes", &mut self.disconnected_recheck_minutes, 1, 60);
        clamp_warn("ownership-refresh-hours", &mut self.ownership_refresh_hours, 1, 12);
    }

    /// Rest period after the per-app boost duration is used up.
    pub fn rest_time_per_app(&self) -> Duration {
        Duration::minutes(i64::from(self.boost_rest_time_per_app))
    }

    /// Cooldown after repeated failures on the same achievement.
    pub fn stuck_cooldown(&self) -> Duration {
        Duration::hours(i64::from(self.stuck_cooldown_hours))
    }

    /// Cooldown after the play/commit side effect failed.
    pub fn commit_failure_cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.commit_failure_cooldown_minutes))
    }

    /// Pause between requests to the achievement service.
    pub fn request_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_delay_ms)
    }

    /// Heartbeat delay while the session is unusable.
    pub fn disconnected_recheck(&self) -> Duration {
        Duration::minutes(i64::from(self.disconnected_recheck_minutes))
    }

    /// Maximum age of the owned-titles snapshot.
    pub fn ownership_refresh(&self) -> Duration {
        Duration::hours(i64::from(self.ownership_refresh_hours))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_already_sane() {
        let mut config = BoostConfig::default();
        let before = config.clone();
        config.sanitize();
        assert_eq!(config, before);
    }

    #[test]
    fn test_sanitize_clamps_concurrency() {
        let mut config = BoostConfig {
            max_concurrently_boosting_apps: 0,
            ..Default::default()
        };
        config.sanitize();
        assert_eq!(config.max_concurrently_boosting_apps, 1);

        config.max_concurrently_boosting_apps = 100;
        config.sanitize();
        assert_eq!(config.max_concurrently_boosting_apps, MAX_CONCURRENT_TITLES);
    }

    #[test]
    fn test_sanitize_max_interval_not_below_min() {
        let mut config = BoostConfig {
            min_boost_interval: 40,
            max_boost_interval: 10,
            ..Default::default()
        };
        config.sanitize();
        assert_eq!(config.min_boost_interval, 40);
        assert_eq!(config.max_boost_interval, 40);
    }

    #[test]
    fn test_sanitize_rest_per_day() {
        let mut config = BoostConfig {
            rest_time_per_day: 5000,
            ..Default::default()
        };
        config.sanitize();
        assert_eq!(config.rest_time_per_day, 1440);
    }

    #[test]
    fn test_parse_kebab_case_yaml() {
        let yaml = r#"
max-concurrently-boosting-apps: 3
min-boost-interval: 10
max-boost-interval: 20
restrict-app-with-vac: false
restrict-developers: ["Valve"]
unrestricted-apps: [730]
blacklist: [570]
"#;
        let config: BoostConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_concurrently_boosting_apps, 3);
        assert_eq!(config.min_boost_interval, 10);
        assert!(!config.restrict_app_with_vac);
        assert!(config.restrict_developers.contains("Valve"));
        assert!(config.unrestricted_apps.contains(&730));
        assert!(config.blacklist.contains(&570));
        // untouched fields fall back to defaults
        assert_eq!(config.stuck_cooldown_hours, 12);
    }

    #[test]
    fn test_durations() {
        let config = BoostConfig::default();
        assert_eq!(config.stuck_cooldown(), Duration::hours(12));
        assert_eq!(config.rest_time_per_app(), Duration::minutes(600));
        assert_eq!(config.request_delay(), std::time::Duration::from_millis(500));
    }
}
