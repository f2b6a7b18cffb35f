//! Timezone resolution for schedule evaluation.
//!
//! Schedules carry a timezone name that is resolved lazily and cached for
//! the lifetime of the process. Unknown names never fail an evaluation:
//! the resolver hands back the caller's fallback location instead and the
//! failure is not cached, so a later fix to the tz database is picked up.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, ScheduleError};
use crate::segment::seconds_of_day;

static GLOBAL_RESOLVER: Lazy<CachingResolver> = Lazy::new(CachingResolver::default);

/// Process-wide resolver backed by the bundled tz database.
pub fn global_resolver() -> &'static CachingResolver {
    &GLOBAL_RESOLVER
}

/// A resolved timezone: either an IANA zone or a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Named(Tz),
    Fixed(FixedOffset),
}

impl Location {
    pub fn utc() -> Self {
        Location::Fixed(Utc.fix())
    }

    /// The fixed offset a timestamp was expressed in.
    pub fn of<T: TimeZone>(at: &DateTime<T>) -> Self {
        Location::Fixed(at.offset().fix())
    }

    /// Wall-clock weekday and seconds-of-day of `instant` in this location.
    pub fn clock_at(&self, instant: DateTime<Utc>) -> LocalClock {
        let local = match self {
            Location::Named(tz) => instant.with_timezone(tz).naive_local(),
            Location::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        };
        LocalClock {
            weekday: local.weekday(),
            seconds_of_day: seconds_of_day(local.time()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Named(tz) => write!(f, "{}", tz.name()),
            Location::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

impl FromStr for Location {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        parse_location(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub weekday: Weekday,
    pub seconds_of_day: i64,
}

impl LocalClock {
    /// Day index with Sunday = 0, matching `WeeklySchedule::day`.
    pub fn day_index(&self) -> i64 {
        i64::from(self.weekday.num_days_from_sunday())
    }
}

/// Parse `UTC`, a fixed offset (`-05:00`, `+0530`, `UTC+01`) or an IANA name.
///
/// Offsets follow the ISO-8601 sign convention (east of Greenwich is
/// positive), unlike the POSIX-style `Etc/GMT+5` zone names, which are
/// handed to the tz database untouched.
pub fn parse_location(name: &str) -> Result<Location> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::UnknownTimezone(name.to_string()));
    }

    let upper = trimmed.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
        return Ok(Location::utc());
    }

    let offset = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);
    if offset.starts_with('+') || offset.starts_with('-') {
        return parse_fixed_offset(offset)
            .map(Location::Fixed)
            .ok_or_else(|| ScheduleError::InvalidOffset(trimmed.to_string()));
    }

    trimmed
        .parse::<Tz>()
        .map(Location::Named)
        .map_err(|_| ScheduleError::UnknownTimezone(trimmed.to_string()))
}

fn parse_fixed_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first().copied()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }

    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "00"),
    };

    let is_field = |s: &str| (1..=2).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit());
    if !is_field(hours) || !is_field(minutes) {
        return None;
    }

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// What the resolver does when a timezone name cannot be loaded.
///
/// Both policies fall back to the caller's location; they only differ in
/// how loudly the fallback is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    #[default]
    Silent,
    Warn,
}

impl FromStr for FallbackPolicy {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(FallbackPolicy::Silent),
            "warn" => Ok(FallbackPolicy::Warn),
            other => Err(ScheduleError::Configuration(format!(
                "unknown fallback_policy '{}' (expected 'silent' or 'warn')",
                other
            ))),
        }
    }
}

/// Loads a timezone by name. Swapped out in tests to count lookups.
pub trait ZoneLoader: Send + Sync {
    fn load(&self, name: &str) -> Result<Location>;
}

/// Loader backed by the tz database compiled into `chrono-tz`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TzDatabaseLoader;

impl ZoneLoader for TzDatabaseLoader {
    fn load(&self, name: &str) -> Result<Location> {
        parse_location(name)
    }
}

/// Maps a schedule's timezone name to a location.
///
/// Implementations must never fail: an empty or unusable name yields
/// `fallback`.
pub trait TimezoneResolver: Send + Sync {
    fn resolve(&self, name: &str, fallback: Location) -> Location;
}

impl<R: TimezoneResolver + ?Sized> TimezoneResolver for &R {
    fn resolve(&self, name: &str, fallback: Location) -> Location {
        (**self).resolve(name, fallback)
    }
}

impl<R: TimezoneResolver + ?Sized> TimezoneResolver for Arc<R> {
    fn resolve(&self, name: &str, fallback: Location) -> Location {
        (**self).resolve(name, fallback)
    }
}

/// Resolver with a lazily populated, never evicted concurrent cache.
///
/// Two threads racing on the same new name may both load it; the entries
/// are identical so the last insert winning is harmless.
pub struct CachingResolver<L: ZoneLoader = TzDatabaseLoader> {
    loader: L,
    cache: DashMap<String, Location>,
    policy: FallbackPolicy,
}

impl<L: ZoneLoader> CachingResolver<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: DashMap::new(),
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    pub fn cached(&self, name: &str) -> Option<Location> {
        self.cache.get(name).map(|entry| *entry.value())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// View of this cache that logs fallbacks under `policy`.
    pub fn with_fallback_policy(&self, policy: FallbackPolicy) -> PolicyResolver<'_, L> {
        PolicyResolver {
            inner: self,
            policy,
        }
    }

    fn resolve_logged(&self, name: &str, fallback: Location, policy: FallbackPolicy) -> Location {
        if name.is_empty() {
            return fallback;
        }
        if let Some(location) = self.cached(name) {
            return location;
        }

        match self.loader.load(name) {
            Ok(location) => {
                debug!("cached timezone {} as {}", name, location);
                self.cache.insert(name.to_string(), location);
                location
            }
            Err(err) => {
                match policy {
                    FallbackPolicy::Silent => {
                        debug!("timezone fallback to {}: {}", fallback, err)
                    }
                    FallbackPolicy::Warn => {
                        warn!("timezone fallback to {}: {}", fallback, err)
                    }
                }
                fallback
            }
        }
    }
}

impl Default for CachingResolver<TzDatabaseLoader> {
    fn default() -> Self {
        Self::new(TzDatabaseLoader)
    }
}

impl<L: ZoneLoader> fmt::Debug for CachingResolver<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachingResolver")
            .field("cached", &self.cache.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl<L: ZoneLoader> TimezoneResolver for CachingResolver<L> {
    fn resolve(&self, name: &str, fallback: Location) -> Location {
        self.resolve_logged(name, fallback, self.policy)
    }
}

/// Borrowed view of a [`CachingResolver`] with its own fallback policy.
///
/// Shares the underlying cache, so engines with different policies still
/// fill and read the one process-wide cache.
pub struct PolicyResolver<'a, L: ZoneLoader = TzDatabaseLoader> {
    inner: &'a CachingResolver<L>,
    policy: FallbackPolicy,
}

impl<L: ZoneLoader> PolicyResolver<'_, L> {
    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }
}

impl<L: ZoneLoader> fmt::Debug for PolicyResolver<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyResolver")
            .field("inner", self.inner)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<L: ZoneLoader> TimezoneResolver for PolicyResolver<'_, L> {
    fn resolve(&self, name: &str, fallback: Location) -> Location {
        self.inner.resolve_logged(name, fallback, self.policy)
    }
}

/// The instant under evaluation together with its fallback location.
///
/// `unix` is kept alongside the calendar form because date-range bounds are
/// compared against raw unix seconds. `utc` is `None` only for unix values
/// outside chrono's representable range; such instants match no segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleInstant {
    pub unix: i64,
    pub utc: Option<DateTime<Utc>>,
    pub fallback: Location,
}

impl ScheduleInstant {
    /// Evaluate `at`, falling back to the offset it was expressed in.
    pub fn from_datetime<T: TimeZone>(at: &DateTime<T>) -> Self {
        Self {
            unix: at.timestamp(),
            utc: Some(at.with_timezone(&Utc)),
            fallback: Location::of(at),
        }
    }

    /// Evaluate a raw unix-seconds instant, falling back to UTC.
    pub fn from_unix(unix: i64) -> Self {
        Self {
            unix,
            utc: DateTime::<Utc>::from_timestamp(unix, 0),
            fallback: Location::utc(),
        }
    }

    pub fn with_fallback(mut self, fallback: Location) -> Self {
        self.fallback = fallback;
        self
    }

    /// Local clock in the schedule's timezone, resolved through `resolver`.
    pub fn clock_in<R: TimezoneResolver + ?Sized>(
        &self,
        resolver: &R,
        timezone: &str,
    ) -> Option<LocalClock> {
        let utc = self.utc?;
        Some(resolver.resolve(timezone, self.fallback).clock_at(utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl ZoneLoader for CountingLoader {
        fn load(&self, name: &str) -> Result<Location> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            parse_location(name)
        }
    }

    fn offset(secs: i32) -> Location {
        Location::Fixed(FixedOffset::east_opt(secs).unwrap())
    }

    #[test]
    fn test_parse_utc_aliases() {
        for name in ["UTC", "utc", "GMT", "Z"] {
            assert_eq!(parse_location(name).unwrap(), Location::utc());
        }
    }

    #[test]
    fn test_parse_fixed_offsets() {
        assert_eq!(parse_location("-05:00").unwrap(), offset(-5 * 3600));
        assert_eq!(parse_location("+0530").unwrap(), offset(5 * 3600 + 30 * 60));
        assert_eq!(parse_location("UTC+01").unwrap(), offset(3600));
        assert_eq!(parse_location("GMT-3").unwrap(), offset(-3 * 3600));
    }

    #[test]
    fn test_parse_invalid_offsets() {
        for name in ["+24:00", "-05:60", "+5:7x", "+", "UTC+123"] {
            let err = parse_location(name).unwrap_err();
            assert!(
                matches!(err, ScheduleError::InvalidOffset(_)),
                "{} gave {:?}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_parse_iana_name() {
        assert_eq!(
            parse_location("Europe/Brussels").unwrap(),
            Location::Named(chrono_tz::Europe::Brussels)
        );
    }

    #[test]
    fn test_parse_unknown_name() {
        assert!(matches!(
            parse_location("Mars/Olympus_Mons"),
            Err(ScheduleError::UnknownTimezone(_))
        ));
        assert!(parse_location("   ").is_err());
    }

    #[test]
    fn test_clock_at_fixed_offset() {
        // 2026-02-05T04:00:00Z is Wednesday 23:00 at -05:00
        let instant = Utc.with_ymd_and_hms(2026, 2, 5, 4, 0, 0).unwrap();
        let clock = offset(-5 * 3600).clock_at(instant);
        assert_eq!(clock.weekday, Weekday::Wed);
        assert_eq!(clock.day_index(), 3);
        assert_eq!(clock.seconds_of_day, 23 * 3600);
    }

    #[test]
    fn test_instant_keeps_own_offset_as_fallback() {
        let at = FixedOffset::east_opt(-5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 4, 23, 0, 0)
            .unwrap();
        let instant = ScheduleInstant::from_datetime(&at);
        assert_eq!(instant.fallback, offset(-5 * 3600));
        assert_eq!(instant.unix, at.timestamp());

        let clock = instant.clock_in(global_resolver(), "").unwrap();
        assert_eq!(clock.weekday, Weekday::Wed);
        assert_eq!(clock.seconds_of_day, 23 * 3600);
    }

    #[test]
    fn test_unrepresentable_unix_has_no_clock() {
        let instant = ScheduleInstant::from_unix(i64::MAX);
        assert!(instant.utc.is_none());
        assert!(instant.clock_in(global_resolver(), "UTC").is_none());
    }

    #[test]
    fn test_empty_name_returns_fallback_without_loading() {
        let resolver = CachingResolver::new(CountingLoader::default());
        let fallback = offset(7200);
        assert_eq!(resolver.resolve("", fallback), fallback);
        assert_eq!(resolver.loader.loads.load(Ordering::SeqCst), 0);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_successful_resolution_is_cached() {
        let resolver = CachingResolver::new(CountingLoader::default());
        let first = resolver.resolve("Europe/Brussels", Location::utc());
        let second = resolver.resolve("Europe/Brussels", Location::utc());
        assert_eq!(first, second);
        assert_eq!(resolver.loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached("Europe/Brussels"), Some(first));
    }

    #[test]
    fn test_failed_resolution_is_not_cached() {
        let resolver =
            CachingResolver::new(CountingLoader::default()).with_policy(FallbackPolicy::Warn);
        let fallback = offset(-3600);
        assert_eq!(resolver.resolve("Not/AZone", fallback), fallback);
        assert_eq!(resolver.resolve("Not/AZone", fallback), fallback);
        assert_eq!(resolver.loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[test]
    fn test_offset_with_multibyte_chars_is_rejected() {
        for name in ["+aé1", "UTC+1é0", "-é", "GMT+0é"] {
            let err = parse_location(name).unwrap_err();
            assert!(
                matches!(err, ScheduleError::InvalidOffset(_)),
                "{} gave {:?}",
                name,
                err
            );
        }
        let fallback = offset(3600);
        assert_eq!(global_resolver().resolve("+aé1", fallback), fallback);
    }

    #[test]
    fn test_policy_views_share_one_cache() {
        let resolver = CachingResolver::new(CountingLoader::default());
        assert_eq!(resolver.policy(), FallbackPolicy::Silent);

        let warn = resolver.with_fallback_policy(FallbackPolicy::Warn);
        assert_eq!(warn.policy(), FallbackPolicy::Warn);
        let tokyo = warn.resolve("Asia/Tokyo", Location::utc());
        assert_eq!(tokyo, Location::Named(chrono_tz::Asia::Tokyo));

        let silent = resolver.with_fallback_policy(FallbackPolicy::Silent);
        assert_eq!(silent.resolve("Asia/Tokyo", Location::utc()), tokyo);
        assert_eq!(resolver.resolve("Asia/Tokyo", Location::utc()), tokyo);
        assert_eq!(resolver.loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_len(), 1);

        let fallback = offset(-7200);
        assert_eq!(warn.resolve("Nowhere/Land", fallback), fallback);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn test_with_policy_sets_owned_policy() {
        let resolver = CachingResolver::default().with_policy(FallbackPolicy::Warn);
        assert_eq!(resolver.policy(), FallbackPolicy::Warn);
    }

    #[test]
    fn test_fallback_policy_from_str() {
        assert_eq!("warn".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::Warn);
        assert_eq!(" Silent ".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::Silent);
        assert!("loud".parse::<FallbackPolicy>().is_err());
    }
}
