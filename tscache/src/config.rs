//! Cache policy configuration for one caching executor node.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tscache_core::TimeSeriesQuery;

/// Immutable policy of one caching executor node.
///
/// Constructed through [`CacheConfig::builder`]; validation is deliberately
/// lazy and happens when an executor is built from its graph node, not here.
/// The persisted form carries camel-cased field names with absent booleans
/// reading `false` and absent integers `0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    executor_type: String,
    #[serde(default)]
    executor_id: String,
    #[serde(default)]
    expiration: u64,
    #[serde(default)]
    max_expiration: u64,
    #[serde(default)]
    simultaneous: bool,
    #[serde(default)]
    use_timestamps: bool,
}

impl CacheConfig {
    /// Creates a new [`CacheConfigBuilder`].
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Type tag of the executor this config drives.
    pub fn executor_type(&self) -> &str {
        &self.executor_type
    }

    /// Identifier of the executor node.
    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    /// Expiration for populated entries, in milliseconds. Zero disables
    /// population but not lookup.
    pub fn expiration(&self) -> u64 {
        self.expiration
    }

    /// Upper clamp for timestamp-derived TTLs, in milliseconds.
    pub fn max_expiration(&self) -> u64 {
        self.max_expiration
    }

    /// Whether the cache fetch and the downstream query race.
    pub fn simultaneous(&self) -> bool {
        self.simultaneous
    }

    /// Whether TTLs are derived from the query's time bounds.
    pub fn use_timestamps(&self) -> bool {
        self.use_timestamps
    }

    /// TTL for populating a freshly computed result of `query`, or `None`
    /// when population is disabled or the derived TTL collapses to zero.
    pub fn expiration_for(&self, query: &TimeSeriesQuery) -> Option<Duration> {
        self.expiration_at(query, Utc::now().timestamp_millis())
    }

    /// [`expiration_for`](Self::expiration_for) against an explicit clock.
    ///
    /// With `use_timestamps`, data ending at `end` stays representative until
    /// `end + expiration`; the remaining lifetime is clamped to
    /// `[0, max_expiration]`.
    pub fn expiration_at(&self, query: &TimeSeriesQuery, now: i64) -> Option<Duration> {
        if self.expiration == 0 {
            return None;
        }
        if !self.use_timestamps {
            return Some(Duration::from_millis(self.expiration));
        }
        let end = query.time().effective_end(now);
        let cap = i64::try_from(self.max_expiration).unwrap_or(i64::MAX);
        let ttl = end
            .saturating_add(self.expiration as i64)
            .saturating_sub(now)
            .clamp(0, cap);
        (ttl > 0).then(|| Duration::from_millis(ttl as u64))
    }
}

impl PartialOrd for CacheConfig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheConfig {
    /// Lexicographic over `(expiration, max_expiration, simultaneous,
    /// use_timestamps, executor_id, executor_type)`. Integers and strings
    /// compare naturally; a set boolean orders before an unset one.
    fn cmp(&self, other: &Self) -> Ordering {
        self.expiration
            .cmp(&other.expiration)
            .then_with(|| self.max_expiration.cmp(&other.max_expiration))
            .then_with(|| other.simultaneous.cmp(&self.simultaneous))
            .then_with(|| other.use_timestamps.cmp(&self.use_timestamps))
            .then_with(|| self.executor_id.cmp(&other.executor_id))
            .then_with(|| self.executor_type.cmp(&other.executor_type))
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    executor_type: String,
    executor_id: String,
    expiration: u64,
    max_expiration: u64,
    simultaneous: bool,
    use_timestamps: bool,
}

impl CacheConfigBuilder {
    /// Sets the executor type tag.
    pub fn executor_type(mut self, executor_type: impl Into<String>) -> Self {
        self.executor_type = executor_type.into();
        self
    }

    /// Sets the executor identifier.
    pub fn executor_id(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_id = executor_id.into();
        self
    }

    /// Sets the expiration in milliseconds.
    pub fn expiration(mut self, expiration: u64) -> Self {
        self.expiration = expiration;
        self
    }

    /// Sets the TTL clamp in milliseconds.
    pub fn max_expiration(mut self, max_expiration: u64) -> Self {
        self.max_expiration = max_expiration;
        self
    }

    /// Enables or disables simultaneous scheduling.
    pub fn simultaneous(mut self, simultaneous: bool) -> Self {
        self.simultaneous = simultaneous;
        self
    }

    /// Enables or disables timestamp-derived TTLs.
    pub fn use_timestamps(mut self, use_timestamps: bool) -> Self {
        self.use_timestamps = use_timestamps;
        self
    }

    /// Builds the [`CacheConfig`].
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            executor_type: self.executor_type,
            executor_id: self.executor_id,
            expiration: self.expiration,
            max_expiration: self.max_expiration,
            simultaneous: self.simultaneous,
            use_timestamps: self.use_timestamps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use tscache_core::Timespan;

    fn base() -> CacheConfigBuilder {
        CacheConfig::builder()
            .expiration(60_000)
            .max_expiration(120_000)
            .simultaneous(true)
            .use_timestamps(true)
            .executor_id("LocalCache")
            .executor_type("CachingQueryExecutor")
    }

    fn hash(config: &CacheConfig) -> u64 {
        let mut hasher = DefaultHasher::new();
        config.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn equality_and_hash_over_the_full_tuple() {
        let c1 = base().build();
        let c2 = base().build();
        assert_eq!(c1, c2);
        assert_eq!(hash(&c1), hash(&c2));
        assert_eq!(c1.cmp(&c2), Ordering::Equal);
    }

    #[test]
    fn ordering_matches_the_field_chain() {
        let c1 = base().build();

        let c2 = base().expiration(30_000).build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Greater);

        let c2 = base().max_expiration(100_000).build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Greater);

        // A set flag orders before an unset one.
        let c2 = base().simultaneous(false).build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Less);

        let c2 = base().use_timestamps(false).build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Less);

        let c2 = base().executor_id("TestCache").build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Less);

        let c2 = base().executor_type("CachingQueryExecutor2").build();
        assert_ne!(c1, c2);
        assert_eq!(c1.cmp(&c2), Ordering::Less);
    }

    #[test]
    fn persisted_form_is_camel_cased_and_complete() {
        let config = CacheConfig::builder()
            .expiration(60_000)
            .max_expiration(120_000)
            .executor_id("LocalCache")
            .executor_type("CachingQueryExecutor")
            .build();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["executorType"], "CachingQueryExecutor");
        assert_eq!(json["executorId"], "LocalCache");
        assert_eq!(json["expiration"], 60_000);
        assert_eq!(json["maxExpiration"], 120_000);
        assert_eq!(json["simultaneous"], false);
        assert_eq!(json["useTimestamps"], false);
    }

    #[test]
    fn absent_fields_default_on_parse() {
        let config: CacheConfig = serde_json::from_str(
            "{\"executorType\":\"CachingQueryExecutor\",\"executorId\":\"LocalCache\"}",
        )
        .unwrap();
        assert_eq!(config.executor_type(), "CachingQueryExecutor");
        assert_eq!(config.executor_id(), "LocalCache");
        assert_eq!(config.expiration(), 0);
        assert_eq!(config.max_expiration(), 0);
        assert!(!config.simultaneous());
        assert!(!config.use_timestamps());
    }

    #[test]
    fn parse_round_trips_the_full_form() {
        let json = "{\"executorType\":\"CachingQueryExecutor\",\"simultaneous\":false,\
                    \"expiration\":60000,\"maxExpiration\":120000,\
                    \"useTimestamps\":false,\"executorId\":\"LocalCache\"}";
        let config: CacheConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.expiration(), 60_000);
        assert_eq!(config.max_expiration(), 120_000);
        assert!(!config.simultaneous());
        let back = serde_json::to_string(&config).unwrap();
        let reparsed: CacheConfig = serde_json::from_str(&back).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn zero_expiration_disables_population() {
        let config = base().expiration(0).build();
        let query = TimeSeriesQuery::new(Timespan::since(0));
        assert_eq!(config.expiration_at(&query, 1_000_000), None);
    }

    #[test]
    fn fixed_expiration_ignores_timestamps() {
        let config = base().use_timestamps(false).build();
        let query = TimeSeriesQuery::new(Timespan::since(0).with_end(1));
        assert_eq!(
            config.expiration_at(&query, 10_000_000),
            Some(Duration::from_millis(60_000))
        );
    }

    #[test]
    fn timestamp_ttl_shrinks_with_data_age() {
        let config = base().build();
        let now = 10_000_000;
        // Data ends 20s before now: 60s expiration leaves 40s of life.
        let query = TimeSeriesQuery::new(Timespan::since(0).with_end(now - 20_000));
        assert_eq!(
            config.expiration_at(&query, now),
            Some(Duration::from_millis(40_000))
        );
    }

    #[test]
    fn timestamp_ttl_clamps_to_max_expiration() {
        let config = base().build();
        let now = 10_000_000;
        // Open span resolves to now: full expiration, but capped.
        let query = TimeSeriesQuery::new(Timespan::since(0).with_end(now + 600_000));
        assert_eq!(
            config.expiration_at(&query, now),
            Some(Duration::from_millis(120_000))
        );
    }

    #[test]
    fn stale_data_suppresses_population() {
        let config = base().build();
        let now = 10_000_000;
        let query = TimeSeriesQuery::new(Timespan::since(0).with_end(now - 600_000));
        assert_eq!(config.expiration_at(&query, now), None);
    }
}
