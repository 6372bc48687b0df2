//! Heartbeat monitor — classifies servers by their last reported beat.

use std::collections::BTreeMap;
use std::time::Duration;

use agency_core::{HeartbeatRecord, ServerId, SyncStatus};
use agency_routes::{ReadRoute, Route, VersionedCache};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{HealthError, HealthResult};

/// Status reported for servers that never sent a status string.
const UNKNOWN_STATUS: &str = "UNKNOWN";

/// Health summary of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerHealth {
    pub status: SyncStatus,
    pub last_beat: Option<DateTime<Utc>>,
    /// No beat within `stale_multiplier` heartbeat intervals.
    pub stale: bool,
}

/// Classifies the servers under a `Sync/ServerStates` route.
pub struct HeartbeatMonitor<R> {
    server_states: R,
    interval: Duration,
    stale_multiplier: u32,
    cache: VersionedCache<BTreeMap<ServerId, HeartbeatRecord>>,
}

impl<R: ReadRoute> HeartbeatMonitor<R> {
    /// Create a monitor. The heartbeat interval is read once from
    /// `interval_route`, falling back to `default_interval` when unset.
    pub fn new<I: ReadRoute>(
        server_states: R,
        interval_route: &I,
        default_interval: Duration,
    ) -> HealthResult<Self> {
        let interval = match interval_route.get(false)? {
            Value::Number(ms) => ms.as_u64().map(Duration::from_millis),
            Value::String(ms) => ms.trim().parse().ok().map(Duration::from_millis),
            _ => None,
        };
        let interval = interval.unwrap_or_else(|| {
            debug!(path = %interval_route.path(), ?default_interval, "no heartbeat interval stored, using default");
            default_interval
        });
        Ok(Self {
            server_states,
            interval,
            stale_multiplier: 2,
            cache: VersionedCache::new(true),
        })
    }

    /// Number of missed intervals after which a server counts as stale.
    pub fn with_stale_multiplier(mut self, multiplier: u32) -> Self {
        self.stale_multiplier = multiplier.max(1);
        self
    }

    pub fn with_version_gating(mut self, gated: bool) -> Self {
        self.cache = VersionedCache::new(gated);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Age beyond which a beat is stale.
    pub fn stale_after(&self) -> Duration {
        self.interval * self.stale_multiplier
    }

    /// Last heartbeat of every server.
    pub fn list(&mut self) -> HealthResult<BTreeMap<ServerId, HeartbeatRecord>> {
        let records = self.cache.get_or_fetch(&self.server_states, |route| {
            let value = route.get(true)?;
            Ok::<_, HealthError>(parse_server_states(&value))
        })?;
        Ok(records.clone())
    }

    fn filter_by(&mut self, predicate: impl Fn(&SyncStatus) -> bool) -> HealthResult<Vec<ServerId>> {
        Ok(self
            .list()?
            .into_values()
            .filter(|record| predicate(&record.status))
            .map(|record| record.server_id)
            .collect())
    }

    /// Servers whose status is outside the known sync vocabulary.
    pub fn get_inactive(&mut self) -> HealthResult<Vec<ServerId>> {
        self.filter_by(SyncStatus::is_inactive)
    }

    pub fn get_serving(&mut self) -> HealthResult<Vec<ServerId>> {
        self.filter_by(SyncStatus::is_serving)
    }

    pub fn get_in_sync(&mut self) -> HealthResult<Vec<ServerId>> {
        self.filter_by(SyncStatus::is_in_sync)
    }

    pub fn get_out_sync(&mut self) -> HealthResult<Vec<ServerId>> {
        self.filter_by(SyncStatus::is_out_sync)
    }

    /// Servers with no beat within the stale window, as of now.
    pub fn no_beat(&mut self) -> HealthResult<Vec<ServerId>> {
        self.no_beat_at(Utc::now())
    }

    pub fn no_beat_at(&mut self, now: DateTime<Utc>) -> HealthResult<Vec<ServerId>> {
        let cutoff = self.cutoff(now);
        let stale: Vec<ServerId> = self
            .list()?
            .into_values()
            .filter(|record| is_stale(record, cutoff))
            .map(|record| record.server_id)
            .collect();
        if !stale.is_empty() {
            warn!(servers = ?stale, "servers missed their heartbeat");
        }
        Ok(stale)
    }

    /// Status and staleness of every server, as of `now`.
    pub fn report(&mut self, now: DateTime<Utc>) -> HealthResult<BTreeMap<ServerId, ServerHealth>> {
        let cutoff = self.cutoff(now);
        Ok(self
            .list()?
            .into_values()
            .map(|record| {
                let stale = is_stale(&record, cutoff);
                let health = ServerHealth {
                    status: record.status,
                    last_beat: record.last_beat,
                    stale,
                };
                (record.server_id, health)
            })
            .collect())
    }

    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let window = TimeDelta::from_std(self.stale_after()).unwrap_or(TimeDelta::MAX);
        now.checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A server with no readable beat time counts as stale.
fn is_stale(record: &HeartbeatRecord, cutoff: DateTime<Utc>) -> bool {
    record.last_beat.is_none_or(|beat| beat < cutoff)
}

fn parse_server_states(value: &Value) -> BTreeMap<ServerId, HeartbeatRecord> {
    let Some(entries) = value.as_object() else {
        return BTreeMap::new();
    };
    entries
        .iter()
        .filter_map(|(id, entry)| {
            let Some(fields) = entry.as_object() else {
                warn!(server_id = %id, "ignoring malformed heartbeat");
                return None;
            };
            let status = fields
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or(UNKNOWN_STATUS);
            let record = HeartbeatRecord {
                server_id: id.clone(),
                status: SyncStatus::from(status.to_string()),
                last_beat: fields.get("time").and_then(parse_beat_time),
            };
            Some((id.clone(), record))
        })
        .collect()
}

/// RFC 3339 string or seconds since the epoch.
fn parse_beat_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            DateTime::from_timestamp_millis((secs * 1000.0) as i64)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agency_routes::{ReadOnlyRoute, RouteBuilder};
    use agency_store::{AgencyStore, SharedStore, StoreClient};
    use serde_json::json;

    const STATES: &str = "/arango/Sync/ServerStates";

    fn setup(interval: Option<Value>) -> (SharedStore, HeartbeatMonitor<ReadOnlyRoute>) {
        let store = AgencyStore::open_in_memory().unwrap().shared();
        if let Some(interval) = interval {
            store
                .set("/arango/Sync/HeartbeatIntervalMs", interval, None)
                .unwrap();
        }
        let routes = RouteBuilder::new(store.clone()).build().unwrap();
        let monitor = HeartbeatMonitor::new(
            routes.sync.server_states,
            &routes.sync.heartbeat_interval_ms,
            Duration::from_secs(1),
        )
        .unwrap();
        (store, monitor)
    }

    fn beat(store: &SharedStore, id: &str, status: &str, time: DateTime<Utc>) {
        store
            .set(
                &format!("{STATES}/{id}"),
                json!({"status": status, "time": time.to_rfc3339()}),
                None,
            )
            .unwrap();
    }

    #[test]
    fn interval_is_read_once_with_fallback() {
        let (store, monitor) = setup(Some(json!(500)));
        assert_eq!(monitor.interval(), Duration::from_millis(500));
        assert_eq!(monitor.stale_after(), Duration::from_secs(1));

        store
            .set("/arango/Sync/HeartbeatIntervalMs", json!(9000), None)
            .unwrap();
        assert_eq!(monitor.interval(), Duration::from_millis(500));

        let (_, monitor) = setup(None);
        assert_eq!(monitor.interval(), Duration::from_secs(1));

        let (_, monitor) = setup(Some(json!("250")));
        assert_eq!(monitor.interval(), Duration::from_millis(250));
    }

    #[test]
    fn classifies_by_status_sorted() {
        let (store, mut monitor) = setup(None);
        let now = Utc::now();
        beat(&store, "db3", "SERVINGSYNC", now);
        beat(&store, "db1", "SERVINGASYNC", now);
        beat(&store, "db2", "INSYNC", now);
        beat(&store, "db4", "SYNCING", now);
        beat(&store, "db5", "STARTUP", now);

        assert_eq!(monitor.get_serving().unwrap(), ["db1", "db3"]);
        assert_eq!(monitor.get_in_sync().unwrap(), ["db2", "db3"]);
        assert_eq!(monitor.get_out_sync().unwrap(), ["db1", "db4"]);
        assert_eq!(monitor.get_inactive().unwrap(), ["db5"]);
        assert_eq!(monitor.list().unwrap().len(), 5);
    }

    #[test]
    fn stale_inactive_server_only_in_no_beat_and_inactive() {
        let (store, mut monitor) = setup(Some(json!(1000)));
        let now = Utc::now();
        beat(&store, "fresh", "SERVINGSYNC", now - TimeDelta::milliseconds(500));
        beat(&store, "old", "SHUTDOWN", now - TimeDelta::seconds(5));

        assert_eq!(monitor.no_beat_at(now).unwrap(), ["old"]);
        assert_eq!(monitor.get_inactive().unwrap(), ["old"]);
        for list in [
            monitor.get_serving().unwrap(),
            monitor.get_in_sync().unwrap(),
            monitor.get_out_sync().unwrap(),
        ] {
            assert!(!list.contains(&"old".to_string()));
        }
    }

    #[test]
    fn stale_window_honours_multiplier() {
        let (store, monitor) = setup(Some(json!(1000)));
        let mut monitor = monitor.with_stale_multiplier(5);
        let now = Utc::now();
        beat(&store, "db1", "INSYNC", now - TimeDelta::seconds(3));
        assert!(monitor.no_beat_at(now).unwrap().is_empty());
        assert_eq!(
            monitor.no_beat_at(now + TimeDelta::seconds(3)).unwrap(),
            ["db1"]
        );
    }

    #[test]
    fn epoch_seconds_and_missing_times() {
        let (store, mut monitor) = setup(Some(json!(1000)));
        let now = Utc::now();
        store
            .set(
                &format!("{STATES}/epoch"),
                json!({"status": "INSYNC", "time": now.timestamp()}),
                None,
            )
            .unwrap();
        store
            .set(&format!("{STATES}/timeless"), json!({"status": "INSYNC"}), None)
            .unwrap();
        store
            .set(&format!("{STATES}/junk"), json!("not a heartbeat"), None)
            .unwrap();

        let list = monitor.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(
            list["epoch"].last_beat.map(|t| t.timestamp()),
            Some(now.timestamp())
        );
        assert_eq!(list["timeless"].last_beat, None);
        assert_eq!(monitor.no_beat_at(now).unwrap(), ["timeless"]);
    }

    #[test]
    fn report_combines_status_and_staleness() {
        let (store, mut monitor) = setup(Some(json!(1000)));
        let now = Utc::now();
        beat(&store, "a", "SERVINGSYNC", now);
        beat(&store, "b", "SYNCING", now - TimeDelta::minutes(1));

        let report = monitor.report(now).unwrap();
        assert!(!report["a"].stale);
        assert!(report["b"].stale);
        assert_eq!(report["b"].status, SyncStatus::Syncing);
    }
}
