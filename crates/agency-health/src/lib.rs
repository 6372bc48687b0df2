//! agency-health — server liveness from `Sync/ServerStates` heartbeats.
//!
//! Servers write `{ "status": "...", "time": ... }` under their id on every
//! beat. [`HeartbeatMonitor`] classifies them by reported sync status and
//! flags servers whose last beat is older than a fixed multiple of the
//! heartbeat interval. Staleness is a suspicion, not a confirmed failure.

pub mod error;
pub mod monitor;

pub use error::{HealthError, HealthResult};
pub use monitor::{HeartbeatMonitor, ServerHealth};
