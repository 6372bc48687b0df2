//! agency-facade — one entry point over the agency trees.
//!
//! ```text
//! Agency
//!   ├── AgencyRoutes            bound once at construction
//!   ├── DbServersView (Target)  pairing mutations
//!   ├── CoordinatorsView (Target)
//!   ├── HeartbeatMonitor (Sync)
//!   └── per-scope views         Target / Plan / Current, built on demand
//! ```
//!
//! The store handle is injected; nothing here is process-global.

pub mod agency;
pub mod error;

pub use agency::{Agency, RemovedServer, Scope, SupervisionState};
pub use error::{FacadeError, FacadeResult};
