//! agency-membership — who is in the cluster, and in which role.
//!
//! # Architecture
//!
//! ```text
//! <scope>/DBServers            flat pairing map, one key per primary
//!   ├── P1 = "S1"              P1 is primary, S1 its secondary
//!   └── P2 = "none"            P2 is an unpaired primary
//! <scope>/Coordinators         flat set, values unused
//! Current/ServersRegistered    id → { endpoint }, joined into Current views
//! ```
//!
//! [`DbServersView`] interprets the pairing map into [`ServerRecord`]s and
//! owns the mutations on it. [`CoordinatorsView`] is a plain listing.
//!
//! [`ServerRecord`]: agency_core::ServerRecord

pub mod coordinators;
pub mod db_servers;
pub mod error;

pub use coordinators::CoordinatorsView;
pub use db_servers::{DbServersView, RemoveOutcome};
pub use error::{MembershipError, MembershipResult};
