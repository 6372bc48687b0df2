//! Coordinators view — a flat set of server ids.

use agency_core::UNPAIRED;
use agency_routes::{Bind, ListRoute, RouteError, WriteRoute};
use agency_store::StoreError;
use serde_json::json;
use tracing::info;

use crate::error::{MembershipError, MembershipResult};

pub struct CoordinatorsView<R> {
    route: R,
}

impl<R: ListRoute + Bind> CoordinatorsView<R> {
    pub fn new(route: R) -> Self {
        Self { route }
    }

    /// Sorted coordinator ids.
    pub fn get_list(&self) -> MembershipResult<Vec<String>> {
        Ok(self.route.list()?)
    }
}

impl<R: WriteRoute + Bind> CoordinatorsView<R> {
    pub fn add(&self, id: &str) -> MembershipResult<()> {
        self.route.child(id)?.set(json!(UNPAIRED))?;
        info!(coordinator_id = %id, "coordinator added");
        Ok(())
    }

    /// Delete a coordinator. `Ok(false)` when it was not registered.
    pub fn remove(&self, id: &str) -> MembershipResult<bool> {
        match self.route.child(id)?.remove(false) {
            Ok(()) => {
                info!(coordinator_id = %id, "coordinator removed");
                Ok(true)
            }
            Err(RouteError::Store(StoreError::KeyNotFound(_))) => Ok(false),
            Err(err) => Err(MembershipError::from(err)),
        }
    }
}
