//! Store-backed allocation engine
//!
//! Loads available resources, runs the solver, and commits the winning
//! plan: chosen resources flip to `allocated` with the disaster id set,
//! and one Allocation row is written per chosen pair.

use chrono::Utc;
use tracing::{info, warn};

use crate::store::{Filter, Query, StoreGateway};
use crate::types::{new_id, Allocation, Location, Resource, ResourceStatus};

use super::{
    solve_allocation, AllocationResult, AvailableResource, NeedSpec, PriorityWeights,
    SolverStatus,
};

/// Errors surfaced by the allocation engine.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("store error: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Solver facade over the document store.
pub struct AllocationEngine {
    store: StoreGateway,
}

impl AllocationEngine {
    pub fn new(store: StoreGateway) -> Self {
        Self { store }
    }

    /// Load every `available` resource as solver input.
    ///
    /// Resources whose location row is missing fall back to their own
    /// coordinate columns.
    pub fn load_available_resources(&self) -> Result<Vec<AvailableResource>, AllocationError> {
        let resources = self.store.collection::<Resource>()?;
        let locations = self.store.collection::<Location>()?;

        let rows = resources.find(&Query::new().filter(Filter::eq("status", "available")))?;
        let mut available = Vec::with_capacity(rows.len());
        for r in rows {
            let (lat, lng) = match locations.get(&r.location_id)? {
                Some(loc) => (loc.latitude, loc.longitude),
                None => (r.latitude, r.longitude),
            };
            available.push(AvailableResource {
                id: r.id,
                resource_type: r.resource_type,
                quantity: r.quantity,
                priority: r.priority,
                location_lat: lat,
                location_lng: lng,
                location_id: r.location_id,
                expiry_date: r.expiry_date,
            });
        }
        Ok(available)
    }

    /// Solve for the given needs and commit the resulting plan.
    ///
    /// On a successful solve, each chosen resource is marked `allocated`
    /// with `disaster_id` set and an [`Allocation`] row is inserted.
    /// Timed-out solves commit their incumbent; infeasible and trivial
    /// solves commit nothing.
    pub fn allocate(
        &self,
        disaster_id: Option<&str>,
        needs: &[NeedSpec],
        weights: PriorityWeights,
        max_distance_km: f64,
    ) -> Result<AllocationResult, AllocationError> {
        let available = self.load_available_resources()?;
        let result = solve_allocation(&available, needs, weights, max_distance_km);

        match result.solver_status {
            SolverStatus::Optimal | SolverStatus::SolverTimeout => {
                self.commit(disaster_id, &result)?;
                info!(
                    allocations = result.allocations.len(),
                    unmet = result.unmet_needs.len(),
                    coverage_pct = result.coverage_pct,
                    status = ?result.solver_status,
                    "Allocation plan committed"
                );
            }
            SolverStatus::InfeasibleNoEligible | SolverStatus::TrivialEmpty => {
                warn!(
                    needs = needs.len(),
                    status = ?result.solver_status,
                    "Allocation produced no plan"
                );
            }
        }

        Ok(result)
    }

    fn commit(
        &self,
        disaster_id: Option<&str>,
        result: &AllocationResult,
    ) -> Result<(), AllocationError> {
        let resources = self.store.collection::<Resource>()?;
        let allocations = self.store.collection::<Allocation>()?;
        let now = Utc::now();

        for planned in &result.allocations {
            resources.update_where(&Filter::eq("id", planned.resource_id.as_str()), |r| {
                r.status = ResourceStatus::Allocated;
                r.disaster_id = disaster_id.map(String::from);
                r.updated_at = now;
            })?;

            allocations.insert(&Allocation {
                id: new_id(),
                resource_id: planned.resource_id.clone(),
                disaster_id: disaster_id.map(String::from),
                need_type: planned.resource_type.clone(),
                quantity: planned.quantity,
                distance_km: planned.distance_km,
                created_at: now,
            })?;
        }
        Ok(())
    }
}
