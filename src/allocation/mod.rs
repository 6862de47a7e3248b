//! Constraint-based resource allocation
//!
//! Matches available depot resources to disaster-zone needs by solving a
//! binary assignment problem: maximize urgency-weighted coverage plus an
//! expiry bonus, minus a normalized distance penalty, subject to type,
//! distance, and quantity eligibility with each resource serving at most
//! one need and each need sourced from at most one resource.

mod engine;
mod solver;

pub use engine::{AllocationEngine, AllocationError};
pub use solver::solve_allocation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on delivery distance (km) unless the caller overrides it.
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 500.0;

/// Solver wall-clock budget.
pub const SOLVER_TIME_LIMIT_SECS: u64 = 30;

/// A resource that can be allocated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableResource {
    pub id: String,
    pub resource_type: String,
    pub quantity: f64,
    /// 1-10 operator priority.
    pub priority: u8,
    pub location_lat: f64,
    pub location_lng: f64,
    pub location_id: String,
    /// Set for perishables; drives the expiry bonus.
    pub expiry_date: Option<DateTime<Utc>>,
}

/// A single requirement from the disaster zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeedSpec {
    pub need_type: String,
    pub quantity: f64,
    /// 1-10 urgency scale.
    pub urgency: f64,
    pub zone_lat: f64,
    pub zone_lng: f64,
}

/// Tunable weights fed into the objective function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub urgency_weight: f64,
    pub distance_weight: f64,
    pub expiry_weight: f64,
    pub coverage_weight: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgency_weight: 1.0,
            distance_weight: 0.3,
            expiry_weight: 0.2,
            coverage_weight: 1.0,
        }
    }
}

/// Terminal state of one solve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SolverStatus {
    /// Proven optimum found within the time limit.
    Optimal,
    /// Eligibility ruled out every (resource, need) pair.
    InfeasibleNoEligible,
    /// Empty resource or need set.
    TrivialEmpty,
    /// Deadline hit; the best incumbent found so far is returned.
    SolverTimeout,
}

/// One chosen (resource → need) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAllocation {
    pub resource_id: String,
    pub resource_type: String,
    /// Quantity delivered — the need's quantity.
    pub quantity: f64,
    pub location_id: String,
    pub distance_km: f64,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// A need the plan could not cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmetNeed {
    pub need_type: String,
    pub quantity: f64,
    pub urgency: f64,
}

/// Output of the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResult {
    pub allocations: Vec<PlannedAllocation>,
    pub unmet_needs: Vec<UnmetNeed>,
    /// Percentage of needs met.
    pub coverage_pct: f64,
    /// Sum of delivery distances over chosen pairs (km).
    pub estimated_delivery_km: f64,
    pub optimization_score: f64,
    pub solver_status: SolverStatus,
}

impl AllocationResult {
    pub(crate) fn unsolved(status: SolverStatus, needs: &[NeedSpec]) -> Self {
        Self {
            allocations: Vec::new(),
            unmet_needs: needs
                .iter()
                .map(|n| UnmetNeed {
                    need_type: n.need_type.clone(),
                    quantity: n.quantity,
                    urgency: n.urgency,
                })
                .collect(),
            coverage_pct: 0.0,
            estimated_delivery_km: 0.0,
            optimization_score: 0.0,
            solver_status: status,
        }
    }
}

/// Expiry score in [0, 1] — higher means closer to expiry, so the
/// optimizer prefers shipping it before it goes to waste.
///
/// Non-perishables (no expiry date) get a neutral 0.5. Perishables decay
/// as `exp(-0.05 * days_left)` with days_left floored at 0.
pub fn expiry_score(resource: &AvailableResource, now: DateTime<Utc>) -> f64 {
    match resource.expiry_date {
        None => 0.5,
        Some(expiry) => {
            let days_left = ((expiry - now).num_seconds() as f64 / 86_400.0).max(0.0);
            (-0.05 * days_left).exp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn resource(expiry: Option<DateTime<Utc>>) -> AvailableResource {
        AvailableResource {
            id: "r1".into(),
            resource_type: "water".into(),
            quantity: 100.0,
            priority: 5,
            location_lat: 0.0,
            location_lng: 0.0,
            location_id: "l1".into(),
            expiry_date: expiry,
        }
    }

    #[test]
    fn test_expiry_score_non_perishable() {
        let now = Utc::now();
        assert_eq!(expiry_score(&resource(None), now), 0.5);
    }

    #[test]
    fn test_expiry_score_decay() {
        let now = Utc::now();
        let fresh = expiry_score(&resource(Some(now + Duration::days(90))), now);
        let soon = expiry_score(&resource(Some(now + Duration::days(5))), now);
        let expired = expiry_score(&resource(Some(now - Duration::days(1))), now);
        assert!(fresh < soon);
        assert!(soon < expired);
        // days_left floors at 0, so an expired item scores exactly 1
        assert!((expired - 1.0).abs() < 1e-9);
    }
}
