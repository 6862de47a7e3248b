//! Exact branch-and-bound assignment search
//!
//! The one-resource-per-need / one-need-per-resource constraints make the
//! program a maximum-weight bipartite assignment. The search walks needs
//! in order, choosing an eligible unused resource or leaving the need
//! unmet, pruning with an admissible per-need upper bound. Pairs with a
//! non-positive objective contribution are never chosen: leaving a need
//! unmet costs nothing, so such pairs cannot appear in an optimum.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::geo::haversine;

use super::{
    expiry_score, AllocationResult, AvailableResource, NeedSpec, PlannedAllocation,
    PriorityWeights, SolverStatus, UnmetNeed, SOLVER_TIME_LIMIT_SECS,
};

/// Run the allocation optimizer.
///
/// Returns the optimal assignment, or the best incumbent with
/// `SolverStatus::SolverTimeout` when the 30-second budget is exhausted.
pub fn solve_allocation(
    resources: &[AvailableResource],
    needs: &[NeedSpec],
    weights: PriorityWeights,
    max_distance_km: f64,
) -> AllocationResult {
    if resources.is_empty() || needs.is_empty() {
        return AllocationResult::unsolved(SolverStatus::TrivialEmpty, needs);
    }

    let n_res = resources.len();
    let n_needs = needs.len();
    let now = Utc::now();
    let total_need_qty: f64 = needs.iter().map(|n| n.quantity).sum();

    // Pre-compute distance and per-pair objective weight; ineligible or
    // non-positive pairs are encoded as None.
    let mut dist = vec![vec![0.0f64; n_needs]; n_res];
    let mut weight: Vec<Vec<Option<f64>>> = vec![vec![None; n_needs]; n_res];
    let mut any_eligible = false;

    for (i, r) in resources.iter().enumerate() {
        let exp_s = expiry_score(r, now);
        for (j, n) in needs.iter().enumerate() {
            let d = haversine(r.location_lat, r.location_lng, n.zone_lat, n.zone_lng);
            dist[i][j] = d;

            let eligible =
                r.resource_type == n.need_type && d <= max_distance_km && r.quantity >= n.quantity;
            if !eligible {
                continue;
            }
            any_eligible = true;

            let urgency_val = n.urgency * weights.urgency_weight;
            let coverage_val = if total_need_qty > 0.0 {
                (n.quantity / total_need_qty) * weights.coverage_weight
            } else {
                0.0
            };
            let dist_penalty = (d / max_distance_km.max(1.0)) * weights.distance_weight;
            let expiry_bonus = exp_s * weights.expiry_weight;

            let w = urgency_val + coverage_val + expiry_bonus - dist_penalty;
            if w > 0.0 {
                weight[i][j] = Some(w);
            }
        }
    }

    if !any_eligible {
        return AllocationResult::unsolved(SolverStatus::InfeasibleNoEligible, needs);
    }

    // Admissible bound: best positive weight available for each need,
    // ignoring resource conflicts. suffix_best[j] = Σ_{j' >= j} best[j'].
    let mut best_per_need = vec![0.0f64; n_needs];
    for j in 0..n_needs {
        for i in 0..n_res {
            if let Some(w) = weight[i][j] {
                if w > best_per_need[j] {
                    best_per_need[j] = w;
                }
            }
        }
    }
    let mut suffix_best = vec![0.0f64; n_needs + 1];
    for j in (0..n_needs).rev() {
        suffix_best[j] = suffix_best[j + 1] + best_per_need[j];
    }

    let deadline = Instant::now() + Duration::from_secs(SOLVER_TIME_LIMIT_SECS);
    let mut search = Search {
        weight: &weight,
        suffix_best: &suffix_best,
        n_res,
        n_needs,
        deadline,
        timed_out: false,
        used: vec![false; n_res],
        current: vec![None; n_needs],
        current_value: 0.0,
        best: vec![None; n_needs],
        best_value: f64::NEG_INFINITY,
        nodes: 0,
    };
    search.descend(0);

    let status = if search.timed_out {
        warn!(
            nodes = search.nodes,
            "Allocation solver hit its time limit — returning best incumbent"
        );
        SolverStatus::SolverTimeout
    } else {
        debug!(nodes = search.nodes, value = search.best_value, "Allocation solve complete");
        SolverStatus::Optimal
    };

    // Extract the incumbent into the result shape.
    let assignment = if search.best_value.is_finite() {
        search.best
    } else {
        vec![None; n_needs]
    };

    let mut result = AllocationResult {
        allocations: Vec::new(),
        unmet_needs: Vec::new(),
        coverage_pct: 0.0,
        estimated_delivery_km: 0.0,
        optimization_score: 0.0,
        solver_status: status,
    };

    let mut met = 0usize;
    let mut total_dist = 0.0;
    for (j, choice) in assignment.iter().enumerate() {
        match choice {
            Some(i) => {
                met += 1;
                total_dist += dist[*i][j];
                let r = &resources[*i];
                result.allocations.push(PlannedAllocation {
                    resource_id: r.id.clone(),
                    resource_type: r.resource_type.clone(),
                    quantity: needs[j].quantity,
                    location_id: r.location_id.clone(),
                    distance_km: round2(dist[*i][j]),
                    expiry_date: r.expiry_date,
                });
            }
            None => result.unmet_needs.push(UnmetNeed {
                need_type: needs[j].need_type.clone(),
                quantity: needs[j].quantity,
                urgency: needs[j].urgency,
            }),
        }
    }

    result.coverage_pct = round2(met as f64 / n_needs as f64 * 100.0);
    result.estimated_delivery_km = round2(total_dist);
    result.optimization_score = round4(met as f64 / n_needs as f64);
    result
}

/// Depth-first search state over need indices.
struct Search<'a> {
    weight: &'a [Vec<Option<f64>>],
    suffix_best: &'a [f64],
    n_res: usize,
    n_needs: usize,
    deadline: Instant,
    timed_out: bool,
    used: Vec<bool>,
    current: Vec<Option<usize>>,
    current_value: f64,
    best: Vec<Option<usize>>,
    best_value: f64,
    nodes: u64,
}

impl Search<'_> {
    fn descend(&mut self, j: usize) {
        self.nodes += 1;
        // Deadline check is amortized — Instant::now() is cheap but not free.
        if self.nodes % 1024 == 0 && Instant::now() > self.deadline {
            self.timed_out = true;
        }
        if self.timed_out {
            return;
        }

        if j == self.n_needs {
            if self.current_value > self.best_value {
                self.best_value = self.current_value;
                self.best = self.current.clone();
            }
            return;
        }

        // Prune: even the per-need optimistic bound cannot beat the incumbent.
        if self.current_value + self.suffix_best[j] <= self.best_value {
            return;
        }

        // Branch 1: assign an eligible unused resource to need j.
        for i in 0..self.n_res {
            if self.used[i] {
                continue;
            }
            let Some(w) = self.weight[i][j] else { continue };
            self.used[i] = true;
            self.current[j] = Some(i);
            self.current_value += w;
            self.descend(j + 1);
            self.current_value -= w;
            self.current[j] = None;
            self.used[i] = false;
            if self.timed_out {
                return;
            }
        }

        // Branch 2: leave need j unmet.
        self.descend(j + 1);
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
