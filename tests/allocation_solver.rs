//! Allocation Solver Regression Tests
//!
//! Feasibility, cardinality, and bounded-optimality checks over the
//! branch-and-bound assignment solver, plus the store-backed engine's
//! commit path.

use chrono::{Duration, Utc};

use reliefnet::allocation::{
    solve_allocation, AllocationEngine, AvailableResource, NeedSpec, PriorityWeights, SolverStatus,
};
use reliefnet::store::{Filter, StoreGateway};
use reliefnet::types::{Allocation, Resource, ResourceStatus};

fn resource(id: &str, rtype: &str, qty: f64, lat: f64, lng: f64) -> AvailableResource {
    AvailableResource {
        id: id.into(),
        resource_type: rtype.into(),
        quantity: qty,
        priority: 5,
        location_lat: lat,
        location_lng: lng,
        location_id: format!("loc-{id}"),
        expiry_date: None,
    }
}

fn need(rtype: &str, qty: f64, urgency: f64, lat: f64, lng: f64) -> NeedSpec {
    NeedSpec {
        need_type: rtype.into(),
        quantity: qty,
        urgency,
        zone_lat: lat,
        zone_lng: lng,
    }
}

/// S4: the closer, near-expiry depot wins and fully covers the need.
#[test]
fn near_expiry_close_depot_preferred() {
    let now = Utc::now();
    let mut r1 = resource("R1", "water", 100.0, 0.0, 0.0);
    r1.expiry_date = Some(now + Duration::days(5));
    let r2 = resource("R2", "water", 100.0, 0.0, 6.0);

    let result = solve_allocation(
        &[r1, r2],
        &[need("water", 50.0, 9.0, 0.0, 0.1)],
        PriorityWeights::default(),
        500.0,
    );

    assert_eq!(result.solver_status, SolverStatus::Optimal);
    assert_eq!(result.allocations.len(), 1);
    assert_eq!(result.allocations[0].resource_id, "R1");
    assert!(result.unmet_needs.is_empty());
    assert_eq!(result.coverage_pct, 100.0);
    assert!(result.estimated_delivery_km < 20.0);
}

/// Bounded optimality: with both pairs eligible (10 km and ~400 km), the
/// solver produces both allocations rather than settling for one.
#[test]
fn both_eligible_pairs_allocated() {
    let resources = [
        resource("A", "water", 100.0, 0.0, 0.0),
        resource("B", "water", 100.0, 0.0, 3.6),
    ];
    let needs = [
        need("water", 50.0, 5.0, 0.0, 0.09),
        need("water", 50.0, 5.0, 0.0, 0.0),
    ];

    let result = solve_allocation(&resources, &needs, PriorityWeights::default(), 500.0);
    assert_eq!(result.solver_status, SolverStatus::Optimal);
    assert_eq!(result.allocations.len(), 2);
    assert!(result.unmet_needs.is_empty());
    assert_eq!(result.coverage_pct, 100.0);
}

/// Every returned allocation satisfies type, quantity, and distance
/// constraints; no resource or need is used twice.
#[test]
fn feasibility_and_cardinality_hold() {
    let resources: Vec<AvailableResource> = (0..8)
        .map(|i| {
            resource(
                &format!("r{i}"),
                if i % 2 == 0 { "water" } else { "food" },
                30.0 + 10.0 * i as f64,
                0.0,
                0.3 * i as f64,
            )
        })
        .collect();
    let needs: Vec<NeedSpec> = (0..5)
        .map(|j| {
            need(
                if j % 2 == 0 { "water" } else { "food" },
                25.0 + 10.0 * j as f64,
                1.0 + j as f64,
                0.2,
                0.25 * j as f64,
            )
        })
        .collect();

    let result = solve_allocation(&resources, &needs, PriorityWeights::default(), 500.0);

    for alloc in &result.allocations {
        let r = resources.iter().find(|r| r.id == alloc.resource_id).unwrap();
        assert_eq!(r.resource_type, alloc.resource_type);
        assert!(r.quantity >= alloc.quantity);
        assert!(alloc.distance_km <= 500.0);
    }

    let mut used: Vec<&str> = result.allocations.iter().map(|a| a.resource_id.as_str()).collect();
    used.sort_unstable();
    let before = used.len();
    used.dedup();
    assert_eq!(used.len(), before, "a resource was allocated twice");

    assert_eq!(
        result.allocations.len() + result.unmet_needs.len(),
        needs.len(),
        "every need is met at most once"
    );
}

#[test]
fn infeasible_and_trivial_statuses() {
    // No eligible pair: type mismatch
    let result = solve_allocation(
        &[resource("r", "food", 100.0, 0.0, 0.0)],
        &[need("water", 10.0, 5.0, 0.0, 0.0)],
        PriorityWeights::default(),
        500.0,
    );
    assert_eq!(result.solver_status, SolverStatus::InfeasibleNoEligible);
    assert_eq!(result.unmet_needs.len(), 1);
    assert_eq!(result.coverage_pct, 0.0);

    // Empty inputs
    let result = solve_allocation(&[], &[], PriorityWeights::default(), 500.0);
    assert_eq!(result.solver_status, SolverStatus::TrivialEmpty);
}

/// Distance cap is a hard constraint, not a penalty.
#[test]
fn distance_cap_is_hard() {
    let result = solve_allocation(
        &[resource("far", "water", 100.0, 0.0, 10.0)],
        &[need("water", 10.0, 10.0, 0.0, 0.0)],
        PriorityWeights::default(),
        500.0,
    );
    assert_eq!(result.solver_status, SolverStatus::InfeasibleNoEligible);
}

/// The engine commits: chosen resources flip to allocated with the
/// disaster id, and allocation rows are written.
#[test]
fn engine_commit_marks_resources() {
    let store = StoreGateway::open_temporary().unwrap();
    let now = Utc::now();
    for (id, lng) in [("close", 0.0), ("far", 3.0)] {
        store
            .collection::<Resource>()
            .unwrap()
            .insert(&Resource {
                id: id.into(),
                resource_type: "water".into(),
                quantity: 80.0,
                priority: 5,
                status: ResourceStatus::Available,
                location_id: format!("loc-{id}"),
                latitude: 0.0,
                longitude: lng,
                expiry_date: None,
                disaster_id: None,
                created_at: now,
                updated_at: now,
            })
            .unwrap();
    }

    let engine = AllocationEngine::new(store.clone());
    let result = engine
        .allocate(
            Some("d-99"),
            &[need("water", 50.0, 8.0, 0.0, 0.1)],
            PriorityWeights::default(),
            500.0,
        )
        .unwrap();

    assert_eq!(result.solver_status, SolverStatus::Optimal);
    assert_eq!(result.allocations.len(), 1);
    assert_eq!(result.allocations[0].resource_id, "close");

    let resources = store.collection::<Resource>().unwrap();
    let chosen = resources.get("close").unwrap().unwrap();
    assert_eq!(chosen.status, ResourceStatus::Allocated);
    assert_eq!(chosen.disaster_id.as_deref(), Some("d-99"));
    let untouched = resources.get("far").unwrap().unwrap();
    assert_eq!(untouched.status, ResourceStatus::Available);

    let allocations = store
        .collection::<Allocation>()
        .unwrap()
        .count(&Filter::All)
        .unwrap();
    assert_eq!(allocations, 1);
}
