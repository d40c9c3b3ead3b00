//! Open-valve rule tests
//!
//! Property-based and unit tests for:
//! - A farm with valves always keeps at least one open
//! - Rejected changes leave the valve set untouched
//! - Toggle, set-status, add and remove semantics

use proptest::prelude::*;
use shared::{
    apply_valve_change, check_valve_change, has_required_open_valve, ValveChange,
    ValveRuleViolation, ValveState, ValveStatus,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn status_strategy() -> impl Strategy<Value = ValveStatus> {
    prop_oneof![Just(ValveStatus::Open), Just(ValveStatus::Closed)]
}

/// Abstract operation; the index picks a valve from the current set
#[derive(Debug, Clone)]
enum Op {
    Add(ValveStatus),
    Toggle(usize),
    Set(usize, ValveStatus),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        status_strategy().prop_map(Op::Add),
        (0usize..16).prop_map(Op::Toggle),
        ((0usize..16), status_strategy()).prop_map(|(i, s)| Op::Set(i, s)),
        (0usize..16).prop_map(Op::Remove),
    ]
}

fn to_change(op: &Op, valves: &[ValveState]) -> Option<ValveChange> {
    let pick = |i: usize| valves.get(i % valves.len().max(1)).map(|v| v.id);
    match *op {
        Op::Add(status) => Some(ValveChange::Add {
            id: Uuid::new_v4(),
            status,
        }),
        Op::Toggle(i) => pick(i).map(|valve_id| ValveChange::Toggle { valve_id }),
        Op::Set(i, status) => pick(i).map(|valve_id| ValveChange::SetStatus { valve_id, status }),
        Op::Remove(i) => pick(i).map(|valve_id| ValveChange::Remove { valve_id }),
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Whatever sequence of changes is attempted, the accepted state never
    /// has valves without an open one
    #[test]
    fn prop_invariant_holds_across_change_sequences(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut valves: Vec<ValveState> = Vec::new();

        for op in &ops {
            let Some(change) = to_change(op, &valves) else { continue };
            match apply_valve_change(&valves, change) {
                Ok(next) => valves = next,
                Err(violation) => prop_assert_eq!(violation, ValveRuleViolation::LastOpenValve),
            }
            prop_assert!(has_required_open_valve(&valves));
        }
    }

    /// `check_valve_change` agrees with `apply_valve_change`
    #[test]
    fn prop_check_matches_apply(
        statuses in prop::collection::vec(status_strategy(), 1..8),
        index in 0usize..8,
        target in status_strategy(),
    ) {
        let mut valves: Vec<ValveState> = statuses
            .into_iter()
            .map(|status| ValveState { id: Uuid::new_v4(), status })
            .collect();
        valves[0].status = ValveStatus::Open;

        let valve_id = valves[index % valves.len()].id;
        let change = ValveChange::SetStatus { valve_id, status: target };

        match (check_valve_change(&valves, change), apply_valve_change(&valves, change)) {
            (Ok(status), Ok(next)) => {
                prop_assert_eq!(status, Some(target));
                prop_assert_eq!(next.len(), valves.len());
            }
            (Err(a), Err(b)) => prop_assert_eq!(a, b),
            (a, b) => prop_assert!(false, "check {:?} disagrees with apply {:?}", a, b),
        }
    }

    /// Closing is refused exactly when the target is the only open valve
    #[test]
    fn prop_close_refused_only_for_last_open(statuses in prop::collection::vec(status_strategy(), 1..10), index in 0usize..10) {
        let valves: Vec<ValveState> = statuses
            .into_iter()
            .map(|status| ValveState { id: Uuid::new_v4(), status })
            .collect();
        prop_assume!(has_required_open_valve(&valves));

        let target = valves[index % valves.len()];
        let others_open = valves
            .iter()
            .any(|v| v.id != target.id && v.status.is_open());

        let result = check_valve_change(
            &valves,
            ValveChange::SetStatus { valve_id: target.id, status: ValveStatus::Closed },
        );
        prop_assert_eq!(result.is_ok(), others_open);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_two_open_valves_closed_one_after_another() {
    let a = ValveState { id: Uuid::new_v4(), status: ValveStatus::Open };
    let b = ValveState { id: Uuid::new_v4(), status: ValveStatus::Open };

    let after_first = apply_valve_change(&[a, b], ValveChange::Toggle { valve_id: a.id }).unwrap();
    assert_eq!(
        apply_valve_change(&after_first, ValveChange::Toggle { valve_id: b.id }),
        Err(ValveRuleViolation::LastOpenValve)
    );
}

#[test]
fn test_adding_closed_valve_next_to_open_one() {
    let open = ValveState { id: Uuid::new_v4(), status: ValveStatus::Open };
    let id = Uuid::new_v4();
    assert_eq!(
        check_valve_change(&[open], ValveChange::Add { id, status: ValveStatus::Closed }),
        Ok(Some(ValveStatus::Closed))
    );
}

#[test]
fn test_removing_closed_valve_is_allowed() {
    let open = ValveState { id: Uuid::new_v4(), status: ValveStatus::Open };
    let closed = ValveState { id: Uuid::new_v4(), status: ValveStatus::Closed };
    let next = apply_valve_change(&[open, closed], ValveChange::Remove { valve_id: closed.id }).unwrap();
    assert_eq!(next, vec![open]);
}
