//! Open-valve rule for gate valves
//!
//! A farm with one or more valves always keeps at least one of them open.
//! The backend evaluates every valve mutation against the current valve set
//! (read under a row lock) before writing it.

use thiserror::Error;
use uuid::Uuid;

use crate::models::ValveStatus;

/// The parts of a valve the open rule looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveState {
    pub id: Uuid,
    pub status: ValveStatus,
}

/// A requested change to a farm's valve set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveChange {
    Add { id: Uuid, status: ValveStatus },
    Toggle { valve_id: Uuid },
    SetStatus { valve_id: Uuid, status: ValveStatus },
    Remove { valve_id: Uuid },
}

/// Why a valve change was refused
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValveRuleViolation {
    #[error("At least one valve must remain open")]
    LastOpenValve,

    #[error("Valve {0} does not belong to this farm")]
    UnknownValve(Uuid),
}

/// True when the set is empty or has an open valve
pub fn has_required_open_valve(valves: &[ValveState]) -> bool {
    valves.is_empty() || valves.iter().any(|v| v.status.is_open())
}

/// Check a whole valve set, as submitted when a farm is created
pub fn validate_valve_set(valves: &[ValveState]) -> Result<(), ValveRuleViolation> {
    if has_required_open_valve(valves) {
        Ok(())
    } else {
        Err(ValveRuleViolation::LastOpenValve)
    }
}

/// Apply a change to the current valve set and return the resulting set.
///
/// Fails when the change targets a valve outside the set or would leave a
/// non-empty set without an open valve.
pub fn apply_valve_change(
    current: &[ValveState],
    change: ValveChange,
) -> Result<Vec<ValveState>, ValveRuleViolation> {
    let mut next = current.to_vec();

    match change {
        ValveChange::Add { id, status } => next.push(ValveState { id, status }),
        ValveChange::Toggle { valve_id } => {
            let valve = find_mut(&mut next, valve_id)?;
            valve.status = valve.status.toggled();
        }
        ValveChange::SetStatus { valve_id, status } => {
            find_mut(&mut next, valve_id)?.status = status;
        }
        ValveChange::Remove { valve_id } => {
            let before = next.len();
            next.retain(|v| v.id != valve_id);
            if next.len() == before {
                return Err(ValveRuleViolation::UnknownValve(valve_id));
            }
        }
    }

    validate_valve_set(&next)?;
    Ok(next)
}

/// Check a change and return the target valve's resulting status
/// (`None` when the change removes it)
pub fn check_valve_change(
    current: &[ValveState],
    change: ValveChange,
) -> Result<Option<ValveStatus>, ValveRuleViolation> {
    let target = match change {
        ValveChange::Add { id, .. } => id,
        ValveChange::Toggle { valve_id }
        | ValveChange::SetStatus { valve_id, .. }
        | ValveChange::Remove { valve_id } => valve_id,
    };

    let next = apply_valve_change(current, change)?;
    Ok(next.iter().find(|v| v.id == target).map(|v| v.status))
}

fn find_mut(valves: &mut [ValveState], id: Uuid) -> Result<&mut ValveState, ValveRuleViolation> {
    valves
        .iter_mut()
        .find(|v| v.id == id)
        .ok_or(ValveRuleViolation::UnknownValve(id))
}
