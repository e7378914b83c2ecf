//! # Conditions
//!
//! Upserts typed conditions into a resource's condition list.
//!
//! A list holds at most one condition per type. Setting a type replaces that entry in
//! place; unrelated entries keep their content and order.

use crate::crd::{Condition, ConditionStatus};

/// Insert or replace the condition of `condition_type`
///
/// `last_transition_time` moves only when the status value changes. Returns `true`
/// when the list was modified, so callers can skip no-op status writes.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: ConditionStatus,
    reason: &str,
    message: &str,
) -> bool {
    let now = chrono::Utc::now().to_rfc3339();

    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type)
    {
        if existing.status == status && existing.reason == reason && existing.message == message {
            return false;
        }
        if existing.status != status || existing.last_transition_time.is_none() {
            existing.last_transition_time = Some(now);
        }
        existing.status = status;
        existing.reason = reason.to_string();
        existing.message = message.to_string();
        return true;
    }

    conditions.push(Condition {
        r#type: condition_type.to_string(),
        status,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: Some(now),
    });
    true
}

/// Look up the condition of `condition_type`
pub fn find_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}
