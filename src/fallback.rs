//! One step of the sequential fallback dialer.

use crate::call_state::DialOutcome;
use crate::dial_plan::DialPlan;
use crate::store::GroupMember;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequentialStep {
    /// The previous attempt was answered and has ended.
    Finished,
    /// Every number has been tried.
    Exhausted,
    Dial {
        number: String,
        /// Plan carried in the dial's action URL.
        next: DialPlan,
        /// Play the hold notice before the first attempt.
        announce: bool,
    },
}

/// Personal numbers of the members, in member order, skipping blanks.
pub fn fallback_numbers(members: &[GroupMember]) -> Vec<String> {
    members
        .iter()
        .filter_map(|member| member.user.personal_phone.as_deref())
        .map(str::trim)
        .filter(|number| !number.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decides what the dialer does for `plan`, given how the previous attempt
/// ended (`None` when the flow was redirected here rather than dialed).
///
/// Every `Dial` step carries `dial_index + 1`, so following the chain tries
/// each number once and stops at `numbers.len()`.
pub fn next_step(
    plan: &DialPlan,
    last_outcome: Option<DialOutcome>,
    numbers: &[String],
) -> SequentialStep {
    if last_outcome == Some(DialOutcome::Completed) {
        return SequentialStep::Finished;
    }

    match numbers.get(plan.dial_index) {
        None => SequentialStep::Exhausted,
        Some(number) => SequentialStep::Dial {
            number: number.clone(),
            next: plan.advance(),
            announce: plan.dial_index == 0 && last_outcome.is_none(),
        },
    }
}
