//! Scope matching.
//!
//! Everything here is a pure function of the scope and the request.

use crate::types::{CallScope, Period, Scope, TransactionCall};
use alloy_primitives::{Address, U256};

/// Returns `true` if every target in `required_targets` is covered by some entry of the
/// scope's call list.
///
/// An entry covers a target if it has no target restriction or its target equals the
/// required one. Selector restrictions are not considered, see [`calls_permitted`].
pub fn is_permitted(scope: &Scope, required_targets: &[Address]) -> bool {
    required_targets
        .iter()
        .all(|target| scope.call_scope.iter().any(|entry| covers_target(entry, target)))
}

/// Returns `true` if every call in `calls` is covered by an entry whose target matches and,
/// if the entry restricts the function, whose selector equals the call's selector.
///
/// An entry with a selector that cannot be parsed covers nothing. A call without calldata
/// only matches entries that do not restrict the selector.
pub fn calls_permitted(scope: &Scope, calls: &[TransactionCall]) -> bool {
    calls.iter().all(|call| {
        scope.call_scope.iter().any(|entry| {
            covers_target(entry, &call.to)
                && (!entry.restricts_selector()
                    || entry.selector().is_some_and(|selector| call.selector() == Some(selector)))
        })
    })
}

fn covers_target(entry: &CallScope, target: &Address) -> bool {
    entry.target.is_none_or(|allowed| allowed == *target)
}

/// Advisory spend cap of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpendLimit {
    pub limit: U256,
    pub period: Period,
}

/// Looks up the first spend entry for `token`.
///
/// `None` and the zero address both denote the native currency.
pub fn get_spend_limit(scope: &Scope, token: Option<Address>) -> Option<SpendLimit> {
    let native = token.is_none_or(|token| token.is_zero());
    scope
        .spend_scope
        .iter()
        .find(|entry| if native { entry.is_native() } else { entry.token == token })
        .map(|entry| SpendLimit { limit: entry.limit, period: entry.period })
}
