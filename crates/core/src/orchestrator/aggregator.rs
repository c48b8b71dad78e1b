use crate::dispatch::{ChannelDispatchStatus, DispatchStatus};

/// Reduce the terminal statuses of every channel attempt to the dispatch status.
///
/// All delivered is `delivered`, none delivered is `failed`, a mix is
/// `partial`. No attempts at all is `failed`.
pub fn aggregate_status(outcomes: &[ChannelDispatchStatus]) -> DispatchStatus {
    let delivered = outcomes
        .iter()
        .filter(|s| **s == ChannelDispatchStatus::Delivered)
        .count();

    match delivered {
        0 => DispatchStatus::Failed,
        n if n == outcomes.len() => DispatchStatus::Delivered,
        _ => DispatchStatus::Partial,
    }
}
