use crate::replica::ids::{LamportCounter, ServerId};
use crate::replica::update_log::LogEvent;
use std::iter::Peekable;
use std::vec;

/// Merge per-origin event streams into the single order in which a replica applies them.
///
/// Each input stream must already be in ascending counter order (as read from its log). We
/// repeatedly take the stream head with the smallest lamport counter; equal counters from
/// different origins go to the lower origin id. The result depends only on the set of events,
/// never on the order in which they were received, so every replica replaying the same streams
/// applies them in the same order.
///
/// Note: This respects per-origin order but is not a causal order across origins. A like from one
/// server can sort ahead of the message it refers to if the two origins' clocks diverged.
pub(crate) fn merge_order(streams: Vec<Vec<LogEvent>>) -> Vec<LogEvent> {
    let total = streams.iter().map(|s| s.len()).sum();
    let mut heads: Vec<Peekable<vec::IntoIter<LogEvent>>> =
        streams.into_iter().map(|s| s.into_iter().peekable()).collect();

    let mut merged = Vec::with_capacity(total);
    loop {
        let mut next: Option<(usize, (LamportCounter, ServerId))> = None;
        for (i, head) in heads.iter_mut().enumerate() {
            if let Some(event) = head.peek() {
                let key = (event.counter(), event.origin);
                if next.map_or(true, |(_, best)| key < best) {
                    next = Some((i, key));
                }
            }
        }

        match next.and_then(|(i, _)| heads[i].next()) {
            Some(event) => merged.push(event),
            None => return merged,
        }
    }
}
