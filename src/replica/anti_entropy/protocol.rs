use crate::replica::ids::{LamportCounter, ServerId};
use crate::replica::lamport_matrix::LamportMatrix;
use crate::replica::membership::ServerMembership;

/// Events from `origin` with counters in `(after, through]` that some present server is missing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ResendRange {
    pub(crate) origin: ServerId,
    pub(crate) after: LamportCounter,
    pub(crate) through: LamportCounter,
}

/// Fold `sender`'s matrix into ours.
///
/// Our own row is never taken from anyone else. The sender's row is its own report about itself
/// and rows of third parties are second hand, but both only ever move cells up.
///
/// Returns true if the sender's copy of our row is behind our actual row, meaning we must
/// broadcast our matrix again.
pub(crate) fn merge_received_matrix(
    local: &mut LamportMatrix,
    me: ServerId,
    sender: ServerId,
    received: &LamportMatrix,
) -> bool {
    debug_assert_ne!(me, sender);

    for observer in ServerId::all().filter(|o| *o != me) {
        local.raise_row(observer, received.row(observer));
    }

    ServerId::all().any(|origin| received.get(me, origin) < local.get(me, origin))
}

/// Decide whether this server should resend `target`'s events, and which ones.
///
/// - We resend our own events when a present peer is missing some of them.
/// - A present server resends its own events, so we do nothing for it.
/// - For an absent server, the present server that has the most of its events resends what the
///   least informed present server lacks. Ties go to the lowest server id, so exactly one server
///   takes over.
pub(crate) fn responsible_to_resend(
    matrix: &LamportMatrix,
    membership: &ServerMembership,
    me: ServerId,
    target: ServerId,
) -> Option<ResendRange> {
    if target == me {
        let latest = matrix.get(me, me);
        let least_known = membership.present_peers().map(|p| matrix.get(p, me)).min()?;
        return if least_known < latest {
            Some(ResendRange {
                origin: me,
                after: least_known,
                through: latest,
            })
        } else {
            None
        };
    }

    if membership.is_present(target) {
        return None;
    }

    let mut best: Option<(ServerId, LamportCounter)> = None;
    let mut least_known: Option<LamportCounter> = None;
    for member in membership.present_members() {
        let known = matrix.get(member, target);
        if best.map_or(true, |(_, max)| known > max) {
            best = Some((member, known));
        }
        if least_known.map_or(true, |min| known < min) {
            least_known = Some(known);
        }
    }

    match (best, least_known) {
        (Some((holder, max)), Some(min)) if holder == me && min < max => Some(ResendRange {
            origin: target,
            after: min,
            through: max,
        }),
        _ => None,
    }
}

/// Every present peer, as far as we know, has seen exactly what we have.
pub(crate) fn primary_condition_holds(matrix: &LamportMatrix, membership: &ServerMembership, me: ServerId) -> bool {
    membership.present_peers().all(|peer| matrix.rows_agree(peer, me))
}
