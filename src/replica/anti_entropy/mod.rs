//! Anti-entropy: servers exchange their lamport matrices to find out who is missing what, elect
//! exactly one resender per missing range, and decide when reconciliation is over.

mod protocol;
mod timer;

pub(crate) use protocol::merge_received_matrix;
pub(crate) use protocol::primary_condition_holds;
pub(crate) use protocol::responsible_to_resend;
pub(crate) use protocol::ResendRange;
pub(crate) use timer::AntiEntropyTimerHandle;
