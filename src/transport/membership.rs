use crate::replica::ServerId;

/// Why the server group's membership changed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MembershipCause {
    Join,
    Leave,
    Disconnect,
    /// The network partitioned or healed. Members may have both joined and left.
    Network,
}

/// A membership notification for the server group, listing everyone now in it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerMembershipChange {
    pub cause: MembershipCause,
    pub members: Vec<ServerId>,
}
