//! The boundary to the group communication layer: where outbound messages go, and the membership
//! notifications that come back.

mod local_hub;
mod membership;
mod multicast;

pub use local_hub::LocalClient;
pub use local_hub::LocalHub;
pub use membership::MembershipCause;
pub use membership::ServerMembershipChange;
pub use multicast::ClientGroup;
pub use multicast::Destination;
pub use multicast::Multicast;
pub use multicast::MulticastRecorder;
pub use multicast::TransportError;
