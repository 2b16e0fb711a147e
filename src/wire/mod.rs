//! Binary encodings of everything servers and clients send each other.

mod client;
mod codec;
mod peer;

pub use client::ClientRequest;
pub use client::ClientRequestError;
pub use client::ClientResponse;
pub use client::MAX_NAME_LEN;
pub use codec::DecodeError;
pub use codec::MAX_MESSAGE_LEN;
pub use peer::PeerMessage;
