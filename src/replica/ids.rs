use std::fmt;

/// Number of replicas in a deployment. Every server knows every other server's id up front.
pub const NUM_SERVERS: usize = 5;

/// ServerId identifies one of the `NUM_SERVERS` replicas. Valid ids are `1..=NUM_SERVERS`.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ServerId(u32);

#[derive(Debug, thiserror::Error)]
#[error("server id {0} is outside the range [1, {}]", NUM_SERVERS)]
pub struct InvalidServerId(pub u32);

impl ServerId {
    pub fn new(id: u32) -> Result<Self, InvalidServerId> {
        if id >= 1 && id as usize <= NUM_SERVERS {
            Ok(ServerId(id))
        } else {
            Err(InvalidServerId(id))
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Iterate all server ids in ascending order.
    pub fn all() -> impl Iterator<Item = ServerId> {
        (1..=NUM_SERVERS as u32).map(ServerId)
    }

    // Zero-based, for indexing into per-server arrays.
    pub(crate) fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// LamportCounter is stamped on every event a server originates. Within a single origin it is
/// strictly increasing, so `(origin, counter)` names an event globally.
#[derive(Copy, Clone, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct LamportCounter(u32);

impl LamportCounter {
    pub fn new(counter: u32) -> Self {
        LamportCounter(counter)
    }

    pub fn zero() -> Self {
        LamportCounter(0)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// The following counter, or None once the counter space is used up.
    pub(crate) fn checked_next(&self) -> Option<Self> {
        self.0.checked_add(1).map(LamportCounter)
    }
}

impl fmt::Debug for LamportCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LamportCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lts (logical timestamp) is the canonical id of a message or event.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Lts {
    pub origin: ServerId,
    pub counter: LamportCounter,
}

impl Lts {
    pub fn new(origin: ServerId, counter: LamportCounter) -> Self {
        Lts { origin, counter }
    }
}

impl fmt::Debug for Lts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {})", self.origin, self.counter)
    }
}
