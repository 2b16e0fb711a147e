use crate::transport::ClientGroup;
use crate::wire::ClientRequest;
use std::collections::VecDeque;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReplicationState {
    /// Client mutations are stamped and applied as they arrive.
    Primary,
    /// Waiting for every present server to report the same knowledge. Client mutations queue up.
    Reconciling,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PendingRequest {
    pub(crate) sender: ClientGroup,
    pub(crate) request: ClientRequest,
}

/// Client mutations received while reconciling, in receipt order.
#[derive(Debug, Default)]
pub(crate) struct PendingUpdateQueue {
    queue: VecDeque<PendingRequest>,
}

impl PendingUpdateQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sender: ClientGroup, request: ClientRequest) {
        self.queue.push_back(PendingRequest { sender, request });
    }

    /// Take everything queued so far, oldest first.
    pub(crate) fn take_all(&mut self) -> VecDeque<PendingRequest> {
        std::mem::take(&mut self.queue)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }
}
