//! Requests waiting for their response, by sequence number.

use std::collections::HashMap;

use tokio::sync::oneshot;
use transport::{Response, Seq};

use crate::error::{DebuggerError, SessionError};

pub(crate) type ResponseSender = oneshot::Sender<Result<Response, DebuggerError>>;

#[derive(Default)]
pub(crate) struct PendingRequests {
    pending: HashMap<Seq, ResponseSender>,
}

impl PendingRequests {
    pub(crate) fn insert(&mut self, seq: Seq, tx: ResponseSender) {
        if self.pending.insert(seq, tx).is_some() {
            tracing::warn!(seq, "replaced a pending request with the same sequence number");
        }
    }

    /// Remove the waiter for `seq`, if any.
    pub(crate) fn take(&mut self, seq: Seq) -> Option<ResponseSender> {
        self.pending.remove(&seq)
    }

    /// Resolve every waiter with `reason`.
    pub(crate) fn fail_all(&mut self, reason: &SessionError) {
        for (seq, tx) in self.pending.drain() {
            tracing::debug!(seq, %reason, "failing pending request");
            let _ = tx.send(Err(reason.duplicate().into()));
        }
    }

    #[allow(dead_code)]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_all_resolves_every_waiter() {
        let mut pending = PendingRequests::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        pending.insert(1, tx1);
        pending.insert(2, tx2);
        assert_eq!(pending.len(), 2);

        pending.fail_all(&SessionError::Disconnected);
        assert!(pending.is_empty());
        for mut rx in [rx1, rx2] {
            assert!(matches!(
                rx.try_recv(),
                Ok(Err(DebuggerError::Session(SessionError::Disconnected)))
            ));
        }
    }

    #[test]
    fn take_removes_only_the_matching_entry() {
        let mut pending = PendingRequests::default();
        let (tx, _rx) = oneshot::channel();
        pending.insert(7, tx);
        assert!(pending.take(8).is_none());
        assert!(pending.take(7).is_some());
        assert!(pending.is_empty());
    }
}
