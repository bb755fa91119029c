//! Actor identity and mailbox addresses

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Unique identity of a spawned actor
///
/// A restarted actor with the same device or home id gets a fresh `ActorId`,
/// so stale termination notices can never be confused with the new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(Uuid);

impl ActorId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The target actor's mailbox has been dropped
#[derive(Debug, Error)]
#[error("mailbox of actor {0} is closed")]
pub struct MailboxClosed(pub ActorId);

/// Address of a running actor
///
/// Cheap to clone. Holding an `Addr` never gives access to the actor's state,
/// only the ability to enqueue messages for it.
pub struct Addr<M> {
    id: ActorId,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Addr<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Addr<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addr").field("id", &self.id).finish()
    }
}

/// Create a mailbox with a fresh actor identity
pub fn mailbox<M>(buffer: usize) -> (Addr<M>, mpsc::Receiver<M>) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (Addr { id: ActorId::new(), tx }, rx)
}

impl<M> Addr<M> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Enqueue a message, waiting for mailbox capacity
    pub async fn tell(&self, msg: M) -> Result<(), MailboxClosed> {
        self.tx.send(msg).await.map_err(|_| MailboxClosed(self.id))
    }

    /// True once the actor has exited and dropped its mailbox
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the actor has exited and dropped its mailbox
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Non-owning address, used by actors to refer to themselves
    pub fn downgrade(&self) -> WeakAddr<M> {
        WeakAddr {
            id: self.id,
            tx: self.tx.downgrade(),
        }
    }
}

/// Address that does not keep the mailbox alive
pub struct WeakAddr<M> {
    id: ActorId,
    tx: mpsc::WeakSender<M>,
}

impl<M> Clone for WeakAddr<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            tx: self.tx.clone(),
        }
    }
}

impl<M> WeakAddr<M> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn upgrade(&self) -> Option<Addr<M>> {
        self.tx.upgrade().map(|tx| Addr { id: self.id, tx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tell_delivers_message() {
        let (addr, mut rx) = mailbox::<u32>(4);
        addr.tell(7).await.unwrap();
        assert_eq!(rx.recv().await, Some(7));
    }

    #[tokio::test]
    async fn test_tell_fails_after_receiver_dropped() {
        let (addr, rx) = mailbox::<u32>(4);
        drop(rx);
        assert!(addr.is_closed());
        let err = addr.tell(1).await.unwrap_err();
        assert_eq!(err.0, addr.id());
    }

    #[test]
    fn test_actor_ids_are_unique() {
        let (a, _ra) = mailbox::<()>(1);
        let (b, _rb) = mailbox::<()>(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[tokio::test]
    async fn test_weak_addr_does_not_keep_mailbox_open() {
        let (addr, mut rx) = mailbox::<u32>(4);
        let weak = addr.downgrade();
        assert!(weak.upgrade().is_some());

        drop(addr);
        assert!(weak.upgrade().is_none());
        assert_eq!(rx.recv().await, None);
    }
}
