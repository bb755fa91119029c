//! Termination watches

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::addr::Addr;

/// Active watch on another actor
///
/// Dropping the guard unwatches: the pending notification is discarded.
#[derive(Debug)]
pub struct WatchGuard {
    task: JoinHandle<()>,
}

impl WatchGuard {
    #[cfg(test)]
    pub fn unwatch(self) {}
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Deliver `event` to `notify` once the actor behind `addr` has exited
pub fn watch<M, T>(addr: &Addr<M>, notify: mpsc::UnboundedSender<T>, event: T) -> WatchGuard
where
    M: Send + 'static,
    T: Send + 'static,
{
    let target = addr.clone();
    let task = tokio::spawn(async move {
        target.closed().await;
        debug!(actor = %target.id(), "watch: watched actor terminated");
        let _ = notify.send(event);
    });
    WatchGuard { task }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lifecycle::mailbox;

    #[tokio::test]
    async fn test_watch_fires_when_actor_exits() {
        let (addr, rx) = mailbox::<()>(1);
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();

        let _guard = watch(&addr, notify_tx, addr.id());
        drop(rx);

        let fired = tokio::time::timeout(Duration::from_secs(1), notify_rx.recv())
            .await
            .unwrap();
        assert_eq!(fired, Some(addr.id()));
    }

    #[tokio::test]
    async fn test_dropped_guard_never_fires() {
        let (addr, rx) = mailbox::<()>(1);
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<&str>();

        let guard = watch(&addr, notify_tx, "gone");
        guard.unwatch();
        drop(rx);

        // The watcher task was aborted, so its sender is dropped without sending
        assert_eq!(notify_rx.recv().await, None);
    }
}
