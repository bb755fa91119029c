//! One-shot deadline delivered as a mailbox message

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Cancellable one-shot timer
///
/// When the timer elapses the event is pushed into the owner's mailbox, so
/// the owner handles it in order with every other message. Cancelling after
/// the timer already fired is a no-op; the owner must tolerate the queued
/// event.
#[derive(Debug)]
pub struct Deadline {
    after: Duration,
    task: Option<JoinHandle<()>>,
}

impl Deadline {
    pub fn arm<T: Send + 'static>(after: Duration, notify: mpsc::UnboundedSender<T>, event: T) -> Self {
        debug!(?after, "Deadline::arm: called");
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = notify.send(event);
        });
        Self { after, task: Some(task) }
    }

    #[cfg(test)]
    pub fn after(&self) -> Duration {
        self.after
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(after = ?self.after, "Deadline::cancel: cancelling timer");
            task.abort();
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.cancel();
    }
}
