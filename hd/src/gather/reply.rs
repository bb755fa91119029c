//! One-shot reply capabilities

use std::fmt;

use tokio::sync::oneshot;

/// Capability to answer a single request
///
/// Whoever ends up holding it answers once by calling [`ReplyTo::send`].
/// Requests can be forwarded along with their `ReplyTo`, so the answer goes
/// straight back to the original asker. Sending to a requester that has gone
/// away is silently dropped.
pub struct ReplyTo<T> {
    deliver: Box<dyn FnOnce(T) + Send>,
}

impl<T: Send + 'static> ReplyTo<T> {
    pub fn from_fn(deliver: impl FnOnce(T) + Send + 'static) -> Self {
        Self {
            deliver: Box::new(deliver),
        }
    }

    pub fn oneshot(tx: oneshot::Sender<T>) -> Self {
        Self::from_fn(move |value| {
            let _ = tx.send(value);
        })
    }

    /// Reply that nobody waits for
    #[cfg(test)]
    pub fn ignore() -> Self {
        Self::from_fn(|_| {})
    }

    pub fn send(self, value: T) {
        (self.deliver)(value)
    }

    /// Adapt to a reply of another type
    pub fn map<U: Send + 'static>(self, f: impl FnOnce(U) -> T + Send + 'static) -> ReplyTo<U> {
        ReplyTo::from_fn(move |value| self.send(f(value)))
    }
}

impl<T> fmt::Debug for ReplyTo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyTo")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_oneshot_reply() {
        let (tx, rx) = oneshot::channel();
        ReplyTo::oneshot(tx).send(42);
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_map_converts_reply() {
        let (tx, rx) = oneshot::channel::<Option<String>>();
        let reply: ReplyTo<&str> = ReplyTo::oneshot(tx).map(|s: &str| Some(s.to_uppercase()));
        reply.send("kitchen");
        assert_eq!(rx.await.unwrap(), Some("KITCHEN".to_string()));
    }

    #[test]
    fn test_send_to_gone_requester_is_ignored() {
        let (tx, rx) = oneshot::channel::<u8>();
        drop(rx);
        ReplyTo::oneshot(tx).send(1);
        ReplyTo::<u8>::ignore().send(2);
    }
}
