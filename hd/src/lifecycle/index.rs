//! Parent-side index of child actors

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::debug;

use super::addr::{ActorId, Addr};
use super::watch::{WatchGuard, watch};

/// Children of a parent actor, keyed both ways
///
/// `by_id` maps a domain id (device id, home name) to the child's address and
/// `by_actor` maps the child's identity back to the domain id. Both maps and
/// the watch set only change through the methods here, so they always hold
/// exactly the same children.
pub struct ChildIndex<M> {
    by_id: HashMap<String, Addr<M>>,
    by_actor: HashMap<ActorId, String>,
    watches: HashMap<ActorId, WatchGuard>,
}

impl<M> Default for ChildIndex<M> {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_actor: HashMap::new(),
            watches: HashMap::new(),
        }
    }
}

impl<M: Send + 'static> ChildIndex<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of children still running
    pub fn len(&self) -> usize {
        self.by_id.values().filter(|addr| !addr.is_closed()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<&Addr<M>> {
        self.by_id.get(id)
    }

    /// Live child for `id`, ignoring an entry whose actor already exited
    pub fn get_live(&self, id: &str) -> Option<&Addr<M>> {
        self.by_id.get(id).filter(|addr| !addr.is_closed())
    }

    /// Register a child and watch it; its `ActorId` arrives on `terminated`
    /// when it exits. Replaces any previous child under the same id.
    pub fn insert(&mut self, id: String, addr: Addr<M>, terminated: &mpsc::UnboundedSender<ActorId>) {
        if let Some(previous) = self.by_id.remove(&id) {
            debug!(%id, actor = %previous.id(), "ChildIndex::insert: replacing child");
            self.by_actor.remove(&previous.id());
            self.watches.remove(&previous.id());
        }
        let actor = addr.id();
        self.watches.insert(actor, watch(&addr, terminated.clone(), actor));
        self.by_actor.insert(actor, id.clone());
        self.by_id.insert(id, addr);
    }

    /// Forget a child before stopping it; its termination notice is discarded
    pub fn remove(&mut self, id: &str) -> Option<Addr<M>> {
        let addr = self.by_id.remove(id)?;
        self.by_actor.remove(&addr.id());
        self.watches.remove(&addr.id());
        Some(addr)
    }

    /// Forget a child that terminated
    ///
    /// Unknown actors are a silent no-op; the child may already have been
    /// replaced or removed.
    pub fn remove_terminated(&mut self, actor: ActorId) -> Option<String> {
        let id = self.by_actor.remove(&actor)?;
        self.watches.remove(&actor);
        if self.by_id.get(&id).is_some_and(|addr| addr.id() == actor) {
            self.by_id.remove(&id);
        }
        Some(id)
    }

    /// Sorted snapshot of the ids of running children
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .by_id
            .iter()
            .filter(|(_, addr)| !addr.is_closed())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Snapshot of every child, suitable for handing to a gather
    pub fn snapshot(&self) -> Vec<(String, Addr<M>)> {
        self.by_id.iter().map(|(id, addr)| (id.clone(), addr.clone())).collect()
    }

    /// Remove every child without waiting for termination notices
    pub fn drain(&mut self) -> Vec<(String, Addr<M>)> {
        self.by_actor.clear();
        self.watches.clear();
        self.by_id.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::lifecycle::mailbox;

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (term_tx, _term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (addr, _rx) = mailbox::<()>(1);

        index.insert("d1".to_string(), addr.clone(), &term_tx);

        assert_eq!(index.len(), 1);
        assert!(index.contains("d1"));
        assert_eq!(index.get("d1").map(|a| a.id()), Some(addr.id()));
        assert_eq!(index.ids(), vec!["d1".to_string()]);
    }

    #[tokio::test]
    async fn test_terminated_child_is_removed() {
        let (term_tx, mut term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (addr, rx) = mailbox::<()>(1);
        index.insert("d1".to_string(), addr, &term_tx);

        drop(rx);
        let actor = tokio::time::timeout(Duration::from_secs(1), term_rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(index.remove_terminated(actor), Some("d1".to_string()));
        assert!(index.is_empty());
        assert_eq!(index.remove_terminated(actor), None);
    }

    #[tokio::test]
    async fn test_stale_termination_keeps_replacement() {
        let (term_tx, _term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (old, _old_rx) = mailbox::<()>(1);
        let (new, _new_rx) = mailbox::<()>(1);

        index.insert("d1".to_string(), old.clone(), &term_tx);
        index.insert("d1".to_string(), new.clone(), &term_tx);

        assert_eq!(index.remove_terminated(old.id()), None);
        assert_eq!(index.get("d1").map(|a| a.id()), Some(new.id()));
    }

    #[tokio::test]
    async fn test_get_live_skips_exited_child() {
        let (term_tx, _term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (addr, rx) = mailbox::<()>(1);
        index.insert("d1".to_string(), addr, &term_tx);

        assert!(index.get_live("d1").is_some());
        drop(rx);
        assert!(index.get_live("d1").is_none());
        assert!(index.contains("d1"));
        assert_eq!(index.len(), 0);
        assert!(index.ids().is_empty());
    }

    #[tokio::test]
    async fn test_removed_child_is_forgotten_at_once() {
        let (term_tx, mut term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (addr, rx) = mailbox::<()>(1);
        index.insert("d1".to_string(), addr.clone(), &term_tx);

        let removed = index.remove("d1").map(|a| a.id());
        assert_eq!(removed, Some(addr.id()));
        assert!(index.is_empty());
        assert!(index.remove("d1").is_none());

        drop(term_tx);
        drop(rx);
        assert_eq!(term_rx.recv().await, None);
        assert_eq!(index.remove_terminated(addr.id()), None);
    }

    #[tokio::test]
    async fn test_drain_empties_index() {
        let (term_tx, _term_rx) = mpsc::unbounded_channel();
        let mut index = ChildIndex::new();
        let (a, _ra) = mailbox::<()>(1);
        let (b, _rb) = mailbox::<()>(1);
        index.insert("a".to_string(), a, &term_tx);
        index.insert("b".to_string(), b, &term_tx);

        let drained = index.drain();
        assert_eq!(drained.len(), 2);
        assert!(index.is_empty());
        assert!(index.ids().is_empty());
    }
}
