//! Generic scatter/gather coordinator

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::reply::ReplyTo;
use super::stats::GatherStats;
use crate::lifecycle::{ActorId, Addr, Deadline, WatchGuard, watch};

/// What varies between aggregations
///
/// A policy builds the per-target request, folds each reply into the partial
/// output and decides what outstanding targets leave behind when they
/// terminate or when the deadline fires.
pub trait GatherPolicy: Send + 'static {
    /// Message sent to each target
    type Command: Send + 'static;
    /// Reply expected from each target
    type Reply: Send + 'static;
    /// Accumulated result handed to the requester
    type Output: Send + 'static;

    /// Short name used in logs
    fn kind(&self) -> &'static str;

    fn initial(&self) -> Self::Output;

    /// Build the request for one target; `None` skips the target
    fn request(&self, key: &str, reply_to: ReplyTo<Self::Reply>) -> Option<Self::Command>;

    fn merge(&self, acc: Self::Output, key: String, reply: Self::Reply) -> Self::Output;

    /// A watched target exited before replying
    fn on_terminated(&self, acc: Self::Output, _key: String) -> Self::Output {
        acc
    }

    /// The deadline fired; `outstanding` is sorted
    fn on_timeout(&self, acc: Self::Output, _outstanding: Vec<String>) -> Self::Output {
        acc
    }

    /// Whether target termination should resolve that target early
    fn watches_targets(&self) -> bool {
        false
    }
}

/// Message delivered to a running gather
#[derive(Debug)]
pub enum GatherEvent<R> {
    Reply { key: String, reply: R },
    Terminated { key: String },
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    TimedOut { missing: usize },
}

enum Phase<O> {
    Collecting { acc: O, outstanding: HashSet<String> },
    Finalized { output: O, outcome: Outcome },
}

/// One in-flight aggregation
pub struct Gather<P: GatherPolicy> {
    policy: P,
    targets: Vec<(String, Addr<P::Command>)>,
    requester: ReplyTo<P::Output>,
    timeout: Duration,
    stats: Arc<GatherStats>,
}

impl<P: GatherPolicy> Gather<P> {
    pub fn new(policy: P, requester: ReplyTo<P::Output>, timeout: Duration, stats: Arc<GatherStats>) -> Self {
        Self {
            policy,
            targets: Vec::new(),
            requester,
            timeout,
            stats,
        }
    }

    pub fn target(mut self, key: impl Into<String>, addr: Addr<P::Command>) -> Self {
        self.targets.push((key.into(), addr));
        self
    }

    pub fn targets<I>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = (String, Addr<P::Command>)>,
    {
        self.targets.extend(targets);
        self
    }

    /// Start the gather on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Self {
            policy,
            targets,
            requester,
            timeout,
            stats,
        } = self;
        let id = ActorId::new();
        let kind = policy.kind();
        debug!(gather = %id, kind, targets = targets.len(), "Gather started");
        stats.record_started();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut deadline = Deadline::arm(timeout, tx.clone(), GatherEvent::Deadline);
        let mut outstanding = HashSet::new();
        let mut watches: Vec<WatchGuard> = Vec::new();
        let mut sends: Vec<JoinHandle<()>> = Vec::new();

        // Each send runs on its own task; a full mailbox must not delay the deadline
        for (key, addr) in targets {
            let reply_tx = tx.clone();
            let reply_key = key.clone();
            let reply_to = ReplyTo::from_fn(move |reply| {
                let _ = reply_tx.send(GatherEvent::Reply { key: reply_key, reply });
            });
            let Some(command) = policy.request(&key, reply_to) else {
                debug!(gather = %id, kind, %key, "Skipping target");
                continue;
            };
            if policy.watches_targets() {
                watches.push(watch(&addr, tx.clone(), GatherEvent::Terminated { key: key.clone() }));
            }
            let send_key = key.clone();
            sends.push(tokio::spawn(async move {
                if let Err(e) = addr.tell(command).await {
                    debug!(gather = %id, kind, key = %send_key, "Target unreachable: {}", e);
                }
            }));
            outstanding.insert(key);
        }
        drop(tx);

        let mut phase = if outstanding.is_empty() {
            Phase::Finalized {
                output: policy.initial(),
                outcome: Outcome::Complete,
            }
        } else {
            Phase::Collecting {
                acc: policy.initial(),
                outstanding,
            }
        };

        let (output, outcome) = loop {
            match phase {
                Phase::Finalized { output, outcome } => break (output, outcome),
                Phase::Collecting { acc, outstanding } => {
                    phase = match rx.recv().await {
                        Some(event) => step(&policy, acc, outstanding, event, &stats),
                        None => expire(&policy, acc, outstanding),
                    };
                }
            }
        };

        deadline.cancel();
        drop(watches);
        for send in sends {
            send.abort();
        }

        match outcome {
            Outcome::Complete => {
                stats.record_completed();
                debug!(gather = %id, kind, "Gather complete");
            }
            Outcome::TimedOut { missing } => {
                stats.record_timed_out();
                warn!(gather = %id, kind, missing, "Gather timed out");
            }
        }
        requester.send(output);
    }
}

fn step<P: GatherPolicy>(
    policy: &P,
    acc: P::Output,
    outstanding: HashSet<String>,
    event: GatherEvent<P::Reply>,
    stats: &GatherStats,
) -> Phase<P::Output> {
    match event {
        GatherEvent::Reply { key, reply } => {
            if !outstanding.contains(&key) {
                debug!(kind = policy.kind(), %key, "Ignoring reply from settled target");
                stats.record_ignored_reply();
                return Phase::Collecting { acc, outstanding };
            }
            let outstanding = without(outstanding, &key);
            settle(policy.merge(acc, key, reply), outstanding)
        }
        GatherEvent::Terminated { key } => {
            if !outstanding.contains(&key) {
                debug!(kind = policy.kind(), %key, "Ignoring termination of settled target");
                return Phase::Collecting { acc, outstanding };
            }
            debug!(kind = policy.kind(), %key, "Target terminated before replying");
            let outstanding = without(outstanding, &key);
            settle(policy.on_terminated(acc, key), outstanding)
        }
        GatherEvent::Deadline => expire(policy, acc, outstanding),
    }
}

fn without(outstanding: HashSet<String>, key: &str) -> HashSet<String> {
    outstanding.into_iter().filter(|k| k != key).collect()
}

fn settle<O>(acc: O, outstanding: HashSet<String>) -> Phase<O> {
    if outstanding.is_empty() {
        Phase::Finalized {
            output: acc,
            outcome: Outcome::Complete,
        }
    } else {
        Phase::Collecting { acc, outstanding }
    }
}

fn expire<P: GatherPolicy>(policy: &P, acc: P::Output, outstanding: HashSet<String>) -> Phase<P::Output> {
    let missing = outstanding.len();
    let mut outstanding: Vec<String> = outstanding.into_iter().collect();
    outstanding.sort();
    Phase::Finalized {
        output: policy.on_timeout(acc, outstanding),
        outcome: Outcome::TimedOut { missing },
    }
}
