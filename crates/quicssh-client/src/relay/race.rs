//! "First of N" wait over spawned tasks.
//!
//! Each task is spawned under a key and yields exactly one value. Tasks are
//! reported in the order they finish, so the first call to
//! [`Race::next_finished`] returns the winner. Whatever the others produce
//! later is handed back by [`Race::drain`] and is the caller's to ignore.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::task::{Id, JoinError, JoinSet};

/// One finished task: its key and what it returned (or how it died).
#[derive(Debug)]
pub struct Finished<K, T> {
    pub key: K,
    pub outcome: Result<T, JoinError>,
}

/// Result of waiting for the remaining tasks.
#[derive(Debug)]
pub struct Drained<K, T> {
    /// Tasks that finished on their own, in completion order.
    pub finished: Vec<Finished<K, T>>,
    /// Keys of tasks aborted because the grace period ran out.
    pub aborted: Vec<K>,
}

/// A set of keyed tasks raced against each other.
#[derive(Debug)]
pub struct Race<K, T> {
    tasks: JoinSet<T>,
    keys: HashMap<Id, K>,
}

impl<K: Copy, T: Send + 'static> Race<K, T> {
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            keys: HashMap::new(),
        }
    }

    /// Spawn `task` onto the runtime under `key`.
    pub fn spawn<F>(&mut self, key: K, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let handle = self.tasks.spawn(task);
        self.keys.insert(handle.id(), key);
    }

    /// Number of tasks that have not been reported yet.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next task to finish. `None` once every task is reported.
    pub async fn next_finished(&mut self) -> Option<Finished<K, T>> {
        let joined = self.tasks.join_next_with_id().await?;
        let (id, outcome) = match joined {
            Ok((id, value)) => (id, Ok(value)),
            Err(e) => (e.id(), Err(e)),
        };
        let key = self.keys.remove(&id)?;
        Some(Finished { key, outcome })
    }

    /// Wait for every remaining task.
    ///
    /// With a `grace` period, tasks still running when it elapses are aborted
    /// and listed in [`Drained::aborted`]. Without one, this waits as long as
    /// the tasks take.
    pub async fn drain(&mut self, grace: Option<Duration>) -> Drained<K, T> {
        let mut finished = Vec::with_capacity(self.len());

        let collect = async {
            while let Some(done) = self.next_finished().await {
                finished.push(done);
            }
        };
        let timed_out = match grace {
            Some(grace) => tokio::time::timeout(grace, collect).await.is_err(),
            None => {
                collect.await;
                false
            }
        };

        let mut aborted = Vec::new();
        if timed_out {
            aborted.extend(self.keys.drain().map(|(_, key)| key));
            self.tasks.shutdown().await;
        }
        Drained { finished, aborted }
    }
}

impl<K: Copy, T: Send + 'static> Default for Race<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
