//! In-memory record store owned by a single background task
//!
//! All reads and writes of the key→record mapping are serialized through a
//! tokio channel to one task, so the map is never touched from two threads
//! at once even on the multi-threaded runtime.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};

/// Capacity of the command channel feeding the store task
const COMMAND_BUFFER: usize = 64;

/// A stored value together with the time it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    /// The processed payload
    pub value: T,
    /// Clock reading taken when the value was stored
    pub stored_at: Instant,
}

/// Commands accepted by the store task
enum Command<T> {
    Get {
        key: String,
        reply: oneshot::Sender<Option<Record<T>>>,
    },
    Put {
        key: String,
        record: Record<T>,
    },
    Remove {
        key: String,
    },
    Clear,
}

/// Handle to the record store task
///
/// Cloning the handle shares the same underlying map. The task shuts down
/// once every handle has been dropped.
#[derive(Debug)]
pub struct RecordStore<T> {
    tx: mpsc::Sender<Command<T>>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> RecordStore<T>
where
    T: Clone + Send + 'static,
{
    /// Spawns the store task on the current tokio runtime
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::channel::<Command<T>>(COMMAND_BUFFER);

        tokio::spawn(async move {
            let mut records: HashMap<String, Record<T>> = HashMap::new();

            while let Some(command) = rx.recv().await {
                match command {
                    Command::Get { key, reply } => {
                        let _ = reply.send(records.get(&key).cloned());
                    }
                    Command::Put { key, record } => {
                        records.insert(key, record);
                    }
                    Command::Remove { key } => {
                        records.remove(&key);
                    }
                    Command::Clear => records.clear(),
                }
            }

            tracing::trace!("record store task stopped");
        });

        Self { tx }
    }

    /// Reads the record for `key`
    ///
    /// Returns `None` if no record exists, or if the store task is gone.
    pub async fn get(&self, key: &str) -> Option<Record<T>> {
        let (reply, rx) = oneshot::channel();
        let command = Command::Get {
            key: key.to_string(),
            reply,
        };
        if self.tx.send(command).await.is_err() {
            return None;
        }
        rx.await.ok().flatten()
    }

    /// Replaces the record for `key` wholesale
    pub async fn put(&self, key: &str, value: T, stored_at: Instant) {
        let command = Command::Put {
            key: key.to_string(),
            record: Record { value, stored_at },
        };
        let _ = self.tx.send(command).await;
    }

    /// Removes the record for `key`, if any
    pub async fn remove(&self, key: &str) {
        let _ = self.tx.send(Command::Remove { key: key.to_string() }).await;
    }

    /// Removes every record
    pub async fn clear(&self) {
        let _ = self.tx.send(Command::Clear).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_returns_none_for_missing_key() {
        let store: RecordStore<i32> = RecordStore::spawn();
        assert!(store.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_value_and_timestamp() {
        let store = RecordStore::spawn();
        let at = Instant::now();

        store.put("k", "value".to_string(), at).await;

        let record = store.get("k").await.expect("record should exist");
        assert_eq!(record.value, "value");
        assert_eq!(record.stored_at, at);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_record() {
        let store = RecordStore::spawn();
        let first = Instant::now();
        let second = first + Duration::from_secs(5);

        store.put("k", 1, first).await;
        store.put("k", 2, second).await;

        let record = store.get("k").await.expect("record should exist");
        assert_eq!(record, Record { value: 2, stored_at: second });
    }

    #[tokio::test]
    async fn test_remove_only_touches_one_key() {
        let store = RecordStore::spawn();
        let at = Instant::now();
        store.put("a", 1, at).await;
        store.put("b", 2, at).await;

        store.remove("a").await;

        assert!(store.get("a").await.is_none());
        assert_eq!(store.get("b").await.map(|r| r.value), Some(2));
    }

    #[tokio::test]
    async fn test_clear_empties_store() {
        let store = RecordStore::spawn();
        let at = Instant::now();
        store.put("a", 1, at).await;
        store.put("b", 2, at).await;

        store.clear().await;

        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_the_same_map() {
        let store = RecordStore::spawn();
        let other = store.clone();

        store.put("shared", 7, Instant::now()).await;

        assert_eq!(other.get("shared").await.map(|r| r.value), Some(7));
    }
}
