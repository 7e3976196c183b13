// SPDX-License-Identifier: MIT OR Apache-2.0
//! Storage backends for dead-letter entries.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conduit_core::{DeadLetterEntry, DeadLetterQueryFilter};
use tokio::sync::Mutex;

/// Aggregate counters returned by [`DeadLetterStore::get_statistics`].
#[derive(Debug, Clone, Default)]
pub struct DeadLetterStatistics {
    /// Total number of entries currently stored.
    pub total_count: u64,
    /// Entries moved to the dead-letter queue within `time_window`.
    pub recent_count: u64,
    /// The window used to compute `recent_count`.
    pub time_window: Duration,
    /// Entry count grouped by message type.
    pub messages_by_type: BTreeMap<String, u64>,
    /// Entry count grouped by dead-letter reason.
    pub messages_by_reason: BTreeMap<String, u64>,
    /// Earliest `moved_to_dead_letter_at` across all entries.
    pub oldest_message_date: Option<DateTime<Utc>>,
    /// Latest `moved_to_dead_letter_at` across all entries.
    pub newest_message_date: Option<DateTime<Utc>>,
}

/// Persistence contract for dead-letter entries.
#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    /// Persist a new entry, returning its assigned id.
    async fn store(&self, entry: DeadLetterEntry) -> Result<String, String>;

    /// Entries matching `filter`, most-recent first, honoring
    /// `filter.skip` and capped at `limit` (if given).
    async fn get_entries(&self, filter: &DeadLetterQueryFilter, limit: Option<usize>) -> Vec<DeadLetterEntry>;

    /// A single entry by id.
    async fn get_entry(&self, entry_id: &str) -> Option<DeadLetterEntry>;

    /// Mark an entry replayed. Returns `false` if the entry does not
    /// exist.
    async fn mark_replayed(&self, entry_id: &str) -> bool;

    /// Remove a single entry. Returns `false` if it did not exist.
    async fn purge(&self, entry_id: &str) -> bool;

    /// Remove every entry older than `age`; returns the count removed.
    async fn purge_older_than(&self, age: Duration) -> u64;

    /// Count of entries matching `filter`.
    async fn get_count(&self, filter: &DeadLetterQueryFilter) -> u64;

    /// Aggregate statistics over `time_window`.
    async fn get_statistics(&self, time_window: Duration) -> DeadLetterStatistics;
}

/// An in-process, non-persistent dead-letter store.
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl InMemoryDeadLetterStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn store(&self, entry: DeadLetterEntry) -> Result<String, String> {
        let id = entry.id.clone();
        self.entries.lock().await.push(entry);
        Ok(id)
    }

    async fn get_entries(&self, filter: &DeadLetterQueryFilter, limit: Option<usize>) -> Vec<DeadLetterEntry> {
        let entries = self.entries.lock().await;
        let mut matched: Vec<&DeadLetterEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
        matched.sort_by(|a, b| b.moved_to_dead_letter_at.cmp(&a.moved_to_dead_letter_at));
        matched
            .into_iter()
            .skip(filter.skip)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    async fn get_entry(&self, entry_id: &str) -> Option<DeadLetterEntry> {
        self.entries.lock().await.iter().find(|e| e.id == entry_id).cloned()
    }

    async fn mark_replayed(&self, entry_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.is_replayed = true;
            entry.replayed_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    async fn purge(&self, entry_id: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.id != entry_id);
        entries.len() != before
    }

    async fn purge_older_than(&self, age: Duration) -> u64 {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| e.moved_to_dead_letter_at >= cutoff);
        (before - entries.len()) as u64
    }

    async fn get_count(&self, filter: &DeadLetterQueryFilter) -> u64 {
        self.entries.lock().await.iter().filter(|e| filter.matches(e)).count() as u64
    }

    async fn get_statistics(&self, time_window: Duration) -> DeadLetterStatistics {
        let entries = self.entries.lock().await;
        let cutoff = Utc::now() - chrono::Duration::from_std(time_window).unwrap_or(chrono::Duration::zero());
        let mut stats = DeadLetterStatistics {
            total_count: entries.len() as u64,
            time_window,
            ..Default::default()
        };
        for entry in entries.iter() {
            *stats.messages_by_type.entry(entry.message_type.clone()).or_insert(0) += 1;
            *stats.messages_by_reason.entry(entry.reason.to_string()).or_insert(0) += 1;
            if entry.moved_to_dead_letter_at >= cutoff {
                stats.recent_count += 1;
            }
            stats.oldest_message_date = Some(match stats.oldest_message_date {
                Some(current) if current <= entry.moved_to_dead_letter_at => current,
                _ => entry.moved_to_dead_letter_at,
            });
            stats.newest_message_date = Some(match stats.newest_message_date {
                Some(current) if current >= entry.moved_to_dead_letter_at => current,
                _ => entry.moved_to_dead_letter_at,
            });
        }
        stats
    }
}

/// A no-op store: enqueues are discarded, every query returns empty.
#[derive(Default)]
pub struct NullDeadLetterStore;

#[async_trait]
impl DeadLetterStore for NullDeadLetterStore {
    async fn store(&self, entry: DeadLetterEntry) -> Result<String, String> {
        Ok(entry.id)
    }

    async fn get_entries(&self, _filter: &DeadLetterQueryFilter, _limit: Option<usize>) -> Vec<DeadLetterEntry> {
        Vec::new()
    }

    async fn get_entry(&self, _entry_id: &str) -> Option<DeadLetterEntry> {
        None
    }

    async fn mark_replayed(&self, _entry_id: &str) -> bool {
        false
    }

    async fn purge(&self, _entry_id: &str) -> bool {
        false
    }

    async fn purge_older_than(&self, _age: Duration) -> u64 {
        0
    }

    async fn get_count(&self, _filter: &DeadLetterQueryFilter) -> u64 {
        0
    }

    async fn get_statistics(&self, time_window: Duration) -> DeadLetterStatistics {
        DeadLetterStatistics {
            time_window,
            ..Default::default()
        }
    }
}
