// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory collaborators for tests.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use keyward_core::{AuditEvent, AuditMeta, AuditSink, KeywardError, RateCount, RateLimiter};

/// One captured `append` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event: AuditEvent,
    pub user_id: Option<String>,
    pub meta: AuditMeta,
}

/// Audit sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingAuditSink {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, event: AuditEvent) -> usize {
        self.events().iter().filter(|e| e.event == event).count()
    }
}

impl AuditSink for RecordingAuditSink {
    fn append(&self, event: AuditEvent, user_id: Option<&str>, meta: AuditMeta) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedEvent {
                event,
                user_id: user_id.map(str::to_string),
                meta,
            });
    }
}

/// Fixed-window counter in a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryRateLimiter {
    windows: DashMap<String, (u64, Instant)>,
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn increment(&self, key: &str, window: Duration) -> Result<RateCount, KeywardError> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert((0, now + window));
        if entry.1 <= now {
            *entry = (0, now + window);
        }
        entry.0 += 1;
        Ok(RateCount {
            count: entry.0,
            ttl_remaining: entry.1.saturating_duration_since(now),
        })
    }

    async fn purge_expired(&self) -> Result<usize, KeywardError> {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, (_, expires)| *expires > now);
        Ok(before.saturating_sub(self.windows.len()))
    }
}

impl MemoryRateLimiter {
    /// Number of live counters, lapsed or not.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// A counter collaborator that is always unreachable.
#[derive(Debug, Default)]
pub struct FailingRateLimiter;

#[async_trait]
impl RateLimiter for FailingRateLimiter {
    async fn increment(&self, _key: &str, _window: Duration) -> Result<RateCount, KeywardError> {
        Err(KeywardError::storage(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "rate limit store unreachable",
        )))
    }

    async fn purge_expired(&self) -> Result<usize, KeywardError> {
        Err(KeywardError::storage(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "rate limit store unreachable",
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_limiter_counts_per_key() {
        let limiter = MemoryRateLimiter::default();
        let w = Duration::from_secs(60);
        assert_eq!(limiter.increment("a", w).await.unwrap().count, 1);
        assert_eq!(limiter.increment("a", w).await.unwrap().count, 2);
        assert_eq!(limiter.increment("b", w).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn memory_limiter_resets_after_window() {
        let limiter = MemoryRateLimiter::default();
        let w = Duration::from_millis(20);
        limiter.increment("a", w).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(limiter.increment("a", w).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn memory_limiter_purges_lapsed_windows() {
        let limiter = MemoryRateLimiter::default();
        limiter.increment("short", Duration::from_millis(20)).await.unwrap();
        limiter.increment("long", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(limiter.purge_expired().await.unwrap(), 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn recording_sink_captures_events() {
        let sink = RecordingAuditSink::default();
        sink.append(AuditEvent::Signup, Some("u"), AuditMeta::new());
        sink.append(AuditEvent::Signup, None, AuditMeta::new());
        assert_eq!(sink.count(AuditEvent::Signup), 2);
        assert_eq!(sink.events()[0].user_id.as_deref(), Some("u"));
    }
}
