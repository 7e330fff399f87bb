// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use crate::KindId;

/// A pending durable write, described as a value so the scheduler stays
/// decoupled from the store that executes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    ShelfOrder { kind_id: KindId, order: Vec<String> },
}

/// Persistence seam consumed by [`WriteScheduler::flush`]. The store
/// implements this; tests substitute a recorder.
pub trait OrderWriter {
    fn write(&mut self, request: &WriteRequest) -> Result<()>;
    fn write_catalog(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingWrite {
    key: String,
    request: WriteRequest,
}

/// Coalesces bursts of persist requests into one delayed write. Repeated
/// requests under the same key replace each other (last writer wins); a
/// flush executes everything pending in insertion order after a quiet
/// period, or immediately when invoked explicitly.
///
/// The scheduler owns no timer. Every operation takes `now` explicitly and
/// the host polls [`Self::is_due`] on its own tick. Dropping the scheduler
/// never flushes; a caller that wants the pending batch written must flush
/// explicitly first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteScheduler {
    debounce: Duration,
    pending: Vec<PendingWrite>,
    catalog_save_pending: bool,
    last_flush_at: Option<Instant>,
    next_flush_at: Option<Instant>,
}

impl WriteScheduler {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pending: Vec::new(),
            catalog_save_pending: false,
            last_flush_at: None,
            next_flush_at: None,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Record a pending write under `key`. An entry already pending under
    /// the same key is replaced in place; insertion order is otherwise
    /// preserved. Arms the delayed flush if none is armed. Never executes
    /// the request synchronously.
    ///
    /// An empty key is a contract violation at the call site, not a runtime
    /// condition, and fails fast.
    pub fn schedule(&mut self, key: impl Into<String>, request: WriteRequest, now: Instant) {
        let key = key.into();
        assert!(!key.is_empty(), "write key must not be empty");

        if let Some(entry) = self.pending.iter_mut().find(|entry| entry.key == key) {
            entry.request = request;
        } else {
            self.pending.push(PendingWrite { key, request });
        }
        self.arm(now);
    }

    /// Request a whole-catalog save. A standalone flag rather than a keyed
    /// entry; it executes after the keyed writes on the next flush.
    pub fn schedule_catalog_save(&mut self, now: Instant) {
        self.catalog_save_pending = true;
        self.arm(now);
    }

    fn arm(&mut self, now: Instant) {
        if self.next_flush_at.is_none() {
            self.next_flush_at = Some(now + self.debounce);
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_flush_at.is_some_and(|at| now >= at)
    }

    /// Execute every pending write in insertion order, then the catalog save
    /// if requested. The timer is disarmed before anything executes, so a
    /// host tick firing mid-flush cannot re-enter; only a later `schedule`
    /// re-arms it.
    ///
    /// On a writer error the pending entries and the catalog flag are left
    /// untouched so a later flush retries the same batch, and the error is
    /// returned to the caller.
    pub fn flush(&mut self, writer: &mut dyn OrderWriter, now: Instant) -> Result<usize> {
        self.next_flush_at = None;

        for entry in &self.pending {
            writer
                .write(&entry.request)
                .with_context(|| format!("flush pending write `{}`", entry.key))?;
        }
        if self.catalog_save_pending {
            writer.write_catalog().context("flush catalog save")?;
        }

        let executed = self.pending.len() + usize::from(self.catalog_save_pending);
        self.pending.clear();
        self.catalog_save_pending = false;
        self.last_flush_at = Some(now);
        Ok(executed)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_catalog_save_pending(&self) -> bool {
        self.catalog_save_pending
    }

    pub fn last_flush_at(&self) -> Option<Instant> {
        self.last_flush_at
    }

    pub fn next_flush_at(&self) -> Option<Instant> {
        self.next_flush_at
    }
}

impl Default for WriteScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::{OrderWriter, WriteRequest, WriteScheduler};
    use crate::KindId;
    use anyhow::{Result, bail};
    use std::time::{Duration, Instant};

    #[derive(Debug, Default)]
    struct RecordingWriter {
        writes: Vec<WriteRequest>,
        catalog_saves: usize,
        fail_next: bool,
    }

    impl OrderWriter for RecordingWriter {
        fn write(&mut self, request: &WriteRequest) -> Result<()> {
            if self.fail_next {
                bail!("simulated write failure");
            }
            self.writes.push(request.clone());
            Ok(())
        }

        fn write_catalog(&mut self) -> Result<()> {
            self.catalog_saves += 1;
            Ok(())
        }
    }

    fn order_request(tokens: &[&str]) -> WriteRequest {
        WriteRequest::ShelfOrder {
            kind_id: KindId::new(1),
            order: tokens.iter().map(|token| (*token).to_owned()).collect(),
        }
    }

    #[test]
    fn second_schedule_for_same_key_overwrites() {
        let mut scheduler = WriteScheduler::default();
        let now = Instant::now();

        scheduler.schedule("order:1", order_request(&["a", "b"]), now);
        scheduler.schedule("order:1", order_request(&["b", "a"]), now);
        assert_eq!(scheduler.pending_count(), 1);

        let mut writer = RecordingWriter::default();
        scheduler.flush(&mut writer, now).expect("flush");
        assert_eq!(writer.writes, vec![order_request(&["b", "a"])]);
    }

    #[test]
    fn nothing_writes_before_explicit_flush() {
        let mut scheduler = WriteScheduler::default();
        let now = Instant::now();
        let mut writer = RecordingWriter::default();

        scheduler.schedule("order:1", order_request(&["a"]), now);
        scheduler.schedule_catalog_save(now);
        assert!(writer.writes.is_empty());
        assert_eq!(writer.catalog_saves, 0);

        scheduler.flush(&mut writer, now).expect("flush");
        assert_eq!(writer.writes.len(), 1);
        assert_eq!(writer.catalog_saves, 1);
    }

    #[test]
    fn flush_preserves_insertion_order_across_overwrites() {
        let mut scheduler = WriteScheduler::default();
        let now = Instant::now();

        scheduler.schedule("order:1", order_request(&["a"]), now);
        scheduler.schedule("order:2", order_request(&["x"]), now);
        scheduler.schedule("order:1", order_request(&["a", "b"]), now);

        let mut writer = RecordingWriter::default();
        scheduler.flush(&mut writer, now).expect("flush");
        assert_eq!(
            writer.writes,
            vec![order_request(&["a", "b"]), order_request(&["x"])]
        );
    }

    #[test]
    fn debounce_arms_once_and_fires_after_interval() {
        let mut scheduler = WriteScheduler::new(Duration::from_millis(500));
        let start = Instant::now();

        scheduler.schedule("order:1", order_request(&["a"]), start);
        let armed_at = scheduler.next_flush_at().expect("armed");

        // A later schedule does not push the deadline out.
        scheduler.schedule(
            "order:1",
            order_request(&["b"]),
            start + Duration::from_millis(300),
        );
        assert_eq!(scheduler.next_flush_at(), Some(armed_at));

        assert!(!scheduler.is_due(start + Duration::from_millis(499)));
        assert!(scheduler.is_due(start + Duration::from_millis(500)));
    }

    #[test]
    fn flush_disarms_and_records_flush_time() {
        let mut scheduler = WriteScheduler::default();
        let now = Instant::now();
        let mut writer = RecordingWriter::default();

        scheduler.schedule("order:1", order_request(&["a"]), now);
        let later = now + Duration::from_secs(1);
        let executed = scheduler.flush(&mut writer, later).expect("flush");

        assert_eq!(executed, 1);
        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(scheduler.next_flush_at(), None);
        assert_eq!(scheduler.last_flush_at(), Some(later));
        assert!(!scheduler.is_due(later + Duration::from_secs(60)));
    }

    #[test]
    fn failed_flush_keeps_pending_batch_for_retry() {
        let mut scheduler = WriteScheduler::default();
        let now = Instant::now();

        scheduler.schedule("order:1", order_request(&["a"]), now);
        scheduler.schedule_catalog_save(now);

        let mut writer = RecordingWriter {
            fail_next: true,
            ..RecordingWriter::default()
        };
        let error = scheduler.flush(&mut writer, now).expect_err("write fails");
        assert!(error.to_string().contains("order:1"));

        assert_eq!(scheduler.pending_count(), 1);
        assert!(scheduler.is_catalog_save_pending());
        assert_eq!(scheduler.last_flush_at(), None);

        writer.fail_next = false;
        scheduler.flush(&mut writer, now).expect("retry succeeds");
        assert_eq!(writer.writes, vec![order_request(&["a"])]);
        assert_eq!(writer.catalog_saves, 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    #[should_panic(expected = "write key must not be empty")]
    fn empty_key_is_a_contract_violation() {
        let mut scheduler = WriteScheduler::default();
        scheduler.schedule("", order_request(&["a"]), Instant::now());
    }
}
