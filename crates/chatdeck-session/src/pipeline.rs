//! Inbound message batching, optimistic reconciliation, and bounded
//! history.
//!
//! Each chatroom owns its history and its batch buffer; there is no
//! shared queue across chatrooms, so one chatroom's flush can never
//! block or reorder another's ingestion.
//!
//! # Batching
//!
//! Inbound messages are queued, not applied. The flush deadline is
//! armed when the first message lands in an idle queue; later arrivals
//! join the same batch without pushing the deadline back (re-arming
//! per message would starve the flush under sustained chat volume).
//! On a tick past the deadline the whole batch is appended to history
//! in arrival order in one mutation, then the history is trimmed to
//! the cap from the oldest end.
//!
//! # Optimistic entries
//!
//! Locally-sent messages bypass the batch: they are appended directly
//! so the sender sees them instantly. Confirmation replaces the entry
//! in place, preserving its position; eviction is strictly
//! position-based and never skips optimistic or failed entries.

use std::{collections::HashMap, ops::Sub, time::Duration};

use chatdeck_core::ChatroomId;

use crate::message::{Message, MessageId, MessageState};

/// Queued inbound messages awaiting one atomic history update.
#[derive(Debug, Clone)]
struct Batch<I> {
    queued: Vec<Message>,
    armed_at: I,
}

/// Per-chatroom ingestion, reconciliation, and history state.
#[derive(Debug, Clone)]
pub struct MessagePipeline<I> {
    histories: HashMap<ChatroomId, Vec<Message>>,
    batches: HashMap<ChatroomId, Batch<I>>,
}

impl<I> MessagePipeline<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self { histories: HashMap::new(), batches: HashMap::new() }
    }

    /// Ensure a history exists for a chatroom (called on subscribe).
    pub fn ensure(&mut self, chatroom_id: ChatroomId) {
        self.histories.entry(chatroom_id).or_default();
    }

    /// History for a chatroom, oldest first. Empty for unknown ids.
    pub fn history(&self, chatroom_id: ChatroomId) -> &[Message] {
        self.histories.get(&chatroom_id).map_or(&[], Vec::as_slice)
    }

    /// Append a message immediately, bypassing the batch (optimistic
    /// sends, injected system notices), then trim to `cap`.
    pub fn insert_direct(&mut self, chatroom_id: ChatroomId, message: Message, cap: usize) {
        let history = self.histories.entry(chatroom_id).or_default();
        history.push(message);
        Self::evict(history, cap);
    }

    /// Queue an inbound message; arms the flush deadline if the queue
    /// was idle.
    pub fn enqueue(&mut self, chatroom_id: ChatroomId, message: Message, now: I) {
        self.batches
            .entry(chatroom_id)
            .or_insert_with(|| Batch { queued: Vec::new(), armed_at: now })
            .queued
            .push(message);
    }

    /// Apply every batch whose window has elapsed.
    ///
    /// Returns the applied messages per chatroom so the caller can run
    /// mention extraction over exactly what landed. Chatrooms flush
    /// independently; a due batch for one never touches another's
    /// queue.
    pub fn flush_due(
        &mut self,
        now: I,
        window: Duration,
        cap: usize,
    ) -> Vec<(ChatroomId, Vec<Message>)> {
        let due: Vec<ChatroomId> = self
            .batches
            .iter()
            .filter(|(_, batch)| now - batch.armed_at >= window)
            .map(|(id, _)| *id)
            .collect();

        let mut applied = Vec::new();
        for chatroom_id in due {
            if let Some(batch) = self.batches.remove(&chatroom_id) {
                let history = self.histories.entry(chatroom_id).or_default();
                history.extend(batch.queued.iter().cloned());
                Self::evict(history, cap);
                applied.push((chatroom_id, batch.queued));
            }
        }
        applied
    }

    /// Whether a chatroom has messages waiting in its batch queue.
    pub fn has_pending_batch(&self, chatroom_id: ChatroomId) -> bool {
        self.batches.contains_key(&chatroom_id)
    }

    /// Replace the entry matching `temp_id` with `confirmed`,
    /// preserving its position.
    ///
    /// Idempotent: returns `false` without effect when the temp id is
    /// no longer present (already confirmed via the echo path, or
    /// evicted).
    pub fn confirm(
        &mut self,
        chatroom_id: ChatroomId,
        temp_id: &str,
        confirmed: Message,
    ) -> bool {
        let Some(history) = self.histories.get_mut(&chatroom_id) else {
            return false;
        };
        match history.iter_mut().find(|m| m.temp_id() == Some(temp_id)) {
            Some(entry) => {
                *entry = confirmed;
                true
            },
            None => false,
        }
    }

    /// Confirm the oldest optimistic entry with matching content.
    ///
    /// The feed echo carries the server id but not our temp id, so the
    /// echo path reconciles by content. Returns `false` when no
    /// optimistic entry matches (the caller then treats the message as
    /// ordinary inbound traffic).
    pub fn confirm_oldest_optimistic(
        &mut self,
        chatroom_id: ChatroomId,
        content: &str,
        confirmed: Message,
    ) -> bool {
        let Some(history) = self.histories.get_mut(&chatroom_id) else {
            return false;
        };
        match history.iter_mut().find(|m| m.is_optimistic() && m.content == content) {
            Some(entry) => {
                *entry = confirmed;
                true
            },
            None => false,
        }
    }

    /// Transition the entry matching `temp_id` to `Failed`.
    ///
    /// Returns `false` when no such non-confirmed entry exists.
    pub fn mark_failed(&mut self, chatroom_id: ChatroomId, temp_id: &str) -> bool {
        let Some(history) = self.histories.get_mut(&chatroom_id) else {
            return false;
        };
        match history.iter_mut().find(|m| m.temp_id() == Some(temp_id)) {
            Some(entry) => {
                entry.state = MessageState::Failed;
                true
            },
            None => false,
        }
    }

    /// Remove a non-confirmed entry (user discarded it).
    ///
    /// No-op for unknown temp ids.
    pub fn remove_local(&mut self, chatroom_id: ChatroomId, temp_id: &str) -> bool {
        let Some(history) = self.histories.get_mut(&chatroom_id) else {
            return false;
        };
        let before = history.len();
        history.retain(|m| m.temp_id() != Some(temp_id));
        history.len() != before
    }

    /// The failed entry for `temp_id`, for building a resend.
    pub fn failed_entry(&self, chatroom_id: ChatroomId, temp_id: &str) -> Option<&Message> {
        self.histories
            .get(&chatroom_id)?
            .iter()
            .find(|m| m.is_failed() && m.temp_id() == Some(temp_id))
    }

    /// Bulk-seed history with backfill, bypassing the batch.
    ///
    /// Seeded entries are flagged historical; the cap applies
    /// immediately since backfill can exceed it.
    pub fn seed(&mut self, chatroom_id: ChatroomId, messages: Vec<Message>, cap: usize) {
        let history = self.histories.entry(chatroom_id).or_default();
        history.extend(messages.into_iter().map(|mut m| {
            m.is_old = true;
            m
        }));
        Self::evict(history, cap);
    }

    /// Mark a confirmed entry as moderation-deleted, in place.
    pub fn mark_deleted(&mut self, chatroom_id: ChatroomId, message_id: &str) -> bool {
        let Some(history) = self.histories.get_mut(&chatroom_id) else {
            return false;
        };
        match history
            .iter_mut()
            .find(|m| matches!(&m.id, MessageId::Server(id) if id == message_id) && !m.deleted)
        {
            Some(entry) => {
                entry.deleted = true;
                true
            },
            None => false,
        }
    }

    /// Drop all state for a chatroom: history and any pending batch
    /// (cancelling its flush deadline).
    pub fn purge(&mut self, chatroom_id: ChatroomId) {
        self.histories.remove(&chatroom_id);
        self.batches.remove(&chatroom_id);
    }

    /// Cancel every pending batch without applying it (teardown).
    pub fn cancel_batches(&mut self) {
        self.batches.clear();
    }

    /// Trim from the oldest end until within the cap, strictly
    /// position-based, regardless of entry state.
    fn evict(history: &mut Vec<Message>, cap: usize) {
        if history.len() > cap {
            let excess = history.len() - cap;
            history.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chatdeck_core::UserIdentity;

    use super::*;
    use crate::message::MessageKind;

    const WINDOW: Duration = Duration::from_millis(80);
    const CAP: usize = 200;

    fn inbound(n: usize) -> Message {
        Message::confirmed(
            format!("s{n}"),
            format!("msg {n}"),
            UserIdentity::new(5, "bob"),
            MessageKind::Chat,
            n as u64,
        )
    }

    fn optimistic(temp_id: &str, content: &str) -> Message {
        Message::optimistic(
            temp_id.into(),
            content,
            UserIdentity::new(1, "me"),
            MessageKind::Chat,
            0,
        )
    }

    #[test]
    fn flush_preserves_arrival_order() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        for n in 0..10 {
            pipeline.enqueue(1, inbound(n), t0);
        }
        assert!(pipeline.history(1).is_empty(), "messages must not apply before the flush");

        let applied = pipeline.flush_due(t0 + WINDOW, WINDOW, CAP);
        assert_eq!(applied.len(), 1);

        let contents: Vec<&str> =
            pipeline.history(1).iter().map(|m| m.content.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|n| format!("msg {n}")).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn batch_not_due_stays_queued() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        pipeline.enqueue(1, inbound(0), t0);
        let applied = pipeline.flush_due(t0 + Duration::from_millis(10), WINDOW, CAP);
        assert!(applied.is_empty());
        assert!(pipeline.has_pending_batch(1));
    }

    #[test]
    fn deadline_is_not_pushed_back_by_later_arrivals() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        pipeline.enqueue(1, inbound(0), t0);
        // A message arriving just before the deadline joins the batch
        // without delaying it.
        pipeline.enqueue(1, inbound(1), t0 + Duration::from_millis(70));

        let applied = pipeline.flush_due(t0 + WINDOW, WINDOW, CAP);
        assert_eq!(applied[0].1.len(), 2);
    }

    #[test]
    fn chatrooms_flush_independently() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        pipeline.enqueue(1, inbound(0), t0);
        pipeline.enqueue(2, inbound(1), t0 + Duration::from_millis(50));

        let applied = pipeline.flush_due(t0 + WINDOW, WINDOW, CAP);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].0, 1);
        assert!(pipeline.has_pending_batch(2));
    }

    #[test]
    fn eviction_is_oldest_first() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        for n in 0..1000 {
            pipeline.enqueue(1, inbound(n), t0);
        }
        pipeline.flush_due(t0 + WINDOW, WINDOW, 50);

        let history = pipeline.history(1);
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].content, "msg 950");
        assert_eq!(history[49].content, "msg 999");
    }

    #[test]
    fn eviction_does_not_skip_optimistic_entries() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        pipeline.insert_direct(1, optimistic("t1", "mine"), 10);
        for n in 0..20 {
            pipeline.enqueue(1, inbound(n), t0);
        }
        pipeline.flush_due(t0 + WINDOW, WINDOW, 10);

        // The optimistic entry was the oldest; position-based eviction
        // removes it first.
        assert!(pipeline.history(1).iter().all(|m| !m.is_optimistic()));
    }

    #[test]
    fn confirm_replaces_in_place() {
        let mut pipeline = MessagePipeline::<Instant>::new();

        pipeline.insert_direct(1, optimistic("t1", "hello"), CAP);
        pipeline.insert_direct(1, optimistic("t2", "world"), CAP);

        let confirmed = Message::confirmed(
            "s1".into(),
            "hello",
            UserIdentity::new(1, "me"),
            MessageKind::Chat,
            99,
        );
        assert!(pipeline.confirm(1, "t1", confirmed));

        let history = pipeline.history(1);
        assert_eq!(history[0].state, MessageState::Confirmed);
        assert_eq!(history[0].id, MessageId::Server("s1".into()));
        assert!(history[1].is_optimistic(), "other entries untouched");
    }

    #[test]
    fn confirm_is_idempotent() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        pipeline.insert_direct(1, optimistic("t1", "hello"), CAP);

        let confirmed = Message::confirmed(
            "s1".into(),
            "hello",
            UserIdentity::new(1, "me"),
            MessageKind::Chat,
            99,
        );
        assert!(pipeline.confirm(1, "t1", confirmed.clone()));
        assert!(!pipeline.confirm(1, "t1", confirmed));
        assert_eq!(pipeline.history(1).len(), 1);
    }

    #[test]
    fn confirm_oldest_optimistic_matches_by_content() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        pipeline.insert_direct(1, optimistic("t1", "same"), CAP);
        pipeline.insert_direct(1, optimistic("t2", "same"), CAP);

        let confirmed = Message::confirmed(
            "s1".into(),
            "same",
            UserIdentity::new(1, "me"),
            MessageKind::Chat,
            99,
        );
        assert!(pipeline.confirm_oldest_optimistic(1, "same", confirmed));

        let history = pipeline.history(1);
        assert_eq!(history[0].state, MessageState::Confirmed);
        assert!(history[1].is_optimistic(), "only the oldest match confirms");
    }

    #[test]
    fn mark_failed_then_remove() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        pipeline.insert_direct(1, optimistic("t1", "hello"), CAP);

        assert!(pipeline.mark_failed(1, "t1"));
        assert!(pipeline.failed_entry(1, "t1").is_some());

        assert!(pipeline.remove_local(1, "t1"));
        assert!(pipeline.history(1).is_empty());
        assert!(!pipeline.remove_local(1, "t1"), "second remove is a no-op");
    }

    #[test]
    fn seed_flags_historical_and_respects_cap() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        pipeline.seed(1, (0..60).map(inbound).collect(), 50);

        let history = pipeline.history(1);
        assert_eq!(history.len(), 50);
        assert!(history.iter().all(|m| m.is_old));
        assert_eq!(history[0].content, "msg 10");
    }

    #[test]
    fn mark_deleted_tombstones_in_place() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        pipeline.insert_direct(1, inbound(0), CAP);
        pipeline.insert_direct(1, inbound(1), CAP);

        assert!(pipeline.mark_deleted(1, "s0"));
        assert!(!pipeline.mark_deleted(1, "s0"), "already tombstoned");

        let history = pipeline.history(1);
        assert_eq!(history.len(), 2, "tombstoning keeps the entry");
        assert!(history[0].deleted);
    }

    #[test]
    fn purge_cancels_pending_batch() {
        let mut pipeline = MessagePipeline::<Instant>::new();
        let t0 = Instant::now();

        pipeline.enqueue(1, inbound(0), t0);
        pipeline.purge(1);

        let applied = pipeline.flush_due(t0 + WINDOW, WINDOW, CAP);
        assert!(applied.is_empty());
        assert!(pipeline.history(1).is_empty());
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Any partitioning of a message stream into batches yields
            /// the same final history: the most recent `CAP` messages
            /// in arrival order.
            #[test]
            fn batch_boundaries_never_reorder(
                batch_sizes in prop::collection::vec(1usize..30, 1..10)
            ) {
                let mut pipeline = MessagePipeline::<Instant>::new();
                let mut now = Instant::now();
                let mut seq = 0usize;

                for size in batch_sizes {
                    for _ in 0..size {
                        pipeline.enqueue(1, inbound(seq), now);
                        seq += 1;
                    }
                    now += WINDOW;
                    pipeline.flush_due(now, WINDOW, CAP);
                }

                let contents: Vec<String> =
                    pipeline.history(1).iter().map(|m| m.content.clone()).collect();
                let expected: Vec<String> =
                    (seq.saturating_sub(CAP)..seq).map(|n| format!("msg {n}")).collect();
                prop_assert_eq!(contents, expected);
            }
        }
    }
}
