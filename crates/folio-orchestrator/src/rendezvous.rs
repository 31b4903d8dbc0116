use folio_core::{FolioError, FolioResult, HumanFeedback, Interrupt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// Per-chapter mailbox where human feedback meets a waiting workflow.
///
/// Submissions are accepted at any time, for any chapter. A waiter is woken
/// by notification, never by polling, and drains the mailbox atomically.
pub struct FeedbackRendezvous {
    mailboxes: Mutex<HashMap<Uuid, Vec<HumanFeedback>>>,
    arrivals: Notify,
}

impl FeedbackRendezvous {
    pub fn new() -> Self {
        Self {
            mailboxes: Mutex::new(HashMap::new()),
            arrivals: Notify::new(),
        }
    }

    pub fn submit(&self, feedback: HumanFeedback) {
        let chapter_id = feedback.chapter_id;
        self.mailboxes
            .lock()
            .entry(chapter_id)
            .or_default()
            .push(feedback);
        debug!(chapter_id = %chapter_id, "Feedback queued");
        self.arrivals.notify_waiters();
    }

    /// Take everything queued for a chapter without waiting.
    pub fn drain(&self, chapter_id: Uuid) -> Vec<HumanFeedback> {
        self.mailboxes
            .lock()
            .remove(&chapter_id)
            .unwrap_or_default()
    }

    /// Drop whatever is queued for the given chapters. Returns how many
    /// entries were dropped.
    pub fn discard(&self, chapter_ids: &[Uuid]) -> usize {
        let mut mailboxes = self.mailboxes.lock();
        chapter_ids
            .iter()
            .filter_map(|id| mailboxes.remove(id))
            .map(|entries| entries.len())
            .sum()
    }

    /// Drop every queued entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut mailboxes = self.mailboxes.lock();
        let dropped = mailboxes.values().map(Vec::len).sum();
        mailboxes.clear();
        dropped
    }

    /// Wait until at least one entry is queued for `chapter_id` or `timeout`
    /// elapses, then drain. An empty result means the wait timed out.
    ///
    /// Returns `FolioError::Interrupted` as soon as `interrupt` fires; queued
    /// entries stay in the mailbox in that case.
    pub async fn await_feedback(
        &self,
        chapter_id: Uuid,
        timeout: Duration,
        interrupt: &Interrupt,
    ) -> FolioResult<Vec<HumanFeedback>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register before checking so a submit between the check and the
            // await is not lost.
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = self.drain(chapter_id);
            if !ready.is_empty() {
                return Ok(ready);
            }

            let woke = interrupt
                .guard("feedback wait", async {
                    Ok::<_, FolioError>(tokio::time::timeout_at(deadline, notified).await.is_ok())
                })
                .await?;
            if !woke {
                debug!(chapter_id = %chapter_id, timeout_ms = timeout.as_millis() as u64, "Feedback wait timed out");
                return Ok(Vec::new());
            }
        }
    }

    /// Number of chapters with queued, unconsumed feedback.
    pub fn pending_count(&self) -> usize {
        self.mailboxes
            .lock()
            .values()
            .filter(|entries| !entries.is_empty())
            .count()
    }
}

impl Default for FeedbackRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use folio_core::{AgentRole, RunControl};
    use std::sync::Arc;

    fn feedback(chapter_id: Uuid, rating: f64) -> HumanFeedback {
        HumanFeedback::new(chapter_id, "tester", AgentRole::Editor, "tighten the ending", rating)
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_after_timeout() {
        let rendezvous = FeedbackRendezvous::new();
        let started = tokio::time::Instant::now();
        let got = rendezvous
            .await_feedback(Uuid::new_v4(), Duration::from_secs(2), &Interrupt::never())
            .await
            .unwrap();
        assert!(got.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_wakes_waiter_promptly() {
        let rendezvous = Arc::new(FeedbackRendezvous::new());
        let chapter_id = Uuid::new_v4();

        let waiter = {
            let rendezvous = rendezvous.clone();
            tokio::spawn(async move {
                let started = tokio::time::Instant::now();
                let got = rendezvous
                    .await_feedback(chapter_id, Duration::from_secs(30), &Interrupt::never())
                    .await
                    .unwrap();
                (got, started.elapsed())
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        rendezvous.submit(feedback(Uuid::new_v4(), 9.0));
        rendezvous.submit(feedback(chapter_id, 4.0));

        let (got, elapsed) = waiter.await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].rating, 4.0);
        assert!(elapsed < Duration::from_secs(1));
        assert_eq!(rendezvous.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_already_queued_returns_immediately() {
        let rendezvous = FeedbackRendezvous::new();
        let chapter_id = Uuid::new_v4();
        rendezvous.submit(feedback(chapter_id, 8.0));
        rendezvous.submit(feedback(chapter_id, 6.0));

        let got = rendezvous
            .await_feedback(chapter_id, Duration::from_secs(30), &Interrupt::never())
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert!(rendezvous.drain(chapter_id).is_empty());
        assert_eq!(rendezvous.pending_count(), 0);
    }

    #[test]
    fn test_discard_and_clear() {
        let rendezvous = FeedbackRendezvous::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        rendezvous.submit(feedback(a, 3.0));
        rendezvous.submit(feedback(a, 5.0));
        rendezvous.submit(feedback(b, 7.0));
        rendezvous.submit(feedback(c, 9.0));

        assert_eq!(rendezvous.discard(&[a, Uuid::new_v4()]), 2);
        assert_eq!(rendezvous.pending_count(), 2);
        assert_eq!(rendezvous.discard(&[a]), 0);

        assert_eq!(rendezvous.clear(), 2);
        assert_eq!(rendezvous.pending_count(), 0);
        assert!(rendezvous.drain(b).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_ends_wait() {
        let rendezvous = Arc::new(FeedbackRendezvous::new());
        let control = RunControl::new();
        let interrupt = control.interrupt();
        let chapter_id = Uuid::new_v4();

        let waiter = {
            let rendezvous = rendezvous.clone();
            tokio::spawn(async move {
                rendezvous
                    .await_feedback(chapter_id, Duration::from_secs(30), &interrupt)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        control.pause();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_interrupted());
    }
}
