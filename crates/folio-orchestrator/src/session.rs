use crate::types::WorkflowOptions;
use folio_core::{ChapterStatus, FolioError, FolioResult, RunControl, WorkflowState};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// State of one workflow run, shared between the orchestrator's control
/// surface and the task driving the run.
#[derive(Debug)]
pub struct WorkflowSession {
    work_unit_id: Uuid,
    control: RunControl,
    state: RwLock<WorkflowState>,
    current_chapter: RwLock<Option<Uuid>>,
    active: AtomicBool,
}

impl WorkflowSession {
    /// A fresh, active session with no chapter started yet.
    pub fn new(work_unit_id: Uuid, options: &WorkflowOptions) -> Self {
        Self {
            work_unit_id,
            control: RunControl::new(),
            state: RwLock::new(WorkflowState {
                work_unit_id,
                current_chapter: 0,
                total_chapters: options.chapter_count,
                current_stage: ChapterStatus::Scraped,
                human_in_loop: options.human_in_loop,
                voice_enabled: options.voice_enabled,
                learning_enabled: options.learning_enabled,
                paused: false,
            }),
            current_chapter: RwLock::new(None),
            active: AtomicBool::new(true),
        }
    }

    /// Id of the book this run produces.
    pub fn work_unit_id(&self) -> Uuid {
        self.work_unit_id
    }

    /// Pause, resume and skip flags for the run.
    pub fn control(&self) -> &RunControl {
        &self.control
    }

    /// Snapshot; never blocks on the running task.
    pub fn state(&self) -> WorkflowState {
        self.state.read().clone()
    }

    /// False once the run has ended, whatever the outcome.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Chapter currently in progress, if any.
    pub fn current_chapter(&self) -> Option<Uuid> {
        *self.current_chapter.read()
    }

    pub(crate) fn set_total_chapters(&self, total: usize) {
        self.state.write().total_chapters = total;
    }

    pub(crate) fn begin_chapter(&self, index: usize, chapter_id: Uuid) {
        *self.current_chapter.write() = Some(chapter_id);
        let mut state = self.state.write();
        state.current_chapter = index;
        state.current_stage = ChapterStatus::Scraped;
    }

    pub(crate) fn end_chapter(&self) {
        *self.current_chapter.write() = None;
        // A skip that arrived after the chapter's last safe point must not
        // leak into the next chapter.
        self.control.take_skip();
    }

    pub(crate) fn set_stage(&self, stage: ChapterStatus) {
        self.state.write().current_stage = stage;
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.state.write().paused = paused;
    }

    pub(crate) fn finish(&self) {
        *self.current_chapter.write() = None;
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Returned by `start_workflow`: the new work unit id and the background task.
#[derive(Debug)]
pub struct WorkflowHandle {
    work_unit_id: Uuid,
    task: JoinHandle<FolioResult<()>>,
}

impl WorkflowHandle {
    pub(crate) fn new(work_unit_id: Uuid, task: JoinHandle<FolioResult<()>>) -> Self {
        Self { work_unit_id, task }
    }

    /// Id of the book the run produces.
    pub fn work_unit_id(&self) -> Uuid {
        self.work_unit_id
    }

    /// Whether the background task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end and return its outcome.
    pub async fn wait(self) -> FolioResult<()> {
        self.task
            .await
            .map_err(|e| FolioError::Interrupted(format!("workflow task ended abnormally: {e}")))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_state_tracks_progress() {
        let id = Uuid::new_v4();
        let options = WorkflowOptions {
            chapter_count: 3,
            human_in_loop: true,
            ..Default::default()
        };
        let session = WorkflowSession::new(id, &options);
        assert!(session.is_active());
        assert_eq!(session.state().total_chapters, 3);

        let chapter_id = Uuid::new_v4();
        session.begin_chapter(1, chapter_id);
        session.set_stage(ChapterStatus::HumanReview);
        let state = session.state();
        assert_eq!(state.current_chapter, 1);
        assert_eq!(state.current_stage, ChapterStatus::HumanReview);
        assert!(state.human_in_loop);
        assert_eq!(session.current_chapter(), Some(chapter_id));

        session.finish();
        assert!(!session.is_active());
        assert!(session.current_chapter().is_none());
        assert_eq!(session.state().work_unit_id, id);
    }

    #[test]
    fn test_end_chapter_clears_stale_skip() {
        let session = WorkflowSession::new(Uuid::new_v4(), &WorkflowOptions::default());
        session.begin_chapter(0, Uuid::new_v4());
        session.control().request_skip();
        session.end_chapter();
        assert!(!session.control().state().skip_requested);
    }
}
