use crate::config::WorkflowConfig;
use crate::monitor::AgentMonitor;
use crate::pipeline::{AgentPipeline, PassContext};
use crate::rendezvous::FeedbackRendezvous;
use crate::session::{WorkflowHandle, WorkflowSession};
use crate::types::{
    BookStats, ExportedBook, PerformanceMetrics, SearchResults, WorkflowEvent, WorkflowOptions,
};
use chrono::Utc;
use folio_core::{
    AcquisitionService, AgentRole, Chapter, ChapterStatus, CommandAction, FolioError,
    FolioResult, HumanFeedback, VoiceCommand, WorkUnit, WorkflowState,
};
use folio_learning::RewardEngine;
use folio_memory::{ContentStore, Metadata};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Marker in a source reference that is rewritten to address later chapters.
pub const CHAPTER_MARKER: &str = "Chapter_1";

/// Source references for `count` chapters starting at `source_ref`.
///
/// Chapter `i` replaces the first [`CHAPTER_MARKER`] with `Chapter_i`. Without
/// a marker only the given reference is returned.
pub fn chapter_refs(source_ref: &str, count: usize) -> Vec<String> {
    if count <= 1 {
        return vec![source_ref.to_string()];
    }
    if !source_ref.contains(CHAPTER_MARKER) {
        warn!(
            source_ref,
            requested = count,
            "No {CHAPTER_MARKER} marker in source reference, acquiring a single chapter"
        );
        return vec![source_ref.to_string()];
    }
    (1..=count)
        .map(|i| source_ref.replacen(CHAPTER_MARKER, &format!("Chapter_{i}"), 1))
        .collect()
}

enum ChapterOutcome {
    Approved,
    Skipped,
}

struct Inner {
    config: WorkflowConfig,
    pipeline: AgentPipeline,
    engine: Arc<RewardEngine>,
    acquisition: Arc<dyn AcquisitionService>,
    store: Arc<dyn ContentStore>,
    rendezvous: FeedbackRendezvous,
    monitor: AgentMonitor,
    events: broadcast::Sender<WorkflowEvent>,
    session: Mutex<Option<Arc<WorkflowSession>>>,
    books: RwLock<HashMap<Uuid, WorkUnit>>,
}

/// Top-level workflow state machine.
///
/// Runs one workflow at a time: acquisition, then per chapter the agent
/// pipeline, optional human review, and persistence. Control operations
/// (pause, resume, skip, feedback, commands) may be called from any task
/// while a run is in progress. Lifecycle events are published on a
/// broadcast channel, see [`WorkflowOrchestrator::subscribe`].
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    inner: Arc<Inner>,
}

impl WorkflowOrchestrator {
    /// An idle orchestrator over the given pipeline and collaborators.
    pub fn new(
        config: WorkflowConfig,
        pipeline: AgentPipeline,
        engine: Arc<RewardEngine>,
        acquisition: Arc<dyn AcquisitionService>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                pipeline,
                engine,
                acquisition,
                store,
                rendezvous: FeedbackRendezvous::new(),
                monitor: AgentMonitor::new(),
                events,
                session: Mutex::new(None),
                books: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Receive lifecycle events from now on. Slow receivers lag rather than
    /// block the workflow.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.inner.events.subscribe()
    }

    /// Settings the orchestrator was built with.
    pub fn config(&self) -> &WorkflowConfig {
        &self.inner.config
    }

    /// The shared learning engine.
    pub fn engine(&self) -> &Arc<RewardEngine> {
        &self.inner.engine
    }

    /// The agent chain.
    pub fn pipeline(&self) -> &AgentPipeline {
        &self.inner.pipeline
    }

    /// Where submitted feedback waits for its chapter.
    pub fn rendezvous(&self) -> &FeedbackRendezvous {
        &self.inner.rendezvous
    }

    /// Agent activity and chapter counters.
    pub fn monitor(&self) -> &AgentMonitor {
        &self.inner.monitor
    }

    /// Validate, install a session, and run the workflow in the background.
    ///
    /// Returns as soon as the run is scheduled. Fails with
    /// `FolioError::Conflict` while another run is active.
    pub fn start_workflow(
        &self,
        source_ref: &str,
        options: WorkflowOptions,
    ) -> FolioResult<WorkflowHandle> {
        let source_ref = source_ref.trim();
        if source_ref.is_empty() {
            return Err(FolioError::Validation("source reference is empty".to_string()));
        }
        options.validate()?;

        let work_unit_id = Uuid::new_v4();
        let session = Arc::new(WorkflowSession::new(work_unit_id, &options));
        {
            let mut slot = self.inner.session.lock();
            if let Some(current) = slot.as_ref().filter(|s| s.is_active()) {
                return Err(FolioError::Conflict(format!(
                    "workflow {} is already running",
                    current.work_unit_id()
                )));
            }
            *slot = Some(session.clone());
        }

        // Chapter ids are minted during acquisition, so anything still queued
        // belongs to an earlier run.
        let stale = self.inner.rendezvous.clear();
        if stale > 0 {
            debug!(dropped = stale, "Discarded feedback left over from earlier runs");
        }
        self.inner
            .books
            .write()
            .insert(work_unit_id, WorkUnit::new(work_unit_id, source_ref, Vec::new()));

        info!(
            work_unit_id = %work_unit_id,
            source_ref,
            chapters = options.chapter_count,
            human_in_loop = options.human_in_loop,
            learning = options.learning_enabled,
            "Workflow started"
        );
        self.inner.emit(WorkflowEvent::WorkflowStarted {
            work_unit_id,
            source_ref: source_ref.to_string(),
            chapter_count: options.chapter_count,
        });

        let inner = self.inner.clone();
        let source_ref = source_ref.to_string();
        let task = tokio::spawn(async move { inner.run(session, source_ref, options).await });
        Ok(WorkflowHandle::new(work_unit_id, task))
    }

    /// State of the active run, or of the last run once it has ended.
    pub fn workflow_status(&self) -> Option<WorkflowState> {
        self.inner.session.lock().as_ref().map(|s| s.state())
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .as_ref()
            .is_some_and(|s| s.is_active())
    }

    /// Pause at the next safe point. An in-flight generation call or review
    /// wait is interrupted and its pass re-run after resume.
    pub fn pause_workflow(&self) -> FolioResult<()> {
        let session = self.inner.active_session()?;
        if session.control().pause() {
            session.set_paused(true);
            info!(work_unit_id = %session.work_unit_id(), "Workflow paused");
            self.inner.emit(WorkflowEvent::WorkflowPaused {
                work_unit_id: session.work_unit_id(),
            });
        }
        Ok(())
    }

    /// Release a pause. A no-op when not paused.
    pub fn resume_workflow(&self) -> FolioResult<()> {
        let session = self.inner.active_session()?;
        if session.control().resume() {
            session.set_paused(false);
            info!(work_unit_id = %session.work_unit_id(), "Workflow resumed");
            self.inner.emit(WorkflowEvent::WorkflowResumed {
                work_unit_id: session.work_unit_id(),
            });
        }
        Ok(())
    }

    /// Abandon the chapter in progress. Returns its id.
    pub fn skip_chapter(&self) -> FolioResult<Uuid> {
        let session = self.inner.active_session()?;
        let chapter_id = session
            .current_chapter()
            .ok_or_else(|| FolioError::Validation("no chapter in progress".to_string()))?;
        session.control().request_skip();
        info!(work_unit_id = %session.work_unit_id(), chapter_id = %chapter_id, "Chapter skip requested");
        Ok(chapter_id)
    }

    /// Queue feedback for its target chapter. Accepted at any time; entries
    /// for a chapter are dropped once that chapter is done, and whatever is
    /// left over is dropped when the next run starts.
    pub fn submit_feedback(&self, feedback: HumanFeedback) -> FolioResult<()> {
        feedback.validate()?;
        let chapter_id = feedback.chapter_id;
        let rating = feedback.rating;
        debug!(chapter_id = %chapter_id, rating, submitter = %feedback.submitter_id, "Feedback submitted");
        self.inner.rendezvous.submit(feedback);
        self.inner
            .emit(WorkflowEvent::FeedbackReceived { chapter_id, rating });
        Ok(())
    }

    /// Apply a spoken or typed command to the active run.
    ///
    /// Feedback-like actions target the chapter in progress: approve rates
    /// 10, reject 0, rate uses its number, and plain feedback its rating
    /// parameter or 5.
    pub fn handle_command(&self, command: &VoiceCommand) -> FolioResult<()> {
        let session = self.inner.active_session()?;
        if !session.state().voice_enabled {
            return Err(FolioError::Validation(
                "voice commands are disabled for this workflow".to_string(),
            ));
        }
        info!(
            action = %command.action,
            user = %command.user_id,
            transcript = %command.transcript,
            "Command received"
        );

        let rating = match command.action {
            CommandAction::Pause => return self.pause_workflow(),
            CommandAction::Resume => return self.resume_workflow(),
            CommandAction::Skip => return self.skip_chapter().map(|_| ()),
            CommandAction::Approve => 10.0,
            CommandAction::Reject => 0.0,
            CommandAction::Rate => command
                .rating()
                .ok_or_else(|| FolioError::Validation("rate command carries no rating".to_string()))?,
            CommandAction::ProvideFeedback => command.rating().unwrap_or(5.0),
        };

        let chapter_id = session
            .current_chapter()
            .ok_or_else(|| FolioError::Validation("no chapter in progress".to_string()))?;
        let comment = command
            .parameters
            .get("comment")
            .and_then(|v| v.as_str())
            .map_or_else(|| command.transcript.clone(), str::to_string);
        let feedback = HumanFeedback::new(
            chapter_id,
            command.user_id.clone(),
            AgentRole::Editor,
            comment,
            rating,
        )
        .with_suggestions(command.suggestions());
        self.submit_feedback(feedback)
    }

    /// Move a finished book's approved chapters to published and re-store them.
    /// Returns how many chapters were published.
    pub async fn publish(&self, work_unit_id: Uuid) -> FolioResult<usize> {
        if let Ok(session) = self.inner.active_session() {
            if session.work_unit_id() == work_unit_id {
                return Err(FolioError::Conflict(format!(
                    "workflow {work_unit_id} is still running"
                )));
            }
        }

        let mut book = self.inner.book(work_unit_id)?;
        let mut published = 0;
        for chapter in book
            .chapters
            .iter_mut()
            .filter(|c| c.status == ChapterStatus::Approved)
        {
            chapter.advance(ChapterStatus::Published)?;
            self.inner.store.store_chapter(chapter, work_unit_id).await?;
            published += 1;
        }
        book.updated_at = Utc::now();
        self.inner.store.store_book(&book).await?;
        self.inner.books.write().insert(work_unit_id, book);

        info!(work_unit_id = %work_unit_id, published, "Book published");
        Ok(published)
    }

    /// Similarity search over stored chapters.
    pub async fn search_content(
        &self,
        query: &str,
        filters: &Metadata,
        limit: usize,
    ) -> FolioResult<SearchResults> {
        let hits = self.inner.store.query(query, filters, limit).await?;
        Ok(SearchResults::from_hits(hits))
    }

    /// Stored chapters closest to the given one.
    pub async fn similar_chapters(&self, chapter_id: Uuid, limit: usize) -> FolioResult<SearchResults> {
        let hits = self
            .inner
            .store
            .find_similar_chapters(chapter_id, limit)
            .await?;
        Ok(SearchResults::from_hits(hits))
    }

    /// A book processed by this orchestrator, as far as it got.
    pub fn export_book(&self, work_unit_id: Uuid) -> FolioResult<ExportedBook> {
        let book = self.inner.book(work_unit_id)?;
        Ok(ExportedBook {
            stats: BookStats::of(&book),
            book,
        })
    }

    /// Reward, content and processing statistics, including the queued
    /// feedback and the state of the current or last run.
    pub async fn performance_metrics(&self) -> FolioResult<PerformanceMetrics> {
        let mut processing_stats = self.inner.monitor.snapshot().await;
        processing_stats.pending_feedback = self.inner.rendezvous.pending_count();
        processing_stats.current_workflow = self.workflow_status();
        Ok(PerformanceMetrics {
            reward_stats: self.inner.engine.reward_stats(),
            content_stats: self.inner.store.stats().await?,
            processing_stats,
        })
    }
}

impl Inner {
    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn active_session(&self) -> FolioResult<Arc<WorkflowSession>> {
        self.session
            .lock()
            .as_ref()
            .filter(|s| s.is_active())
            .cloned()
            .ok_or_else(|| FolioError::Validation("no workflow is running".to_string()))
    }

    fn book(&self, work_unit_id: Uuid) -> FolioResult<WorkUnit> {
        self.books
            .read()
            .get(&work_unit_id)
            .cloned()
            .ok_or_else(|| FolioError::NotFound(format!("work unit {work_unit_id}")))
    }

    fn chapter(&self, work_unit_id: Uuid, chapter_id: Uuid) -> FolioResult<Chapter> {
        self.books
            .read()
            .get(&work_unit_id)
            .and_then(|b| b.chapter(chapter_id))
            .cloned()
            .ok_or_else(|| FolioError::NotFound(format!("chapter {chapter_id}")))
    }

    /// Feedback for chapters that will never be waited on again.
    fn discard_feedback(&self, work_unit_id: Uuid, chapter_ids: &[Uuid]) {
        let dropped = self.rendezvous.discard(chapter_ids);
        if dropped > 0 {
            debug!(work_unit_id = %work_unit_id, dropped, "Discarded unconsumed feedback");
        }
    }

    fn put_chapter(&self, work_unit_id: Uuid, chapter: &Chapter) {
        let mut books = self.books.write();
        if let Some(book) = books.get_mut(&work_unit_id) {
            if let Some(slot) = book.chapter_mut(chapter.id) {
                *slot = chapter.clone();
                book.updated_at = Utc::now();
            }
        }
    }

    async fn run(
        self: Arc<Self>,
        session: Arc<WorkflowSession>,
        source_ref: String,
        options: WorkflowOptions,
    ) -> FolioResult<()> {
        let work_unit_id = session.work_unit_id();
        let result = self.execute(&session, &source_ref, &options).await;
        session.finish();
        let chapter_ids: Vec<Uuid> = self
            .books
            .read()
            .get(&work_unit_id)
            .map(|book| book.chapters.iter().map(|c| c.id).collect())
            .unwrap_or_default();
        self.discard_feedback(work_unit_id, &chapter_ids);

        match result {
            Ok((chapters_approved, chapters_skipped)) => {
                info!(
                    work_unit_id = %work_unit_id,
                    chapters_approved,
                    chapters_skipped,
                    "Workflow completed"
                );
                self.emit(WorkflowEvent::WorkflowCompleted {
                    work_unit_id,
                    chapters_approved,
                    chapters_skipped,
                });
                Ok(())
            }
            Err(e) => {
                error!(work_unit_id = %work_unit_id, error = %e, "Workflow failed");
                self.emit(WorkflowEvent::WorkflowError {
                    work_unit_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Acquire, process every chapter, then store the book record.
    /// Returns (approved, skipped) chapter counts.
    async fn execute(
        &self,
        session: &WorkflowSession,
        source_ref: &str,
        options: &WorkflowOptions,
    ) -> FolioResult<(usize, usize)> {
        let work_unit_id = session.work_unit_id();
        let chapters = self
            .acquire(session, source_ref, options.chapter_count)
            .await?;
        let chapter_ids: Vec<Uuid> = chapters.iter().map(|c| c.id).collect();
        session.set_total_chapters(chapter_ids.len());
        {
            let mut books = self.books.write();
            let mut book = WorkUnit::new(work_unit_id, source_ref, chapters);
            if let Some(registered) = books.get(&work_unit_id) {
                book.created_at = registered.created_at;
            }
            books.insert(work_unit_id, book);
        }

        let mut approved = 0;
        let mut skipped = 0;
        for (index, chapter_id) in chapter_ids.into_iter().enumerate() {
            session.control().wait_until_resumed().await;
            session.begin_chapter(index, chapter_id);
            let outcome = self.process_chapter(session, options, chapter_id).await;
            session.end_chapter();
            self.discard_feedback(work_unit_id, &[chapter_id]);

            match outcome {
                Ok(ChapterOutcome::Approved) => {
                    approved += 1;
                    self.monitor.chapter_completed().await;
                }
                Ok(ChapterOutcome::Skipped) => {
                    skipped += 1;
                    self.monitor.chapter_skipped().await;
                }
                Err(e) => {
                    self.monitor.chapter_failed().await;
                    return Err(e);
                }
            }

            if options.learning_enabled {
                self.retune();
            }
        }

        let book = self.book(work_unit_id)?;
        self.store.store_book(&book).await?;
        Ok((approved, skipped))
    }

    async fn acquire(
        &self,
        session: &WorkflowSession,
        source_ref: &str,
        count: usize,
    ) -> FolioResult<Vec<Chapter>> {
        let work_unit_id = session.work_unit_id();
        let delay = self.config.fetch_delay();
        let mut chapters = Vec::new();
        let mut last_error = None;

        for (i, chapter_ref) in chapter_refs(source_ref, count).iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            session.control().wait_until_resumed().await;

            match self.acquisition.fetch(chapter_ref).await {
                Ok(doc) => {
                    let chapter = Chapter::new(doc.title, doc.content);
                    info!(
                        work_unit_id = %work_unit_id,
                        chapter_id = %chapter.id,
                        source_ref = %chapter_ref,
                        words = chapter.word_count(),
                        "Chapter acquired"
                    );
                    self.emit(WorkflowEvent::ChapterAcquired {
                        work_unit_id,
                        chapter_id: chapter.id,
                        index: chapters.len(),
                        title: chapter.title.clone(),
                    });
                    chapters.push(chapter);
                }
                Err(e) => {
                    warn!(source_ref = %chapter_ref, error = %e, "Chapter fetch failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        if chapters.is_empty() {
            let cause = last_error.map(|e| format!(": {e}")).unwrap_or_default();
            return Err(FolioError::Acquisition(format!(
                "no chapters acquired from {source_ref}{cause}"
            )));
        }
        Ok(chapters)
    }

    async fn process_chapter(
        &self,
        session: &WorkflowSession,
        options: &WorkflowOptions,
        chapter_id: Uuid,
    ) -> FolioResult<ChapterOutcome> {
        let work_unit_id = session.work_unit_id();
        let mut chapter = self.chapter(work_unit_id, chapter_id)?;

        self.advance(session, &mut chapter, ChapterStatus::Transforming)?;
        let seed = if options.human_in_loop {
            self.rendezvous.drain(chapter_id)
        } else {
            Vec::new()
        };
        if !seed.is_empty() {
            debug!(chapter_id = %chapter_id, count = seed.len(), "Seeding pass with queued feedback");
            chapter.human_feedback.extend(seed.iter().cloned());
        }

        if !self.run_pass(session, options, &mut chapter, &seed).await? {
            return Ok(self.skipped(session, &chapter));
        }
        self.advance(session, &mut chapter, ChapterStatus::AiReviewed)?;

        if options.human_in_loop {
            self.advance(session, &mut chapter, ChapterStatus::HumanReview)?;
            let Some(review) = self.wait_for_review(session, chapter_id).await? else {
                return Ok(self.skipped(session, &chapter));
            };
            chapter.human_feedback.extend(review.iter().cloned());
            self.put_chapter(work_unit_id, &chapter);

            let threshold = self.config.rerun_rating_threshold;
            if review.iter().any(|f| f.rating < threshold) {
                info!(chapter_id = %chapter_id, threshold, "Low review rating, running one more pass");
                self.advance(session, &mut chapter, ChapterStatus::Transforming)?;
                if !self.run_pass(session, options, &mut chapter, &review).await? {
                    return Ok(self.skipped(session, &chapter));
                }
                self.advance(session, &mut chapter, ChapterStatus::AiReviewed)?;
            }
        }

        self.advance(session, &mut chapter, ChapterStatus::Approved)?;
        self.store.store_chapter(&chapter, work_unit_id).await?;
        info!(
            work_unit_id = %work_unit_id,
            chapter_id = %chapter_id,
            version = chapter.version,
            reward_score = chapter.reward_score,
            "Chapter approved"
        );
        self.emit(WorkflowEvent::ChapterCompleted {
            work_unit_id,
            chapter_id,
            version: chapter.version,
            reward_score: chapter.reward_score,
        });
        Ok(ChapterOutcome::Approved)
    }

    fn advance(
        &self,
        session: &WorkflowSession,
        chapter: &mut Chapter,
        stage: ChapterStatus,
    ) -> FolioResult<()> {
        chapter.advance(stage)?;
        session.set_stage(stage);
        self.put_chapter(session.work_unit_id(), chapter);
        debug!(chapter_id = %chapter.id, stage = %stage, "Stage changed");
        self.emit(WorkflowEvent::StageChanged {
            work_unit_id: session.work_unit_id(),
            chapter_id: chapter.id,
            stage,
        });
        Ok(())
    }

    fn skipped(&self, session: &WorkflowSession, chapter: &Chapter) -> ChapterOutcome {
        self.put_chapter(session.work_unit_id(), chapter);
        info!(chapter_id = %chapter.id, status = %chapter.status, "Chapter skipped");
        self.emit(WorkflowEvent::ChapterSkipped {
            work_unit_id: session.work_unit_id(),
            chapter_id: chapter.id,
        });
        ChapterOutcome::Skipped
    }

    /// One pipeline pass under pause/skip control. `Ok(false)` means the
    /// chapter was skipped; an interrupted pass is discarded and re-run.
    async fn run_pass(
        &self,
        session: &WorkflowSession,
        options: &WorkflowOptions,
        chapter: &mut Chapter,
        feedback: &[HumanFeedback],
    ) -> FolioResult<bool> {
        loop {
            if session.control().take_skip() {
                return Ok(false);
            }
            if session.control().state().paused {
                session.control().wait_until_resumed().await;
                continue;
            }

            let interrupt = session.control().interrupt();
            let ctx = PassContext {
                engine: &self.engine,
                interrupt: &interrupt,
                monitor: &self.monitor,
                learning_enabled: options.learning_enabled,
            };
            match self.pipeline.transform(chapter, feedback, &ctx).await {
                Ok(()) => {
                    self.put_chapter(session.work_unit_id(), chapter);
                    return Ok(true);
                }
                Err(e) if e.is_interrupted() => {
                    info!(chapter_id = %chapter.id, reason = %e, "Pass interrupted and discarded");
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The bounded human-review wait under pause/skip control. `None` means
    /// the chapter was skipped; an empty vec means nobody answered in time.
    async fn wait_for_review(
        &self,
        session: &WorkflowSession,
        chapter_id: Uuid,
    ) -> FolioResult<Option<Vec<HumanFeedback>>> {
        let timeout = self.config.feedback_timeout();
        loop {
            if session.control().take_skip() {
                return Ok(None);
            }
            if session.control().state().paused {
                session.control().wait_until_resumed().await;
                continue;
            }

            let interrupt = session.control().interrupt();
            match self
                .rendezvous
                .await_feedback(chapter_id, timeout, &interrupt)
                .await
            {
                Ok(review) => {
                    if review.is_empty() {
                        info!(chapter_id = %chapter_id, timeout_secs = timeout.as_secs(), "No review feedback before timeout");
                    }
                    return Ok(Some(review));
                }
                Err(e) if e.is_interrupted() => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn retune(&self) {
        if let Some(params) = self.engine.optimize_from_history() {
            debug!(
                epsilon = params.epsilon,
                learning_rate = params.learning_rate,
                "Learning parameters after chapter"
            );
        }
        self.pipeline.tune_temperatures(
            &self.engine,
            self.config.low_reward_threshold,
            self.config.temperature_step,
            self.config.temperature_cap,
        );
    }
}
