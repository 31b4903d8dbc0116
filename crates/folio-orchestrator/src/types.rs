use folio_core::{AgentRole, ChapterStatus, FolioError, FolioResult, WorkUnit, WorkflowState};
use folio_learning::RewardStats;
use folio_memory::{ContentStats, SearchHit};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-run switches passed to `start_workflow`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOptions {
    #[serde(default = "default_chapter_count")]
    pub chapter_count: usize,
    #[serde(default)]
    pub human_in_loop: bool,
    #[serde(default)]
    pub voice_enabled: bool,
    #[serde(default = "default_learning_enabled")]
    pub learning_enabled: bool,
}

fn default_chapter_count() -> usize {
    1
}

fn default_learning_enabled() -> bool {
    true
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            chapter_count: default_chapter_count(),
            human_in_loop: false,
            voice_enabled: false,
            learning_enabled: default_learning_enabled(),
        }
    }
}

impl WorkflowOptions {
    pub fn validate(&self) -> FolioResult<()> {
        if self.chapter_count == 0 {
            return Err(FolioError::Validation(
                "chapter_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifecycle notifications published on the orchestrator's broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    WorkflowStarted {
        work_unit_id: Uuid,
        source_ref: String,
        chapter_count: usize,
    },
    ChapterAcquired {
        work_unit_id: Uuid,
        chapter_id: Uuid,
        index: usize,
        title: String,
    },
    StageChanged {
        work_unit_id: Uuid,
        chapter_id: Uuid,
        stage: ChapterStatus,
    },
    ChapterCompleted {
        work_unit_id: Uuid,
        chapter_id: Uuid,
        version: u32,
        reward_score: f64,
    },
    ChapterSkipped {
        work_unit_id: Uuid,
        chapter_id: Uuid,
    },
    FeedbackReceived {
        chapter_id: Uuid,
        rating: f64,
    },
    WorkflowPaused {
        work_unit_id: Uuid,
    },
    WorkflowResumed {
        work_unit_id: Uuid,
    },
    WorkflowCompleted {
        work_unit_id: Uuid,
        chapters_approved: usize,
        chapters_skipped: usize,
    },
    WorkflowError {
        work_unit_id: Uuid,
        error: String,
    },
}

impl WorkflowEvent {
    /// The run this event belongs to; `None` for feedback events, which are keyed by chapter.
    pub fn work_unit_id(&self) -> Option<Uuid> {
        match self {
            WorkflowEvent::WorkflowStarted { work_unit_id, .. }
            | WorkflowEvent::ChapterAcquired { work_unit_id, .. }
            | WorkflowEvent::StageChanged { work_unit_id, .. }
            | WorkflowEvent::ChapterCompleted { work_unit_id, .. }
            | WorkflowEvent::ChapterSkipped { work_unit_id, .. }
            | WorkflowEvent::WorkflowPaused { work_unit_id }
            | WorkflowEvent::WorkflowResumed { work_unit_id }
            | WorkflowEvent::WorkflowCompleted { work_unit_id, .. }
            | WorkflowEvent::WorkflowError { work_unit_id, .. } => Some(*work_unit_id),
            WorkflowEvent::FeedbackReceived { .. } => None,
        }
    }

    /// Whether this is the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::WorkflowCompleted { .. } | WorkflowEvent::WorkflowError { .. }
        )
    }
}

/// Result of `search_content`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub chapters: Vec<SearchHit>,
    /// Mean of `1 - distance` over the hits, 0 when nothing matched.
    pub relevance_score: f64,
}

impl SearchResults {
    pub fn from_hits(chapters: Vec<SearchHit>) -> Self {
        let relevance_score = if chapters.is_empty() {
            0.0
        } else {
            chapters
                .iter()
                .map(|hit| 1.0 - f64::from(hit.distance))
                .sum::<f64>()
                / chapters.len() as f64
        };
        Self {
            chapters,
            relevance_score,
        }
    }
}

/// Summary numbers for one book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookStats {
    pub total_chapters: usize,
    pub approved_chapters: usize,
    pub published_chapters: usize,
    pub total_words: usize,
    /// Total passes over all chapters.
    pub total_passes: u32,
    pub mean_reward: f64,
    pub estimated_reading_time: f64,
}

impl BookStats {
    pub fn of(book: &WorkUnit) -> Self {
        let total_chapters = book.chapters.len();
        let mean_reward = if total_chapters == 0 {
            0.0
        } else {
            book.chapters.iter().map(|c| c.reward_score).sum::<f64>() / total_chapters as f64
        };
        let count = |status: ChapterStatus| {
            book.chapters
                .iter()
                .filter(|c| c.status == status)
                .count()
        };
        Self {
            total_chapters,
            approved_chapters: count(ChapterStatus::Approved),
            published_chapters: count(ChapterStatus::Published),
            total_words: book.chapters.iter().map(|c| c.word_count()).sum(),
            total_passes: book.chapters.iter().map(|c| c.version - 1).sum(),
            mean_reward,
            estimated_reading_time: book.metadata.estimated_reading_time,
        }
    }
}

/// Result of `export_book`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedBook {
    pub book: WorkUnit,
    pub stats: BookStats,
}

/// Metrics tracked per agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub spins: u32,
    pub errors: u32,
    pub processing_ms: u64,
    pub last_reward: Option<f64>,
}

/// Real-time snapshot of one pipeline agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentActivity {
    pub role: AgentRole,
    pub current_chapter: Option<Uuid>,
    pub status: WorkerStatus,
    pub metrics: AgentMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Working,
    Error,
}

/// Chapter and agent throughput, the `processing_stats` part of the metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub agents: Vec<AgentActivity>,
    pub chapters_completed: usize,
    pub chapters_skipped: usize,
    pub chapters_failed: usize,
    pub aggregate: AgentMetrics,
    /// Chapters with feedback queued but not yet consumed.
    #[serde(default)]
    pub pending_feedback: usize,
    /// State of the active run, or of the last one.
    #[serde(default)]
    pub current_workflow: Option<WorkflowState>,
}

/// Result of `performance_metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub reward_stats: RewardStats,
    pub content_stats: ContentStats,
    pub processing_stats: ProcessingStats,
}
