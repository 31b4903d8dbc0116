use crate::{FolioError, FolioResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reading speed used for the book-level reading time estimate.
pub const WORDS_PER_MINUTE: f64 = 200.0;

/// Role of each agent in the transformation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Rewrites the chapter; its output replaces the content.
    Writer,
    /// Critiques the rewrite; its output is recorded only.
    Reviewer,
    /// Polishes the rewrite; its output replaces the content again.
    Editor,
}

impl AgentRole {
    /// The chain order used by the pipeline.
    pub const CHAIN: [AgentRole; 3] = [AgentRole::Writer, AgentRole::Reviewer, AgentRole::Editor];

    /// Action label under which this role's rewards are learned.
    pub fn action_label(&self) -> String {
        format!("{self}_spin")
    }

    /// Parse a role name case-insensitively.
    pub fn parse_role(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "writer" => Some(AgentRole::Writer),
            "reviewer" => Some(AgentRole::Reviewer),
            "editor" => Some(AgentRole::Editor),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Writer => write!(f, "writer"),
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Editor => write!(f, "editor"),
        }
    }
}

/// Lifecycle status of a chapter.
///
/// Moves forward only, with one exception: `HumanReview` may loop back to
/// `Transforming` for a feedback-driven re-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    Scraped,
    Transforming,
    AiReviewed,
    HumanReview,
    Approved,
    Published,
}

impl ChapterStatus {
    fn rank(self) -> u8 {
        match self {
            ChapterStatus::Scraped => 0,
            ChapterStatus::Transforming => 1,
            ChapterStatus::AiReviewed => 2,
            ChapterStatus::HumanReview => 3,
            ChapterStatus::Approved => 4,
            ChapterStatus::Published => 5,
        }
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    pub fn can_transition_to(self, next: ChapterStatus) -> bool {
        next.rank() >= self.rank()
            || (self == ChapterStatus::HumanReview && next == ChapterStatus::Transforming)
    }
}

impl std::fmt::Display for ChapterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChapterStatus::Scraped => "scraped",
            ChapterStatus::Transforming => "transforming",
            ChapterStatus::AiReviewed => "ai_reviewed",
            ChapterStatus::HumanReview => "human_review",
            ChapterStatus::Approved => "approved",
            ChapterStatus::Published => "published",
        };
        f.write_str(s)
    }
}

/// Processing metadata captured alongside a spin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpinMetadata {
    pub processing_ms: u64,
    pub input_length: usize,
    pub output_length: usize,
    pub temperature: f32,
    pub quality: f64,
}

/// One agent's transformation attempt on a chapter. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinRecord {
    pub id: Uuid,
    pub role: AgentRole,
    pub model: String,
    pub prompt: String,
    pub response: String,
    /// Combined reward in `[0, 100]`.
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: SpinMetadata,
}

/// A reviewer's submission for one chapter. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanFeedback {
    pub id: Uuid,
    /// Chapter this feedback is addressed to; the rendezvous key.
    pub chapter_id: Uuid,
    pub submitter_id: String,
    pub role: AgentRole,
    pub comment: String,
    /// Rating on a `0..=10` scale.
    pub rating: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl HumanFeedback {
    pub fn new(
        chapter_id: Uuid,
        submitter_id: impl Into<String>,
        role: AgentRole,
        comment: impl Into<String>,
        rating: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            chapter_id,
            submitter_id: submitter_id.into(),
            role,
            comment: comment.into(),
            rating,
            suggestions: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Reject ratings outside `0..=10`.
    pub fn validate(&self) -> FolioResult<()> {
        if !self.rating.is_finite() || !(0.0..=10.0).contains(&self.rating) {
            return Err(FolioError::Validation(format!(
                "feedback rating must be within 0..=10, got {}",
                self.rating
            )));
        }
        Ok(())
    }
}

/// A sub-unit of a book carrying its own content, status, and history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub original_content: String,
    pub version: u32,
    pub status: ChapterStatus,
    #[serde(default)]
    pub spin_history: Vec<SpinRecord>,
    #[serde(default)]
    pub human_feedback: Vec<HumanFeedback>,
    pub reward_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            original_content: content.clone(),
            content,
            version: 1,
            status: ChapterStatus::Scraped,
            spin_history: Vec::new(),
            human_feedback: Vec::new(),
            reward_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`, rejecting backward transitions.
    pub fn advance(&mut self, next: ChapterStatus) -> FolioResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(FolioError::Validation(format!(
                "chapter {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Commit one completed pipeline pass: new content, appended spin
    /// records, version bump, and a recomputed reward score.
    pub fn commit_pass(&mut self, content: String, records: Vec<SpinRecord>) {
        self.content = content;
        self.spin_history.extend(records);
        self.version += 1;
        self.recompute_reward();
        self.updated_at = Utc::now();
    }

    /// Mean of the spin rewards clamped to `[0, 100]`; 0 for an empty history.
    pub fn recompute_reward(&mut self) {
        self.reward_score = if self.spin_history.is_empty() {
            0.0
        } else {
            let total: f64 = self.spin_history.iter().map(|r| r.reward).sum();
            (total / self.spin_history.len() as f64).clamp(0.0, 100.0)
        };
    }

    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Source metadata for a book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMetadata {
    pub source_url: String,
    pub author: String,
    pub genre: String,
    pub description: String,
    pub language: String,
    /// Minutes, at [`WORDS_PER_MINUTE`].
    pub estimated_reading_time: f64,
}

impl BookMetadata {
    pub fn new(source_url: impl Into<String>, total_words: usize) -> Self {
        Self {
            source_url: source_url.into(),
            author: "Unknown".to_string(),
            genre: "Fiction".to_string(),
            description: "AI-processed book content".to_string(),
            language: "en".to_string(),
            estimated_reading_time: total_words as f64 / WORDS_PER_MINUTE,
        }
    }
}

/// The top-level item being processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: Uuid,
    pub title: String,
    pub chapters: Vec<Chapter>,
    pub metadata: BookMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkUnit {
    /// Build a book from freshly acquired chapters. The book takes the first
    /// chapter's title.
    pub fn new(id: Uuid, source_url: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        let total_words = chapters.iter().map(Chapter::word_count).sum();
        let title = chapters
            .first()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| "Untitled Book".to_string());
        let now = Utc::now();
        Self {
            id,
            title,
            chapters,
            metadata: BookMetadata::new(source_url, total_words),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn chapter(&self, id: Uuid) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn chapter_mut(&mut self, id: Uuid) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.id == id)
    }
}

/// Snapshot of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub work_unit_id: Uuid,
    pub current_chapter: usize,
    pub total_chapters: usize,
    pub current_stage: ChapterStatus,
    pub human_in_loop: bool,
    pub voice_enabled: bool,
    pub learning_enabled: bool,
    #[serde(default)]
    pub paused: bool,
}
