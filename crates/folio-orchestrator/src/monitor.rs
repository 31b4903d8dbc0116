use crate::types::{AgentActivity, AgentMetrics, ProcessingStats, WorkerStatus};
use folio_core::AgentRole;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct ChapterCounters {
    completed: usize,
    skipped: usize,
    failed: usize,
}

/// Tracks agent activity and chapter throughput across runs.
pub struct AgentMonitor {
    states: Arc<RwLock<HashMap<AgentRole, AgentActivity>>>,
    chapters: Arc<RwLock<ChapterCounters>>,
}

impl AgentMonitor {
    /// Every chain agent idle, all counters zero.
    pub fn new() -> Self {
        let states = AgentRole::CHAIN
            .iter()
            .map(|role| {
                (
                    *role,
                    AgentActivity {
                        role: *role,
                        current_chapter: None,
                        status: WorkerStatus::Idle,
                        metrics: AgentMetrics::default(),
                    },
                )
            })
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
            chapters: Arc::new(RwLock::new(ChapterCounters::default())),
        }
    }

    /// Mark an agent as working on a chapter.
    pub async fn start_spin(&self, role: AgentRole, chapter_id: Uuid) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&role) {
            state.current_chapter = Some(chapter_id);
            state.status = WorkerStatus::Working;
        }
    }

    /// Record a completed spin and return the agent to idle.
    pub async fn finish_spin(&self, role: AgentRole, processing_ms: u64, reward: f64) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&role) {
            state.current_chapter = None;
            state.status = WorkerStatus::Idle;
            state.metrics.spins += 1;
            state.metrics.processing_ms += processing_ms;
            state.metrics.last_reward = Some(reward);
        }
    }

    /// Return an agent to idle without counting a spin (interrupted call).
    pub async fn abandon_spin(&self, role: AgentRole) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&role) {
            state.current_chapter = None;
            state.status = WorkerStatus::Idle;
        }
    }

    /// Count a failed call and flag the agent.
    pub async fn record_error(&self, role: AgentRole) {
        let mut states = self.states.write().await;
        if let Some(state) = states.get_mut(&role) {
            state.current_chapter = None;
            state.metrics.errors += 1;
            state.status = WorkerStatus::Error;
        }
    }

    /// Count an approved chapter.
    pub async fn chapter_completed(&self) {
        self.chapters.write().await.completed += 1;
    }

    /// Count a skipped chapter.
    pub async fn chapter_skipped(&self) {
        self.chapters.write().await.skipped += 1;
    }

    /// Count a chapter whose processing failed.
    pub async fn chapter_failed(&self) {
        self.chapters.write().await.failed += 1;
    }

    /// Current activity of one agent.
    pub async fn get_state(&self, role: AgentRole) -> Option<AgentActivity> {
        let states = self.states.read().await;
        states.get(&role).cloned()
    }

    /// Aggregate metrics across all agents.
    pub async fn aggregate_metrics(&self) -> AgentMetrics {
        let states = self.states.read().await;
        let mut total = AgentMetrics::default();
        for state in states.values() {
            total.spins += state.metrics.spins;
            total.errors += state.metrics.errors;
            total.processing_ms += state.metrics.processing_ms;
        }
        total
    }

    /// Agents in chain order plus chapter counters. Workflow-level fields
    /// are left empty for the orchestrator to fill.
    pub async fn snapshot(&self) -> ProcessingStats {
        let agents = {
            let states = self.states.read().await;
            AgentRole::CHAIN
                .iter()
                .filter_map(|role| states.get(role).cloned())
                .collect()
        };
        let aggregate = self.aggregate_metrics().await;
        let chapters = self.chapters.read().await;
        ProcessingStats {
            agents,
            chapters_completed: chapters.completed,
            chapters_skipped: chapters.skipped,
            chapters_failed: chapters.failed,
            aggregate,
            ..ProcessingStats::default()
        }
    }
}

impl Default for AgentMonitor {
    fn default() -> Self {
        Self::new()
    }
}
