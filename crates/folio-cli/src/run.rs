use crate::app::App;
use folio_builtins::CommandParser;
use folio_core::{AgentRole, CommandAction, HumanFeedback, VoiceCommand};
use folio_orchestrator::{ExportedBook, WorkflowEvent, WorkflowOptions, WorkflowOrchestrator};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use uuid::Uuid;

const SUBMITTER: &str = "cli";

/// What a typed line asks for when voice commands are off.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Pause,
    Resume,
    Skip,
    Feedback {
        rating: f64,
        comment: String,
        suggestions: Vec<String>,
    },
}

impl Intent {
    /// `None` for a rate command without a usable number.
    pub fn from_command(command: &VoiceCommand) -> Option<Self> {
        let rating = match command.action {
            CommandAction::Pause => return Some(Intent::Pause),
            CommandAction::Resume => return Some(Intent::Resume),
            CommandAction::Skip => return Some(Intent::Skip),
            CommandAction::Approve => 10.0,
            CommandAction::Reject => 0.0,
            CommandAction::Rate => command.rating()?,
            CommandAction::ProvideFeedback => command.rating().unwrap_or(5.0),
        };
        let comment = command
            .parameters
            .get("comment")
            .and_then(serde_json::Value::as_str)
            .map_or_else(|| command.transcript.clone(), str::to_string);
        Some(Intent::Feedback {
            rating,
            comment,
            suggestions: command.suggestions(),
        })
    }
}

/// Run one workflow in the foreground, taking commands from stdin, and
/// print the book summary when it ends.
pub async fn run(app: &App, source: &str, options: WorkflowOptions) -> anyhow::Result<()> {
    let orchestrator = &app.orchestrator;
    let parser = CommandParser::new()?;
    let voice = options.voice_enabled;

    let mut events = orchestrator.subscribe();
    let handle = orchestrator.start_workflow(source, options)?;
    let work_unit_id = handle.work_unit_id();
    println!("Started work unit {work_unit_id}");
    println!("Commands: pause | resume | skip | rate N | approve | reject | feedback <text>");

    let mut lines = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut current_chapter: Option<Uuid> = None;
    let outcome = handle.wait();
    tokio::pin!(outcome);

    let result = loop {
        tokio::select! {
            result = &mut outcome => break result,
            event = events.recv() => match event {
                Ok(event) => on_event(&event, &mut current_chapter),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {}
            },
            line = lines.recv(), if stdin_open => match line {
                Some(line) => {
                    if let Err(e) = apply_line(orchestrator, &parser, &line, voice, current_chapter) {
                        warn!(error = %e, line = %line, "Command rejected");
                        println!("! {e}");
                    }
                }
                None => stdin_open = false,
            },
        }
    };

    // Events published just before the task ended.
    while let Ok(event) = events.try_recv() {
        on_event(&event, &mut current_chapter);
    }

    match orchestrator.export_book(work_unit_id) {
        Ok(exported) => print_summary(&exported),
        Err(e) => warn!(error = %e, "No book to summarize"),
    }
    let saved = app.save_value_table().await?;
    info!(entries = saved, "Value table saved");

    result.map_err(anyhow::Error::from)
}

/// Lines from stdin on a plain thread, so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn on_event(event: &WorkflowEvent, current_chapter: &mut Option<Uuid>) {
    match event {
        WorkflowEvent::StageChanged { chapter_id, .. } => *current_chapter = Some(*chapter_id),
        WorkflowEvent::ChapterCompleted { .. } | WorkflowEvent::ChapterSkipped { .. } => {
            *current_chapter = None;
        }
        _ => {}
    }
    if let Some(line) = describe(event) {
        println!("{line}");
    }
}

/// One-line progress text for the events worth showing.
pub fn describe(event: &WorkflowEvent) -> Option<String> {
    let text = match event {
        WorkflowEvent::ChapterAcquired { index, title, .. } => {
            format!("Acquired chapter {}: {title}", index + 1)
        }
        WorkflowEvent::StageChanged { stage, .. } => format!("  -> {stage}"),
        WorkflowEvent::ChapterCompleted {
            version,
            reward_score,
            ..
        } => format!("Chapter approved at version {version} (reward {reward_score:.1})"),
        WorkflowEvent::ChapterSkipped { chapter_id, .. } => format!("Chapter {chapter_id} skipped"),
        WorkflowEvent::FeedbackReceived { rating, .. } => format!("Feedback queued (rating {rating})"),
        WorkflowEvent::WorkflowPaused { .. } => "Paused".to_string(),
        WorkflowEvent::WorkflowResumed { .. } => "Resumed".to_string(),
        WorkflowEvent::WorkflowCompleted {
            chapters_approved,
            chapters_skipped,
            ..
        } => format!("Completed: {chapters_approved} approved, {chapters_skipped} skipped"),
        WorkflowEvent::WorkflowError { error, .. } => format!("Failed: {error}"),
        WorkflowEvent::WorkflowStarted { .. } => return None,
    };
    Some(text)
}

fn apply_line(
    orchestrator: &WorkflowOrchestrator,
    parser: &CommandParser,
    line: &str,
    voice: bool,
    current_chapter: Option<Uuid>,
) -> anyhow::Result<()> {
    if line.trim().is_empty() {
        return Ok(());
    }
    let Some(mut command) = parser.parse(line) else {
        anyhow::bail!("unrecognized command: {}", line.trim());
    };
    command.user_id = SUBMITTER.to_string();
    if voice {
        orchestrator.handle_command(&command)?;
        return Ok(());
    }

    let intent = Intent::from_command(&command)
        .ok_or_else(|| anyhow::anyhow!("rate needs a number, e.g. 'rate 8'"))?;
    match intent {
        Intent::Pause => orchestrator.pause_workflow()?,
        Intent::Resume => orchestrator.resume_workflow()?,
        Intent::Skip => {
            orchestrator.skip_chapter()?;
        }
        Intent::Feedback {
            rating,
            comment,
            suggestions,
        } => {
            let chapter_id =
                current_chapter.ok_or_else(|| anyhow::anyhow!("no chapter in progress"))?;
            let feedback =
                HumanFeedback::new(chapter_id, SUBMITTER, AgentRole::Editor, comment, rating)
                    .with_suggestions(suggestions);
            orchestrator.submit_feedback(feedback)?;
        }
    }
    Ok(())
}

fn print_summary(exported: &ExportedBook) {
    let book = &exported.book;
    let stats = &exported.stats;
    println!();
    println!("{} ({})", book.title, book.id);
    for (i, chapter) in book.chapters.iter().enumerate() {
        println!(
            "  {}. {} [{}] v{} reward {:.1}, {} words",
            i + 1,
            chapter.title,
            chapter.status,
            chapter.version,
            chapter.reward_score,
            chapter.word_count()
        );
    }
    println!(
        "Approved {}/{}, {} passes, mean reward {:.1}, ~{:.1} min read",
        stats.approved_chapters,
        stats.total_chapters,
        stats.total_passes,
        stats.mean_reward,
        stats.estimated_reading_time
    );
}
