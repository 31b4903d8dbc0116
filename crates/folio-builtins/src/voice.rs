//! Transcript → command parsing.
//!
//! Stands in for a speech-recognition front-end: whatever produced the
//! transcript (microphone, stdin, chat), this turns it into a
//! [`VoiceCommand`] the orchestrator can act on.

use folio_core::{CommandAction, FolioError, FolioResult, VoiceCommand};
use regex::Regex;
use serde_json::json;

/// Ordered pattern table; the first match wins.
pub struct CommandParser {
    patterns: Vec<(CommandAction, Regex)>,
    rating: Regex,
    out_of: Regex,
    feedback_text: Regex,
    skip_reason: Regex,
}

const DEFAULT_PATTERNS: &[(CommandAction, &str)] = &[
    (CommandAction::Pause, r"(?i)^\s*pause\s*$|pause\s+(workflow|work|process)"),
    (CommandAction::Resume, r"(?i)^\s*(resume|continue)\s*$|resume\s+(workflow|work|process)"),
    (CommandAction::Skip, r"(?i)^\s*skip\s*$|skip\s+(chapter|this)"),
    (CommandAction::Rate, r"(?i)rate\s+\d|\d+(\.\d+)?\s+out\s+of\s+\d+"),
    (CommandAction::ProvideFeedback, r"(?i)feedback|review|comment"),
    (CommandAction::Approve, r"(?i)approve|accept|good"),
    (CommandAction::Reject, r"(?i)reject|deny|bad"),
];

impl CommandParser {
    pub fn new() -> FolioResult<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| FolioError::Config(format!("invalid command pattern {p}: {e}")))
        };
        let patterns = DEFAULT_PATTERNS
            .iter()
            .map(|(action, p)| Ok((*action, compile(p)?)))
            .collect::<FolioResult<Vec<_>>>()?;
        Ok(Self {
            patterns,
            rating: compile(r"(?i)rate\s+(\d+(?:\.\d+)?)")?,
            out_of: compile(r"(?i)(\d+(?:\.\d+)?)\s+out\s+of\s+(\d+(?:\.\d+)?)")?,
            feedback_text: compile(r"(?i)(?:feedback|review|comment)[:\s]+(.+)")?,
            skip_reason: compile(r"(?i)skip.+because\s+(.+)")?,
        })
    }

    /// Add a pattern checked after the built-in ones.
    pub fn add_pattern(&mut self, action: CommandAction, pattern: &str) -> FolioResult<()> {
        let re = Regex::new(pattern)
            .map_err(|e| FolioError::Config(format!("invalid command pattern {pattern}: {e}")))?;
        self.patterns.push((action, re));
        Ok(())
    }

    /// Parse a transcript, `None` if nothing matches.
    pub fn parse(&self, transcript: &str) -> Option<VoiceCommand> {
        let trimmed = transcript.trim();
        if trimmed.is_empty() {
            return None;
        }
        let action = self
            .patterns
            .iter()
            .find(|(_, re)| re.is_match(trimmed))
            .map(|(action, _)| *action)?;

        let mut command = VoiceCommand::new(action, trimmed);
        match action {
            CommandAction::Rate => {
                if let Some(rating) = self.extract_rating(trimmed) {
                    command = command.with_parameter("rating", json!(rating));
                }
            }
            CommandAction::ProvideFeedback => {
                if let Some(c) = self.feedback_text.captures(trimmed) {
                    command = command.with_parameter("comment", json!(c[1].trim()));
                }
            }
            CommandAction::Skip => {
                if let Some(c) = self.skip_reason.captures(trimmed) {
                    command = command.with_parameter("reason", json!(c[1].trim()));
                }
            }
            _ => {}
        }
        Some(command)
    }

    /// "rate N" as-is; "N out of M" rescaled to the 0–10 scale.
    fn extract_rating(&self, transcript: &str) -> Option<f64> {
        if let Some(c) = self.rating.captures(transcript) {
            return c[1].parse().ok();
        }
        let c = self.out_of.captures(transcript)?;
        let score: f64 = c[1].parse().ok()?;
        let scale: f64 = c[2].parse().ok()?;
        (scale > 0.0).then(|| score / scale * 10.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parser() -> CommandParser {
        CommandParser::new().unwrap()
    }

    #[test]
    fn test_control_commands() {
        let p = parser();
        assert_eq!(p.parse("Pause the workflow").map(|c| c.action), None);
        assert_eq!(p.parse("please pause workflow").unwrap().action, CommandAction::Pause);
        assert_eq!(p.parse("pause").unwrap().action, CommandAction::Pause);
        assert_eq!(p.parse("Resume process").unwrap().action, CommandAction::Resume);
        assert_eq!(p.parse("continue").unwrap().action, CommandAction::Resume);
        assert_eq!(p.parse("skip this one").unwrap().action, CommandAction::Skip);
    }

    #[test]
    fn test_skip_reason() {
        let cmd = parser().parse("skip chapter because it is a preface").unwrap();
        assert_eq!(cmd.parameters["reason"], json!("it is a preface"));
    }

    #[test]
    fn test_rating_forms() {
        let p = parser();
        assert_eq!(p.parse("rate 8").unwrap().rating(), Some(8.0));
        let cmd = p.parse("I'd say 4 out of 5").unwrap();
        assert_eq!(cmd.action, CommandAction::Rate);
        assert_eq!(cmd.rating(), Some(8.0));
    }

    #[test]
    fn test_rating_wins_over_sentiment_words() {
        let cmd = parser().parse("bad pacing, rate 3").unwrap();
        assert_eq!(cmd.action, CommandAction::Rate);
        assert_eq!(cmd.rating(), Some(3.0));
    }

    #[test]
    fn test_feedback_text() {
        let cmd = parser().parse("feedback: the dialogue feels stiff").unwrap();
        assert_eq!(cmd.action, CommandAction::ProvideFeedback);
        assert_eq!(cmd.parameters["comment"], json!("the dialogue feels stiff"));
    }

    #[test]
    fn test_approve_reject_and_unknown() {
        let p = parser();
        assert_eq!(p.parse("looks good").unwrap().action, CommandAction::Approve);
        assert_eq!(p.parse("reject it").unwrap().action, CommandAction::Reject);
        assert!(p.parse("what time is it").is_none());
        assert!(p.parse("   ").is_none());
    }

    #[test]
    fn test_custom_pattern() {
        let mut p = parser();
        p.add_pattern(CommandAction::Pause, r"(?i)hold on").unwrap();
        assert_eq!(p.parse("hold on a second").unwrap().action, CommandAction::Pause);
        assert!(p.add_pattern(CommandAction::Pause, "(").is_err());
    }
}
