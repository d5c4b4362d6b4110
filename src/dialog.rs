//! Operator dialog gate.
//!
//! Asks the on-site operator a single yes/no question through the host's
//! question-dialog tool (`zenity --question` by default). The answer is a
//! tri-state [`DialogAnswer`]; a dialog that cannot be shown is an answer,
//! not an error, so the control loop branches on a value.
//!
//! There is no timeout: the loop waits for as long as the operator takes.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AgentConfig;
use crate::process::{CommandSpec, OutputMode, ProcessError, ProcessRunner};

/// Exit code the dialog tool uses for the cancel button or window close.
const CANCEL_EXIT_CODE: i32 = 1;

/// Outcome of a question put to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAnswer {
    /// The operator confirmed the question.
    Yes,
    /// The operator declined the question.
    No,
    /// No answer could be obtained; carries the reason.
    Unavailable(String),
}

/// A question shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Window title.
    pub title: String,
    /// Question body.
    pub text: String,
    /// Label of the confirming button.
    pub ok_label: String,
    /// Label of the declining button.
    pub cancel_label: String,
}

impl Question {
    /// The question asked when no sales were seen in the last check window.
    ///
    /// Answering yes reports a problem (restore); no requests a fresh
    /// preventive backup.
    #[must_use]
    pub fn quiet_period(window: Duration) -> Self {
        let window = describe_window(window);
        Self {
            title: "Point of sale database monitor".to_string(),
            text: format!(
                "No sales have been recorded in the last {window}.\n\n\
                 Is the point of sale having problems?\n\n\
                 Yes: restore the most recent backup (the database will be restarted).\n\
                 No: take a new preventive backup."
            ),
            ok_label: "Yes, restore".to_string(),
            cancel_label: "No, back up".to_string(),
        }
    }
}

/// Renders a check window for people: whole minutes rounded up, or
/// seconds below one minute.
#[must_use]
pub fn describe_window(window: Duration) -> String {
    let secs = u64::try_from(window.as_millis().div_ceil(1000)).unwrap_or(u64::MAX);
    let (count, unit) = if secs < 60 {
        (secs, "second")
    } else {
        (secs.div_ceil(60), "minute")
    };
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Blocking yes/no prompt to the local operator.
#[async_trait]
pub trait OperatorGate: Send + Sync + fmt::Debug {
    /// Shows `question` and waits for the operator.
    async fn ask(&self, question: &Question) -> DialogAnswer;
}

/// [`OperatorGate`] that shells out to a zenity-compatible dialog tool.
#[derive(Debug, Clone)]
pub struct ZenityGate {
    program: String,
    width: u32,
    runner: Arc<dyn ProcessRunner>,
}

impl ZenityGate {
    /// Creates a gate using the dialog tool named in `config`.
    #[must_use]
    pub fn new(config: &AgentConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            program: config.dialog_bin.clone(),
            width: config.dialog_width,
            runner,
        }
    }

    fn command(&self, question: &Question) -> CommandSpec {
        CommandSpec::new(self.program.as_str()).args([
            "--question".to_string(),
            format!("--title={}", question.title),
            format!("--text={}", question.text),
            format!("--width={}", self.width),
            format!("--ok-label={}", question.ok_label),
            format!("--cancel-label={}", question.cancel_label),
        ])
    }
}

#[async_trait]
impl OperatorGate for ZenityGate {
    async fn ask(&self, question: &Question) -> DialogAnswer {
        let spec = self.command(question);
        let answer = answer_from(self.runner.run(&spec, OutputMode::Inherit).await);
        tracing::info!(title = %question.title, ?answer, "operator dialog closed");
        answer
    }
}

/// Maps the dialog tool's exit to an answer: 0 is yes, 1 is no, anything
/// else (including failure to launch) is unavailable.
fn answer_from<T>(result: Result<T, ProcessError>) -> DialogAnswer {
    match result {
        Ok(_) => DialogAnswer::Yes,
        Err(ProcessError::NonZeroExit {
            code: Some(CANCEL_EXIT_CODE),
            ..
        }) => DialogAnswer::No,
        Err(e) => DialogAnswer::Unavailable(e.to_string()),
    }
}
