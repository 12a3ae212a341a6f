//! Message log of a running step

use kengine_core::{ChatMessage, Role};
use tracing::{debug, info};

pub const TRANSCRIPT_TARGET: &str = "kengine::transcript";

const DEFAULT_NAMESPACE: &str = "AI";
const BOX_TOP: &str = "╭─ ";
const BOX_SIDE: &str = "│ ";
const BOX_BOTTOM: &str = "╰──";

/// Formats and emits every message exchanged by one step
#[derive(Debug, Clone)]
pub struct Transcript {
    namespace: String,
    process: String,
    step: String,
    interaction: u32,
}

impl Transcript {
    pub fn new(process: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            process: process.into(),
            step: step.into(),
            interaction: 0,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn interaction(&self) -> u32 {
        self.interaction
    }

    /// Count one more request to the model
    pub fn next_interaction(&mut self) -> u32 {
        self.interaction += 1;
        self.interaction
    }

    /// `<namespace>::<process>/<step> <NN>:`
    fn head(&self) -> String {
        format!(
            "{:>10}::{}/{} {:02}:",
            self.namespace, self.process, self.step, self.interaction
        )
    }

    pub fn format_message(&self, message: &ChatMessage) -> String {
        let (label, content) = match (&message.role, &message.function_call) {
            (Role::Assistant, Some(call)) => (call.name.as_str(), call.arguments.as_str()),
            (Role::Function, _) => (message.name.as_deref().unwrap_or("function"), message.text()),
            _ => ("message", message.text()),
        };
        format!(
            "{}{}({:9}){}",
            self.head(),
            label,
            message.role.to_string(),
            content
        )
    }

    /// Emit a message; replies from the model are logged at info
    pub fn message(&self, message: &ChatMessage) {
        let line = self.format_message(message);
        if message.role == Role::Assistant {
            info!(target: TRANSCRIPT_TARGET, "{}", line);
        } else {
            debug!(target: TRANSCRIPT_TARGET, "{}", line);
        }
    }

    /// First line of a step's box
    pub fn header(&self, title: &str) {
        info!(target: TRANSCRIPT_TARGET, "{}{}", BOX_TOP, title);
    }

    /// Closing line of a step's box
    pub fn footer(&self) {
        info!(target: TRANSCRIPT_TARGET, "{}{}", BOX_BOTTOM, "─".repeat(80));
    }

    pub fn open_box(&self) {
        info!(target: TRANSCRIPT_TARGET, "{}{}/{}", BOX_TOP, self.process, self.step);
    }

    pub fn note(&self, text: &str) {
        info!(target: TRANSCRIPT_TARGET, "{}{}", BOX_SIDE, text);
    }

    pub fn close_box(&self) {
        info!(target: TRANSCRIPT_TARGET, "{}", BOX_BOTTOM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_plain_message() {
        let mut transcript = Transcript::new("Snake", "01_Design");
        transcript.next_interaction();
        assert_eq!(
            transcript.format_message(&ChatMessage::user("Write a game")),
            "        AI::Snake/01_Design 01:message(user     )Write a game"
        );
    }

    #[test]
    fn test_format_function_messages() {
        let transcript = Transcript::new("Snake", "02_Code").with_namespace("Step");

        let call = ChatMessage::assistant_function_call(
            None,
            "write_file",
            r#"{"name":"a.py","contents":"x"}"#,
        );
        assert_eq!(
            transcript.format_message(&call),
            r#"      Step::Snake/02_Code 00:write_file(assistant){"name":"a.py","contents":"x"}"#
        );

        let result = ChatMessage::function_result("write_file", "Done.");
        assert_eq!(
            transcript.format_message(&result),
            "      Step::Snake/02_Code 00:write_file(function )Done."
        );
    }

    #[test]
    fn test_interaction_counter() {
        let mut transcript = Transcript::new("p", "s");
        assert_eq!(transcript.interaction(), 0);
        assert_eq!(transcript.next_interaction(), 1);
        assert_eq!(transcript.next_interaction(), 2);
    }
}
