//! Console output formatter for session traffic

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use harness_application::{FailureCategory, HarnessError};
use harness_domain::Message;
use serde_json::Value;

/// Formats wire traffic and failures for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// `--> [n] payload`
    pub fn format_sent(request_number: i64, payload: &Value) -> String {
        format!(
            "{} {} {}",
            "-->".cyan().bold(),
            format!("[{}]", request_number).cyan(),
            payload
        )
    }

    /// `<-- [n] body` for responses, `<-- call function args` for
    /// notifications.
    pub fn format_message(message: &Message) -> String {
        match message {
            Message::Response(response) => format!(
                "{} {} {}",
                "<--".green().bold(),
                format!("[{}]", response.request_number).green(),
                response.body
            ),
            Message::Notification(notification) => format!(
                "{} {} {} {}",
                "<--".magenta().bold(),
                "call".magenta(),
                notification.function.yellow().bold(),
                Value::Array(notification.args.clone()).to_string().dimmed()
            ),
        }
    }

    pub fn format_failure(error: &HarnessError) -> String {
        let category = error.category();
        let label = format!("{} failure:", category);
        let label = match category {
            FailureCategory::Leak => label.yellow().bold(),
            _ => label.red().bold(),
        };

        let mut output = format!("{} {}", label, error);
        let partial = error.partial_messages();
        if !partial.is_empty() {
            output.push_str(&format!(
                "\n{}\n",
                format!("Received before the failure ({}):", partial.len()).dimmed()
            ));
            let lines: Vec<String> = partial.iter().map(Self::format_message).collect();
            output.push_str(&Self::indent(&lines.join("\n"), "  "));
        }
        output
    }

    pub fn format_summary(received: usize, failures: usize) -> String {
        let line = "-".repeat(40);
        let verdict = if failures == 0 {
            "OK".green().bold()
        } else {
            format!("FAILED ({})", failures).red().bold()
        };
        format!(
            "{}\n{} {} message(s) received\n",
            line.dimmed(),
            verdict,
            received
        )
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_sent(&self, request_number: i64, payload: &Value) -> String {
        Self::format_sent(request_number, payload)
    }

    fn format_message(&self, message: &Message) -> String {
        Self::format_message(message)
    }

    fn format_failure(&self, error: &HarnessError) -> String {
        Self::format_failure(error)
    }

    fn format_summary(&self, received: usize, failures: usize) -> String {
        Self::format_summary(received, failures)
    }
}
