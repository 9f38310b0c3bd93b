// src/formatting.rs

use crate::core::PathState;

/// Subject line for an alert email.
///
/// Kept independent of state and message so that every alert for a path
/// threads into one conversation.
pub fn email_subject(path: &str) -> String {
    format!("Warning! {} has an alert!", path)
}

/// Body of an alert email.
pub fn email_body(path: &str, state: &PathState, message: &str) -> String {
    format!("{}\n{} is in the {} state.", message, path, state)
}

/// A trait for rendering one alert as chat text.
pub trait TextFormatter: Send + Sync {
    fn format_alert(&self, path: &str, state: &PathState, message: &str) -> String;
}

/// A formatter for Slack's mrkdwn syntax.
pub struct SlackTextFormatter;

impl TextFormatter for SlackTextFormatter {
    fn format_alert(&self, path: &str, state: &PathState, message: &str) -> String {
        let headline = format!("{} `{}` is in the *{}* state", state_emoji(state), path, state);
        if message.is_empty() {
            return headline;
        }
        format!("{}\n```\n{}\n```", headline, message)
    }
}

fn state_emoji(state: &PathState) -> &'static str {
    match state {
        PathState::Ok => ":white_check_mark:",
        PathState::Unknown => ":grey_question:",
        _ => ":rotating_light:",
    }
}
