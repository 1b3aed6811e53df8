// Defaults for the command line, loaded from the environment once at startup.
// Library code never reads these directly; main.rs passes them into ServiceConfig.

use std::env;

lazy_static::lazy_static! {
    pub static ref ANSWER_SERVICE_URL: String = env::var("AGILES_API_URL")
        .unwrap_or_else(|_| "https://spring-ai-chatbot.onrender.com".to_string());
}

/// Shown in place of an answer whenever a turn fails.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't get an answer right now. Please try again in a moment.";

/// Landing page tagline, cycled forever.
pub const TAGLINES: [&str; 3] = [
    "Ask Your Query......",
    "Get your Desire Ans....",
    "Gain Knowledge....",
];

pub const APP_TITLE: &str = "Agiles_AI";
pub const CHAT_HEADING: &str = "What can I help with?";
pub const INPUT_PLACEHOLDER: &str = "Ask something...";

/// Static content of the "developer info" modal. Describes this front end only.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DeveloperInfo {
    pub name: &'static str,
    pub role: &'static str,
    pub about: &'static str,
    pub built_with: &'static str,
}

pub const DEVELOPER: DeveloperInfo = DeveloperInfo {
    name: APP_TITLE,
    role: "Chat front end for a remote answer service",
    about: "Ask one question at a time. Only the latest question and answer are kept on screen.",
    built_with: "Rust, axum, minijinja and reqwest",
};
