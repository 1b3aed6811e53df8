pub mod answer_service;
pub mod chat;
pub mod chat_turn;
pub mod config;
pub mod constants;
pub mod tagline;
pub mod web_server;

pub use answer_service::{extract_answer, AnswerError, AnswerService, HttpAnswerService};
pub use chat_turn::{ChatTurn, ChatTurnController, PendingTurn, TurnPhase};
pub use config::{QuestionPlacement, RequestMethod, ResponseShape, ServiceConfig, Variant};
