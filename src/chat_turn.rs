use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::answer_service::{AnswerError, AnswerService};
use crate::constants::FALLBACK_ANSWER;

/// Where the current turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Idle,
    Pending,
    Answered,
}

/// The single record a chat view renders. Overwritten in place on every turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub question_text: String,
    pub submitted_text: String,
    pub answer_text: String,
    pub is_pending: bool,
    pub is_submitted: bool,
}

impl ChatTurn {
    pub fn phase(&self) -> TurnPhase {
        if self.is_pending {
            TurnPhase::Pending
        } else if self.is_submitted {
            TurnPhase::Answered
        } else {
            TurnPhase::Idle
        }
    }
}

/// Ticket for a submitted turn, handed back on resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub turn: u64,
    pub question: String,
}

/// Owns one ChatTurn and mediates question/answer cycles with an AnswerService.
pub struct ChatTurnController {
    state: ChatTurn,
    service: Arc<dyn AnswerService>,
    current_turn: u64,
}

impl ChatTurnController {
    pub fn new(service: Arc<dyn AnswerService>) -> Self {
        Self {
            state: ChatTurn::default(),
            service,
            current_turn: 0,
        }
    }

    pub fn state(&self) -> &ChatTurn {
        &self.state
    }

    pub fn service(&self) -> Arc<dyn AnswerService> {
        self.service.clone()
    }

    pub fn edit_input(&mut self, text: impl Into<String>) {
        self.state.question_text = text.into();
    }

    /// Accept a submission and move to pending. `None` if the input is blank
    /// or a turn is already in flight; the state is untouched in that case.
    pub fn begin(&mut self, raw_input: &str) -> Option<PendingTurn> {
        if raw_input.trim().is_empty() {
            return None;
        }
        if self.state.is_pending {
            info!(turn = self.current_turn, "Ignoring submission while a turn is pending");
            return None;
        }

        self.current_turn += 1;
        self.state.is_pending = true;
        self.state.submitted_text = raw_input.to_string();
        self.state.answer_text.clear();
        self.state.is_submitted = true;

        Some(PendingTurn {
            turn: self.current_turn,
            question: raw_input.to_string(),
        })
    }

    /// Apply the outcome of `pending`. Returns false if the ticket is stale.
    pub fn resolve(&mut self, pending: PendingTurn, outcome: Result<String, AnswerError>) -> bool {
        if pending.turn != self.current_turn {
            warn!(
                turn = pending.turn,
                current = self.current_turn,
                "Discarding answer for a superseded turn"
            );
            return false;
        }

        self.state.answer_text = match outcome {
            Ok(answer) => answer,
            Err(e) => {
                let kind = if e.is_transport() { "transport" } else { "payload" };
                error!(turn = pending.turn, kind, error = %e, "Error fetching answer");
                FALLBACK_ANSWER.to_string()
            }
        };
        self.state.is_pending = false;
        true
    }

    /// Run a whole turn for `raw_input`. Returns false when the submission was ignored.
    pub async fn submit(&mut self, raw_input: &str) -> bool {
        let Some(pending) = self.begin(raw_input) else {
            return false;
        };
        let outcome = self.service.ask(&pending.question).await;
        self.resolve(pending, outcome)
    }

    /// Submit whatever is currently in the input field.
    pub async fn submit_input(&mut self) -> bool {
        let input = self.state.question_text.clone();
        self.submit(&input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays canned outcomes in order and counts calls.
    struct ScriptedService {
        outcomes: Mutex<Vec<Result<String, AnswerError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(outcomes: Vec<Result<String, AnswerError>>) -> Arc<Self> {
            let mut outcomes = outcomes;
            outcomes.reverse();
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnswerService for ScriptedService {
        async fn ask(&self, _question: &str) -> Result<String, AnswerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(AnswerError::Payload("script exhausted".to_string())))
        }
    }

    #[test]
    fn test_new_controller_is_idle() {
        let controller = ChatTurnController::new(ScriptedService::new(vec![]));
        assert_eq!(controller.state(), &ChatTurn::default());
        assert_eq!(controller.state().phase(), TurnPhase::Idle);
    }

    #[tokio::test]
    async fn test_blank_submission_is_a_no_op() {
        let service = ScriptedService::new(vec![]);
        let mut controller = ChatTurnController::new(service.clone());
        controller.edit_input("   ");
        let before = controller.state().clone();

        assert!(!controller.submit("").await);
        assert!(!controller.submit(" \t\n ").await);
        assert!(!controller.submit_input().await);

        assert_eq!(controller.state(), &before);
        assert_eq!(service.calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let service = ScriptedService::new(vec![Ok("4".to_string())]);
        let mut controller = ChatTurnController::new(service.clone());

        assert!(controller.submit("What is 2+2?").await);

        let state = controller.state();
        assert_eq!(state.submitted_text, "What is 2+2?");
        assert_eq!(state.answer_text, "4");
        assert!(!state.is_pending);
        assert!(state.is_submitted);
        assert_eq!(state.phase(), TurnPhase::Answered);
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_turn_shows_fallback() {
        let service = ScriptedService::new(vec![Err(AnswerError::Payload("bad".to_string()))]);
        let mut controller = ChatTurnController::new(service);

        assert!(controller.submit("hello").await);
        assert_eq!(controller.state().answer_text, FALLBACK_ANSWER);
        assert!(!controller.state().is_pending);
    }

    #[test]
    fn test_begin_sets_pending_and_clears_previous_answer() {
        let mut controller = ChatTurnController::new(ScriptedService::new(vec![]));
        let first = controller.begin("A").unwrap();
        controller.resolve(first, Ok("answer A".to_string()));

        let second = controller.begin("B").unwrap();
        let state = controller.state();
        assert!(state.is_pending);
        assert_eq!(state.submitted_text, "B");
        assert_eq!(state.answer_text, "");
        assert_eq!(state.phase(), TurnPhase::Pending);
        assert_eq!(second.question, "B");
    }

    #[test]
    fn test_begin_while_pending_is_ignored() {
        let mut controller = ChatTurnController::new(ScriptedService::new(vec![]));
        let pending = controller.begin("first").unwrap();
        let snapshot = controller.state().clone();

        assert!(controller.begin("second").is_none());
        assert_eq!(controller.state(), &snapshot);

        assert!(controller.resolve(pending, Ok("done".to_string())));
        assert!(controller.begin("second").is_some());
    }

    #[test]
    fn test_stale_ticket_is_discarded() {
        let mut controller = ChatTurnController::new(ScriptedService::new(vec![]));
        let first = controller.begin("first").unwrap();
        let stale = PendingTurn {
            turn: first.turn,
            question: first.question.clone(),
        };
        controller.resolve(first, Ok("one".to_string()));
        let second = controller.begin("second").unwrap();

        assert!(!controller.resolve(stale, Ok("late".to_string())));
        assert!(controller.state().is_pending);
        assert_eq!(controller.state().answer_text, "");

        assert!(controller.resolve(second, Ok("two".to_string())));
        assert_eq!(controller.state().answer_text, "two");
    }

    #[tokio::test]
    async fn test_editing_after_resolution_keeps_turn() {
        let service = ScriptedService::new(vec![Ok("yes".to_string())]);
        let mut controller = ChatTurnController::new(service);
        controller.edit_input("is it?");
        controller.submit_input().await;

        controller.edit_input("something else entirely");
        let state = controller.state();
        assert_eq!(state.question_text, "something else entirely");
        assert_eq!(state.submitted_text, "is it?");
        assert_eq!(state.answer_text, "yes");
    }

    #[tokio::test]
    async fn test_submission_keeps_raw_input_untrimmed() {
        let service = ScriptedService::new(vec![Ok("ok".to_string())]);
        let mut controller = ChatTurnController::new(service);
        controller.submit("  padded  ").await;
        assert_eq!(controller.state().submitted_text, "  padded  ");
    }

    #[test]
    fn test_turn_serializes_with_snake_case_fields() {
        let json = serde_json::to_value(ChatTurn::default()).unwrap();
        assert_eq!(json["question_text"], "");
        assert_eq!(json["is_pending"], false);
        assert_eq!(serde_json::to_value(TurnPhase::Answered).unwrap(), "answered");
    }
}
