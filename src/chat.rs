// Terminal chat: landing banner with the animated tagline, then one turn per line.

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::answer_service::AnswerService;
use crate::chat_turn::ChatTurnController;
use crate::constants::{APP_TITLE, CHAT_HEADING, DEVELOPER};
use crate::tagline::{TaglineTicker, Typewriter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    About,
    Help,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        "" => Command::Empty,
        "/about" | "/info" => Command::About,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" | "/q" => Command::Quit,
        _ => Command::Ask(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

const HELP: &str = "Type a question and press Enter. Commands: /about, /help, /quit";

/// One question, one answer. `None` when the question was blank.
pub async fn ask_once(service: Arc<dyn AnswerService>, question: &str) -> Option<String> {
    let mut controller = ChatTurnController::new(service);
    controller.edit_input(question);
    if !controller.submit_input().await {
        return None;
    }
    Some(controller.state().answer_text.clone())
}

/// Read lines from `input` and run a turn for each, writing the transcript to `out`.
pub async fn run_chat_loop<R, W>(
    controller: &mut ChatTurnController,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(out, "{}", CHAT_HEADING)?;

    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::About => {
                writeln!(out, "{} - {}", DEVELOPER.name, DEVELOPER.role)?;
                writeln!(out, "{}", DEVELOPER.about)?;
                writeln!(out, "Built with {}", DEVELOPER.built_with)?;
            }
            Command::Ask(question) => {
                controller.edit_input(question);
                writeln!(out, "Thinking...")?;
                out.flush()?;
                if controller.submit_input().await {
                    let turn = controller.state();
                    writeln!(out, "You: {}", turn.submitted_text)?;
                    writeln!(out, "AI:  {}", turn.answer_text)?;
                } else {
                    debug!("Submission ignored");
                }
            }
        }
    }

    writeln!(out, "Bye!")?;
    Ok(())
}

/// Landing banner until Enter, then the chat loop on stdin/stdout.
pub async fn run_terminal_chat(service: Arc<dyn AnswerService>) -> Result<()> {
    info!("Starting interactive chat session...");
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    println!("{}", APP_TITLE);
    println!("Press Enter to get started (Ctrl-D to quit)");

    let mut line = String::new();
    {
        let ticker = TaglineTicker::start(Typewriter::landing());
        let mut frames = ticker.subscribe();
        let mut animating = true;
        loop {
            tokio::select! {
                changed = frames.changed(), if animating => {
                    if changed.is_err() {
                        animating = false;
                        continue;
                    }
                    let frame = frames.borrow_and_update().clone();
                    eprint!("\r\x1b[2K{}", frame);
                }
                read = stdin.read_line(&mut line) => {
                    eprint!("\r\x1b[2K");
                    if read.context("Failed to read input")? == 0 {
                        return Ok(());
                    }
                    break;
                }
            }
        }
    }

    let mut controller = ChatTurnController::new(service);
    run_chat_loop(&mut controller, stdin, &mut stdout).await?;
    info!("Chat session finished.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer_service::AnswerError;
    use crate::constants::FALLBACK_ANSWER;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl AnswerService for Echo {
        async fn ask(&self, question: &str) -> Result<String, AnswerError> {
            if question.contains("fail") {
                Err(AnswerError::Payload("no".to_string()))
            } else {
                Ok(format!("echo: {}", question))
            }
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("  "), Command::Empty);
        assert_eq!(parse_command("/quit"), Command::Quit);
        assert_eq!(parse_command(" /about "), Command::About);
        assert_eq!(parse_command("/help"), Command::Help);
        assert_eq!(parse_command("hi there\r"), Command::Ask("hi there".to_string()));
    }

    #[tokio::test]
    async fn test_ask_once() {
        assert_eq!(ask_once(Arc::new(Echo), "ping").await.as_deref(), Some("echo: ping"));
        assert_eq!(ask_once(Arc::new(Echo), "fail").await.as_deref(), Some(FALLBACK_ANSWER));
        assert_eq!(ask_once(Arc::new(Echo), "   ").await, None);
    }

    #[tokio::test]
    async fn test_chat_loop_transcript() {
        let mut controller = ChatTurnController::new(Arc::new(Echo));
        let input: &[u8] = b"first\n\n/about\nplease fail\n/quit\nnever asked\n";
        let mut out = Vec::new();

        run_chat_loop(&mut controller, input, &mut out).await.unwrap();

        let transcript = String::from_utf8(out).unwrap();
        assert!(transcript.contains("You: first"));
        assert!(transcript.contains("AI:  echo: first"));
        assert!(transcript.contains(DEVELOPER.role));
        assert!(transcript.contains(FALLBACK_ANSWER));
        assert!(!transcript.contains("never asked"));
        assert!(transcript.ends_with("Bye!\n"));
        assert_eq!(controller.state().submitted_text, "please fail");
    }

    #[tokio::test]
    async fn test_chat_loop_stops_at_end_of_input() {
        let mut controller = ChatTurnController::new(Arc::new(Echo));
        let input: &[u8] = b"only one";
        let mut out = Vec::new();

        run_chat_loop(&mut controller, input, &mut out).await.unwrap();
        assert_eq!(controller.state().answer_text, "echo: only one");
    }
}
