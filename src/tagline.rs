//! Typewriter animation for the landing tagline.
//!
//! [`Typewriter`] is a pure frame-stepper; [`TaglineTicker`] drives one on a
//! tokio task for as long as the ticker is alive.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::constants::TAGLINES;

/// Per-character and pause timings, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypewriterTiming {
    pub type_speed_ms: u64,
    pub back_speed_ms: u64,
    pub back_delay_ms: u64,
    pub start_delay_ms: u64,
}

impl Default for TypewriterTiming {
    fn default() -> Self {
        Self {
            type_speed_ms: 100,
            back_speed_ms: 50,
            back_delay_ms: 1500,
            start_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Typing,
    Holding,
    Erasing,
}

#[derive(Debug, Clone)]
pub struct Typewriter {
    strings: Vec<String>,
    timing: TypewriterTiming,
    index: usize,
    shown: usize,
    stage: Stage,
}

impl Typewriter {
    pub fn new<S: Into<String>>(strings: impl IntoIterator<Item = S>, timing: TypewriterTiming) -> Self {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
            timing,
            index: 0,
            shown: 0,
            stage: Stage::Typing,
        }
    }

    pub fn landing() -> Self {
        Self::new(TAGLINES, TypewriterTiming::default())
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn timing(&self) -> TypewriterTiming {
        self.timing
    }

    /// Delay before the first frame.
    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.timing.start_delay_ms)
    }

    /// Text visible right now.
    pub fn visible(&self) -> &str {
        let Some(current) = self.strings.get(self.index) else {
            return "";
        };
        let end = current
            .char_indices()
            .nth(self.shown)
            .map(|(offset, _)| offset)
            .unwrap_or(current.len());
        &current[..end]
    }

    /// Advance one frame and return how long to wait before the next one.
    pub fn step(&mut self) -> Duration {
        let Some(current) = self.strings.get(self.index) else {
            return Duration::from_millis(self.timing.back_delay_ms);
        };
        let len = current.chars().count();

        match self.stage {
            Stage::Typing => {
                if self.shown < len {
                    self.shown += 1;
                }
                if self.shown >= len {
                    self.stage = Stage::Holding;
                    Duration::from_millis(self.timing.back_delay_ms)
                } else {
                    Duration::from_millis(self.timing.type_speed_ms)
                }
            }
            Stage::Holding | Stage::Erasing => {
                self.stage = Stage::Erasing;
                self.shown = self.shown.saturating_sub(1);
                if self.shown == 0 {
                    self.index = (self.index + 1) % self.strings.len();
                    self.stage = Stage::Typing;
                    Duration::from_millis(self.timing.type_speed_ms)
                } else {
                    Duration::from_millis(self.timing.back_speed_ms)
                }
            }
        }
    }
}

/// Runs a [`Typewriter`] in the background until dropped.
pub struct TaglineTicker {
    handle: JoinHandle<()>,
    frames: watch::Receiver<String>,
}

impl TaglineTicker {
    /// Must be called from within a tokio runtime.
    pub fn start(mut typewriter: Typewriter) -> Self {
        let (tx, frames) = watch::channel(String::new());
        let handle = tokio::spawn(async move {
            let mut delay = typewriter.start_delay();
            loop {
                tokio::time::sleep(delay).await;
                delay = typewriter.step();
                if tx.send(typewriter.visible().to_string()).is_err() {
                    break;
                }
            }
        });
        Self { handle, frames }
    }

    pub fn current(&self) -> String {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.frames.clone()
    }
}

impl Drop for TaglineTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
