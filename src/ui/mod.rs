//! Console reporting
//!
//! Provides a simple API for reporting pipeline state:
//! - Current phase (Loading, Extracting, Indexing, ...)
//! - Progress (current/total with a label) while charts render
//! - Log lines with stage counts

use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

/// Pipeline phases, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Extracting,
    Indexing,
    Validating,
    Writing,
    Rendering,
    Complete,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "Loading source dataset"),
            Phase::Extracting => write!(f, "Extracting mortality"),
            Phase::Indexing => write!(f, "Computing F/M index"),
            Phase::Validating => write!(f, "Validating against collapses"),
            Phase::Writing => write!(f, "Writing tables"),
            Phase::Rendering => write!(f, "Rendering charts"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

/// Trait for UI implementations - allows console and silent/test modes
pub trait Ui {
    fn set_phase(&mut self, phase: Phase);
    fn set_info(&mut self, info: impl Into<String>);
    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>);
    fn clear_progress(&mut self);
    fn log(&mut self, message: impl Into<String>);
}

/// Line-oriented console output with a progress bar for long phases
#[derive(Default)]
pub struct ConsoleUi {
    progress: Option<ProgressBar>,
}

impl ConsoleUi {
    pub fn new() -> Self {
        Self::default()
    }

    fn bar(&mut self, total: u64) -> &ProgressBar {
        self.progress.get_or_insert_with(|| {
            let bar = ProgressBar::new(total);
            let template = "{msg:30} [{bar:40.cyan/blue}] {pos}/{len}";
            match ProgressStyle::default_bar().template(template) {
                Ok(style) => bar.set_style(style.progress_chars("=>-")),
                Err(e) => debug!(error = %e, "progress template rejected"),
            }
            bar
        })
    }
}

impl Ui for ConsoleUi {
    fn set_phase(&mut self, phase: Phase) {
        println!("\n{}...", phase);
    }

    fn set_info(&mut self, info: impl Into<String>) {
        println!("  {}", info.into());
    }

    fn set_progress(&mut self, current: u64, total: u64, label: impl Into<String>) {
        let bar = self.bar(total);
        bar.set_length(total);
        bar.set_position(current);
        bar.set_message(label.into());
    }

    fn clear_progress(&mut self) {
        if let Some(bar) = self.progress.take() {
            bar.finish_and_clear();
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        match &self.progress {
            Some(bar) => bar.println(message),
            None => println!("{}", message),
        }
    }
}

/// Silent UI implementation for testing and `--quiet`
#[derive(Default)]
pub struct SilentUi;

impl SilentUi {
    pub fn new() -> Self {
        Self
    }
}

impl Ui for SilentUi {
    fn set_phase(&mut self, _phase: Phase) {}
    fn set_info(&mut self, _info: impl Into<String>) {}
    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}
    fn clear_progress(&mut self) {}
    fn log(&mut self, _message: impl Into<String>) {}
}

/// Records everything it is told; used by tests to check stage reporting
#[derive(Debug, Default)]
pub struct RecordingUi {
    pub phases: Vec<Phase>,
    pub lines: Vec<String>,
}

impl Ui for RecordingUi {
    fn set_phase(&mut self, phase: Phase) {
        self.phases.push(phase);
    }

    fn set_info(&mut self, info: impl Into<String>) {
        self.lines.push(info.into());
    }

    fn set_progress(&mut self, _current: u64, _total: u64, _label: impl Into<String>) {}

    fn clear_progress(&mut self) {}

    fn log(&mut self, message: impl Into<String>) {
        self.lines.push(message.into());
    }
}
