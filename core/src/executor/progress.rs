use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::phase::PhaseId;

use super::traits::{EngineEvent, EventSink};

/// Terminal progress display fed by engine events.
///
/// One overall bar for the run plus a spinner per running phase.
pub struct ProgressMonitor {
    multi: MultiProgress,
    overall: ProgressBar,
    phase_bars: Mutex<HashMap<PhaseId, ProgressBar>>,
    enabled: bool,
}

impl ProgressMonitor {
    /// `enabled = false` gives a monitor that draws nothing (JSONL output,
    /// non-tty stderr).
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self {
                multi: MultiProgress::new(),
                overall: ProgressBar::hidden(),
                phase_bars: Mutex::new(HashMap::new()),
                enabled: false,
            };
        }

        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} phases ({percent}%) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );
        overall.set_message("Starting...");

        Self {
            multi,
            overall,
            phase_bars: Mutex::new(HashMap::new()),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn add_phase(&self, id: PhaseId, title: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.set_message(format!("⏳ {}", title));
        bar.enable_steady_tick(Duration::from_millis(100));

        if let Ok(mut bars) = self.phase_bars.lock() {
            bars.insert(id, bar);
        }
    }

    fn finish_phase(&self, id: PhaseId, msg: String, count: bool) {
        if let Ok(mut bars) = self.phase_bars.lock() {
            if let Some(bar) = bars.remove(&id) {
                bar.finish_with_message(msg);
            }
        }
        if count {
            self.overall.inc(1);
        }
    }
}

impl EventSink for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn emit(&self, event: &EngineEvent) {
        if !self.enabled {
            return;
        }

        match event {
            EngineEvent::RunStart {
                mode, total_phases, ..
            } => {
                self.overall.set_length(*total_phases as u64);
                self.overall.set_position(0);
                self.overall.set_message(format!("{} run", mode));
            }
            EngineEvent::PhaseStart {
                phase_id, title, ..
            } => self.add_phase(*phase_id, title),
            EngineEvent::PhaseComplete {
                phase_id,
                title,
                duration,
                ..
            } => self.finish_phase(
                *phase_id,
                format!("✅ {} ({}ms)", title, duration.as_millis()),
                true,
            ),
            EngineEvent::PhaseFailed {
                phase_id,
                title,
                message,
                ..
            } => self.finish_phase(*phase_id, format!("❌ {}: {}", title, message), false),
            // `finish*` jumps the bar to its length; a failed run keeps its count.
            EngineEvent::RunEnd { summary, .. } => {
                if summary.success {
                    self.overall.finish_with_message("✅ All phases completed");
                } else {
                    self.overall.abandon_with_message(format!(
                        "❌ {} failed, {} pending",
                        summary.failed, summary.pending
                    ));
                }
            }
        }
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        if let Ok(mut bars) = self.phase_bars.lock() {
            for (_, bar) in bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
