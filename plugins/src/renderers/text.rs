use phaseforge_core::executor::{EngineEvent, EventSink};

/// Line-oriented human output on stdout.
pub struct TextRenderer {
    show_output: bool,
}

impl TextRenderer {
    /// With `show_output`, each completed phase's output is printed after
    /// its status line.
    pub fn new(show_output: bool) -> Self {
        Self { show_output }
    }

    fn format_event(&self, event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::RunStart {
                run_id,
                mode,
                total_phases,
            } => Some(format!(
                "RUN START {} ({} mode, {} phases)",
                run_id, mode, total_phases
            )),
            // Progress bars cover starts; keep the log to results.
            EngineEvent::PhaseStart { .. } => None,
            EngineEvent::PhaseComplete {
                phase_id,
                title,
                duration,
                output,
                tokens_per_second,
                ..
            } => {
                let mut line = format!(
                    "PHASE OK   [{}] {} ({:.2}s",
                    phase_id,
                    title,
                    duration.as_secs_f64()
                );
                if let Some(tps) = tokens_per_second {
                    line.push_str(&format!(", {:.1} tok/s", tps));
                }
                line.push(')');
                if self.show_output && !output.is_empty() {
                    line.push('\n');
                    line.push_str(output.trim_end());
                }
                Some(line)
            }
            EngineEvent::PhaseFailed {
                phase_id,
                title,
                message,
                ..
            } => Some(format!("PHASE FAIL [{}] {}: {}", phase_id, title, message)),
            EngineEvent::RunEnd { run_id, summary } => {
                let mut line = format!(
                    "RUN END {} (completed {}/{}, failed {}, pending {}, {}ms)",
                    run_id,
                    summary.completed,
                    summary.total,
                    summary.failed,
                    summary.pending,
                    summary.elapsed_ms
                );
                if let Some(err) = &summary.error {
                    line.push_str(&format!("\nERROR: {}", err));
                }
                Some(line)
            }
        }
    }
}

impl EventSink for TextRenderer {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn emit(&self, event: &EngineEvent) {
        if let Some(line) = self.format_event(event) {
            println!("{}", line);
        }
    }
}
