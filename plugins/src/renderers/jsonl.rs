use chrono::Local;
use phaseforge_core::executor::{EngineEvent, EventSink};
use serde_json::{json, Value};

/// One JSON object per event on stdout.
pub struct JsonlRenderer {
    include_output: bool,
}

impl JsonlRenderer {
    pub fn new(include_output: bool) -> Self {
        Self { include_output }
    }

    fn event_to_json(&self, event: &EngineEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        let mut value = match event {
            EngineEvent::RunStart {
                run_id,
                mode,
                total_phases,
            } => json!({
                "run_id": run_id,
                "metadata": {
                    "mode": mode,
                    "total_phases": total_phases,
                }
            }),
            EngineEvent::PhaseStart {
                run_id,
                phase_id,
                title,
            } => json!({
                "run_id": run_id,
                "phase_id": phase_id,
                "metadata": { "title": title }
            }),
            EngineEvent::PhaseComplete {
                run_id,
                phase_id,
                title,
                duration,
                output,
                tokens_per_second,
            } => {
                let mut metadata = json!({
                    "title": title,
                    "duration_ms": duration.as_millis() as u64,
                    "output_chars": output.chars().count(),
                    "tokens_per_second": tokens_per_second,
                });
                if self.include_output {
                    metadata["output"] = json!(output);
                }
                json!({
                    "run_id": run_id,
                    "phase_id": phase_id,
                    "metadata": metadata,
                })
            }
            EngineEvent::PhaseFailed {
                run_id,
                phase_id,
                title,
                message,
            } => json!({
                "run_id": run_id,
                "phase_id": phase_id,
                "metadata": {
                    "title": title,
                    "error": message,
                }
            }),
            EngineEvent::RunEnd { run_id, summary } => json!({
                "run_id": run_id,
                "metadata": summary,
            }),
        };

        if let Some(obj) = value.as_object_mut() {
            obj.insert("v".into(), json!(1));
            obj.insert("event_type".into(), json!(event.kind()));
            obj.insert("ts".into(), json!(ts));
        }
        value
    }
}

impl EventSink for JsonlRenderer {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn emit(&self, event: &EngineEvent) {
        let value = self.event_to_json(event);
        match serde_json::to_string(&value) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("failed to serialize engine event: {}", e),
        }
    }
}
