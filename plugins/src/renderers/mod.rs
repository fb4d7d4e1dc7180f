use std::sync::Arc;

use phaseforge_core::executor::{EngineEvent, EventSink};

mod jsonl;
mod text;

pub use jsonl::JsonlRenderer;
pub use text::TextRenderer;

/// Forwards every event to several sinks, in order.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    fn emit(&self, event: &EngineEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
