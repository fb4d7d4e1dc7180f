use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use phaseforge_core::config::{AppConfig, InvokerConfig};
use phaseforge_core::executor::{EventSink, PhaseInvoker};

use crate::invoker::{CommandInvoker, EchoInvoker, HttpInvoker};
use crate::renderers::{JsonlRenderer, TextRenderer};

/// Timeout used when the selected model is not in the catalogue.
const FALLBACK_TIMEOUT_SECS: u64 = 600;

pub fn build_invoker(cfg: &AppConfig) -> Result<Arc<dyn PhaseInvoker>> {
    let model_timeout = Duration::from_secs(
        cfg.selected_model()
            .map(|m| m.timeout_secs)
            .unwrap_or(FALLBACK_TIMEOUT_SECS),
    );

    let invoker: Arc<dyn PhaseInvoker> = match &cfg.invoker {
        InvokerConfig::Http(http) => Arc::new(HttpInvoker::new(&http.endpoint, model_timeout)?),
        InvokerConfig::Command(cmd) => Arc::new(CommandInvoker::new(
            &cmd.program,
            cmd.args.clone(),
            Some(
                cmd.timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(model_timeout),
            ),
        )),
        InvokerConfig::Echo => Arc::new(EchoInvoker::new()),
    };

    tracing::debug!(invoker = invoker.name(), timeout_secs = model_timeout.as_secs(), "invoker ready");
    Ok(invoker)
}

pub fn build_renderer(format: &str, show_output: bool) -> Arc<dyn EventSink> {
    match format {
        "jsonl" => Arc::new(JsonlRenderer::new(show_output)),
        _ => Arc::new(TextRenderer::new(show_output)),
    }
}

/// Backend model name sent to the invoker for the configured model id.
pub fn resolve_model(cfg: &AppConfig) -> String {
    cfg.selected_model()
        .map(|m| m.backend_model().to_string())
        .unwrap_or_else(|| cfg.engine.model.clone())
}
