use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use phaseforge_core::executor::{InvokeOutcome, InvokeRequest, InvokeResult, PhaseInvoker};

/// Calls a generation service over HTTP.
///
/// The service receives the composed prompt and answers with
/// `{ "output": ..., "duration": <seconds> }`, or a non-2xx status with
/// `{ "error": ... }`.
pub struct HttpInvoker {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    llm_model: &'a str,
    mode: &'static str,
    run_phase: u32,
    full_prompt: &'a str,
    file_path: Option<&'a str>,
    output_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    output: String,
    /// Seconds, as reported by the service.
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    tokens_per_second: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpInvoker {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, request: &InvokeRequest) -> InvokeOutcome {
        let payload = GenerateRequest {
            llm_model: &request.model,
            mode: "advanced",
            run_phase: request.phase_id.0,
            full_prompt: &request.composed_input,
            file_path: request.file_path.as_deref(),
            output_type: request.output_type.map(|t| t.as_str()),
        };

        let started = Instant::now();
        let resp = match self.client.post(&self.endpoint).json(&payload).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return InvokeOutcome::failure(format!("generation request timed out: {}", e))
            }
            Err(e) => return InvokeOutcome::failure(format!("generation request failed: {}", e)),
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => return InvokeOutcome::failure(format!("failed to read response: {}", e)),
        };

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("API request failed with status {}", status.as_u16()));
            return InvokeOutcome::Failure { message };
        }

        let parsed: GenerateResponse = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) => return InvokeOutcome::failure(format!("invalid response body: {}", e)),
        };

        let duration = parsed
            .duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or_else(|| started.elapsed());

        InvokeOutcome::Success(InvokeResult {
            output: parsed.output,
            duration,
            tokens_per_second: parsed.tokens_per_second,
        })
    }
}

#[async_trait]
impl PhaseInvoker for HttpInvoker {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: InvokeRequest) -> InvokeOutcome {
        tracing::debug!(
            endpoint = %self.endpoint,
            phase = %request.phase_id,
            model = %request.model,
            prompt_chars = request.composed_input.len(),
            "sending generation request"
        );
        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => InvokeOutcome::Aborted,
            outcome = self.call(&request) => outcome,
        }
    }
}
