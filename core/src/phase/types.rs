use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compose::ComposerKind;

/// Stable phase identifier, unique within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(pub u32);

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PhaseId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Per-run lifecycle of a phase.
///
/// `Completed` and `Failed` are terminal for a single run; a new run resets
/// every phase back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseStatus {
    /// Whether the engine may move a phase from `self` to `next` within one run.
    ///
    /// `Pending -> Failed` is allowed for phases rejected before invocation
    /// (unmet dependency).
    pub fn can_transition_to(self, next: PhaseStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a file-producing phase writes, consumed by external persistence only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    File,
    Directory,
}

impl OutputType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// One unit of dependency-ordered generation work.
///
/// Dependencies are plain ids resolved against the owning [`PhaseGraph`];
/// a phase never embeds another phase's state.
///
/// [`PhaseGraph`]: crate::phase::PhaseGraph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub title: String,
    pub prompt: String,
    pub default_prompt: String,
    pub input: String,
    pub output: String,
    pub status: PhaseStatus,
    #[serde(default, with = "duration_secs")]
    pub duration: Option<Duration>,
    pub dependencies: Vec<PhaseId>,
    pub composer: ComposerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_type: Option<OutputType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

impl Phase {
    pub fn new(id: impl Into<PhaseId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            prompt: String::new(),
            default_prompt: String::new(),
            input: String::new(),
            output: String::new(),
            status: PhaseStatus::Pending,
            duration: None,
            dependencies: Vec::new(),
            composer: ComposerKind::Default,
            file_path: None,
            output_type: None,
            prompt_file_name: None,
            error: None,
            tokens_per_second: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.default_prompt = prompt.clone();
        self.prompt = prompt;
        self
    }

    pub fn with_dependencies<I, D>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<PhaseId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_composer(mut self, composer: ComposerKind) -> Self {
        self.composer = composer;
        self
    }

    pub fn with_file(mut self, path: impl Into<String>, output_type: OutputType) -> Self {
        self.file_path = Some(path.into());
        self.output_type = Some(output_type);
        self
    }

    /// Clear every per-run field, keeping identity, prompts and edges.
    pub fn reset(&self) -> Self {
        Self {
            input: String::new(),
            output: String::new(),
            status: PhaseStatus::Pending,
            duration: None,
            error: None,
            tokens_per_second: None,
            ..self.clone()
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(d)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_run_lifecycle() {
        assert!(PhaseStatus::Pending.can_transition_to(PhaseStatus::Running));
        assert!(PhaseStatus::Pending.can_transition_to(PhaseStatus::Failed));
        assert!(PhaseStatus::Running.can_transition_to(PhaseStatus::Completed));
        assert!(!PhaseStatus::Pending.can_transition_to(PhaseStatus::Completed));
        assert!(!PhaseStatus::Completed.can_transition_to(PhaseStatus::Running));
        assert!(!PhaseStatus::Failed.can_transition_to(PhaseStatus::Pending));
    }

    #[test]
    fn reset_keeps_identity_and_prompt() {
        let mut phase = Phase::new(3, "Crew")
            .with_prompt("write crew.py")
            .with_dependencies([1u32, 2]);
        phase.output = "code".into();
        phase.status = PhaseStatus::Failed;
        phase.error = Some("boom".into());
        phase.duration = Some(Duration::from_millis(1500));

        let fresh = phase.reset();
        assert_eq!(fresh.id, PhaseId(3));
        assert_eq!(fresh.prompt, "write crew.py");
        assert_eq!(fresh.dependencies, vec![PhaseId(1), PhaseId(2)]);
        assert_eq!(fresh.status, PhaseStatus::Pending);
        assert!(fresh.output.is_empty());
        assert!(fresh.error.is_none());
        assert!(fresh.duration.is_none());
    }

    #[test]
    fn duration_serializes_as_seconds() {
        let mut phase = Phase::new(1, "Blueprint");
        phase.duration = Some(Duration::from_millis(2500));
        let v = serde_json::to_value(&phase).unwrap();
        assert_eq!(v["duration"], serde_json::json!(2.5));
        assert_eq!(v["status"], "pending");
    }
}
