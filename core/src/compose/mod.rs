//! Input composers.
//!
//! A composer derives the text sent to the invoker for one phase from the
//! phase's prompt, the latest committed outputs of its dependencies and the
//! run's seed input. Composers are pure: same inputs, same text, no writes.

mod merge;

use serde::{Deserialize, Serialize};

use crate::phase::{Phase, PhaseGraph};

pub use merge::{merge_json_outputs, strip_code_fence};

/// Placeholder replaced by the seed input in root prompts.
pub const INITIAL_INPUT_PLACEHOLDER: &str = "{{initial_input}}";

/// Separator between file blocks in [`ComposerKind::FileListing`].
pub const FILE_BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Composer strategy, selected per phase at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComposerKind {
    /// Seed input substituted into the prompt template.
    Root,
    /// Dependency outputs, blank-line separated, then the prompt.
    #[default]
    Default,
    /// Dependency outputs parsed as JSON objects and shallow-merged.
    StructuredMerge,
    /// `File: <path>` blocks for file-producing dependencies.
    FileListing,
}

impl ComposerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Default => "default",
            Self::StructuredMerge => "structured-merge",
            Self::FileListing => "file-listing",
        }
    }
}

/// Compose the input for `phase` using its selected strategy.
pub fn compose(phase: &Phase, graph: &PhaseGraph, initial_input: &str) -> String {
    match phase.composer {
        ComposerKind::Root => compose_root(phase, initial_input),
        ComposerKind::Default => compose_default(phase, graph),
        ComposerKind::StructuredMerge => compose_structured_merge(phase, graph),
        ComposerKind::FileListing => compose_file_listing(phase, graph),
    }
}

pub fn compose_root(phase: &Phase, initial_input: &str) -> String {
    if phase.prompt.contains(INITIAL_INPUT_PLACEHOLDER) {
        return phase.prompt.replace(INITIAL_INPUT_PLACEHOLDER, initial_input);
    }
    format!("User Instruction: @@@{}@@@\n{}", initial_input, phase.prompt)
}

pub fn compose_default(phase: &Phase, graph: &PhaseGraph) -> String {
    let mut parts: Vec<&str> = dependency_outputs(phase, graph);
    parts.push(&phase.prompt);
    parts.join("\n\n")
}

pub fn compose_structured_merge(phase: &Phase, graph: &PhaseGraph) -> String {
    let merged = merge_json_outputs(dependency_outputs(phase, graph));
    format!("{}\n\n{}", merged, phase.prompt)
}

pub fn compose_file_listing(phase: &Phase, graph: &PhaseGraph) -> String {
    let blocks: Vec<String> = phase
        .dependencies
        .iter()
        .filter_map(|id| graph.get(*id))
        .filter_map(|dep| {
            dep.file_path
                .as_deref()
                .map(|path| format!("File: {}\n{}", path, dep.output))
        })
        .collect();

    format!("{}\n\n{}", blocks.join(FILE_BLOCK_SEPARATOR), phase.prompt)
}

/// Outputs of `phase`'s dependencies in declared order.
///
/// An id missing from the graph contributes an empty string.
fn dependency_outputs<'a>(phase: &Phase, graph: &'a PhaseGraph) -> Vec<&'a str> {
    phase
        .dependencies
        .iter()
        .map(|id| graph.get(*id).map(|p| p.output.as_str()).unwrap_or(""))
        .collect()
}
