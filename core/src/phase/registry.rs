use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::compose::ComposerKind;
use crate::error::RegistryError;

use super::graph::PhaseGraph;
use super::types::{OutputType, Phase, PhaseId};

/// Declarative description of one phase, as written in a registry file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDefinition {
    pub id: u32,
    pub title: String,

    /// Inline prompt text. Overridden by `prompt_file` after hydration.
    #[serde(default)]
    pub prompt: String,

    /// Prompt file name, resolved against the prompt directory.
    #[serde(default)]
    pub prompt_file: Option<String>,

    #[serde(default)]
    pub depends_on: Vec<u32>,

    #[serde(default)]
    pub composer: ComposerKind,

    #[serde(default)]
    pub file_path: Option<String>,

    #[serde(default)]
    pub output_type: Option<OutputType>,
}

impl PhaseDefinition {
    fn into_phase(self) -> Phase {
        let mut phase = Phase::new(self.id, self.title)
            .with_prompt(self.prompt)
            .with_dependencies(self.depends_on)
            .with_composer(self.composer);
        phase.file_path = self.file_path;
        phase.output_type = self.output_type;
        phase.prompt_file_name = self.prompt_file;
        phase
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    phase: Vec<PhaseDefinition>,
}

/// Validated, ordered phase list.
///
/// Construction guarantees that every dependency names an earlier-registered
/// phase, so registration order is a topological order and the graph is
/// acyclic. Nothing downstream re-checks this.
#[derive(Debug, Clone)]
pub struct PhaseRegistry {
    phases: Vec<Phase>,
}

impl PhaseRegistry {
    pub fn from_phases(phases: Vec<Phase>) -> Result<Self, RegistryError> {
        validate(&phases)?;
        Ok(Self { phases })
    }

    pub fn from_definitions(defs: Vec<PhaseDefinition>) -> Result<Self, RegistryError> {
        Self::from_phases(defs.into_iter().map(PhaseDefinition::into_phase).collect())
    }

    /// Parse a registry from TOML text with `[[phase]]` tables.
    pub fn from_toml_str(s: &str, origin: &Path) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(s).map_err(|source| RegistryError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        Self::from_definitions(file.phase)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let s = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s, path)
    }

    /// Load each phase's `prompt_file_name` from `dir` into both `prompt` and
    /// `default_prompt`.
    ///
    /// Missing files are logged and leave the inline prompt untouched.
    /// Returns the number of prompts loaded.
    pub fn hydrate_prompts(&mut self, dir: &Path) -> usize {
        let mut loaded = 0;
        for phase in &mut self.phases {
            let Some(name) = phase.prompt_file_name.as_deref() else {
                continue;
            };
            let path: PathBuf = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    phase.default_prompt = text.clone();
                    phase.prompt = text;
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        phase = %phase.id,
                        path = %path.display(),
                        "prompt file not loaded: {}",
                        e
                    );
                }
            }
        }
        tracing::debug!(loaded, dir = %dir.display(), "hydrated phase prompts");
        loaded
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    pub fn into_graph(self) -> PhaseGraph {
        PhaseGraph::from_phases(self.phases)
    }

    pub fn graph(&self) -> PhaseGraph {
        PhaseGraph::from_phases(self.phases.clone())
    }
}

fn validate(phases: &[Phase]) -> Result<(), RegistryError> {
    if phases.is_empty() {
        return Err(RegistryError::Empty);
    }

    let all: HashSet<PhaseId> = phases.iter().map(|p| p.id).collect();
    let mut seen: HashSet<PhaseId> = HashSet::with_capacity(phases.len());

    for phase in phases {
        if seen.contains(&phase.id) {
            return Err(RegistryError::DuplicatePhaseId(phase.id));
        }

        let mut deps = HashSet::with_capacity(phase.dependencies.len());
        for dep in &phase.dependencies {
            if *dep == phase.id {
                return Err(RegistryError::SelfDependency(phase.id));
            }
            if !deps.insert(*dep) {
                return Err(RegistryError::RepeatedDependency {
                    phase: phase.id,
                    dependency: *dep,
                });
            }
            if !all.contains(dep) {
                return Err(RegistryError::DependencyNotFound {
                    phase: phase.id,
                    missing: *dep,
                });
            }
            if !seen.contains(dep) {
                return Err(RegistryError::DependencyOutOfOrder {
                    phase: phase.id,
                    dependency: *dep,
                });
            }
        }

        seen.insert(phase.id);
    }

    Ok(())
}
