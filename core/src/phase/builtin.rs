//! Built-in registry for generating a CrewAI project.
//!
//! Prompts are referenced by file name and loaded with
//! [`PhaseRegistry::hydrate_prompts`].

use crate::compose::ComposerKind;
use crate::error::RegistryError;

use super::registry::{PhaseDefinition, PhaseRegistry};
use super::types::OutputType;

fn def(
    id: u32,
    title: &str,
    prompt_file: &str,
    depends_on: &[u32],
    composer: ComposerKind,
) -> PhaseDefinition {
    PhaseDefinition {
        id,
        title: title.to_string(),
        prompt: String::new(),
        prompt_file: Some(prompt_file.to_string()),
        depends_on: depends_on.to_vec(),
        composer,
        file_path: None,
        output_type: None,
    }
}

fn file(mut d: PhaseDefinition, path: &str, output_type: OutputType) -> PhaseDefinition {
    d.file_path = Some(path.to_string());
    d.output_type = Some(output_type);
    d
}

pub fn crew_generation_definitions() -> Vec<PhaseDefinition> {
    use ComposerKind::*;

    vec![
        def(1, "Blueprint Definition", "phase1_blueprint_prompt.md", &[], Root),
        def(
            2,
            "High-Level Architecture",
            "phase2.1_high_level_architecture_prompt.md",
            &[1],
            Default,
        ),
        def(
            3,
            "Detailed Agent and Task Definition",
            "phase2.2_detailed_agent_and_task_prompt.md",
            &[2],
            Default,
        ),
        def(4, "Tool Selection", "phase2.3_tool_selection_prompt.md", &[3], Default),
        def(
            5,
            "Custom Tool Generation",
            "phase2.4_custom_tool_generation_prompt.md",
            &[4],
            Default,
        ),
        file(
            def(6, "Agents.yaml Generation", "phase3_agents_prompt.md", &[2], StructuredMerge),
            "src/crewai_generated/config/agents.yaml",
            OutputType::File,
        ),
        file(
            def(7, "Tasks.yaml Generation", "phase3_tasks_prompt.md", &[2], StructuredMerge),
            "src/crewai_generated/config/tasks.yaml",
            OutputType::File,
        ),
        file(
            def(
                8,
                "Crew.py Generation",
                "phase3_crew_prompt.md",
                &[2, 3, 4, 5],
                StructuredMerge,
            ),
            "src/crewai_generated/crew.py",
            OutputType::File,
        ),
        file(
            def(9, "Main.py Generation", "phase3_main_prompt.md", &[8], Default),
            "src/crewai_generated/main.py",
            OutputType::File,
        ),
        file(
            def(10, "Tools Generation", "phase3_tools_prompt.md", &[5], StructuredMerge),
            "src/crewai_generated/tools",
            OutputType::Directory,
        ),
        file(
            def(
                11,
                "PyProject Generation",
                "phase3_pyproject_prompt.md",
                &[8, 9, 10],
                FileListing,
            ),
            "pyproject.toml",
            OutputType::File,
        ),
    ]
}

pub fn crew_generation() -> Result<PhaseRegistry, RegistryError> {
    PhaseRegistry::from_definitions(crew_generation_definitions())
}
