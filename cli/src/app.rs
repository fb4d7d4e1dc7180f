//! Command handlers: assemble config, registry, invoker and sinks, then hand
//! off to the engine.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncReadExt;

use phaseforge_core::config::{AppConfig, ExecutionMode};
use phaseforge_core::executor::ProgressMonitor;
use phaseforge_core::phase::builtin;
use phaseforge_core::{
    CancelSignal, CliError, EventSink, PhaseEngine, PhaseGraph, PhaseRegistry, RunReport,
};
use phaseforge_plugins::factory::{build_invoker, build_renderer, resolve_model};
use phaseforge_plugins::renderers::FanoutSink;

use crate::commands::cli::{ListArgs, OutputFormat, RunArgs};

#[tracing::instrument(name = "cli.run", skip_all)]
pub async fn run(args: RunArgs, mut cfg: AppConfig) -> Result<i32, CliError> {
    let input = read_input(&args).await?;
    if input.trim().is_empty() {
        return Err(CliError::Usage("input is empty".into()));
    }

    if let Some(model) = &args.model {
        cfg.engine.model = model.clone();
    }
    cfg.validate()?;

    let registry_path = args
        .registry
        .clone()
        .or_else(|| cfg.engine.registry.as_deref().map(PathBuf::from));
    let prompts_dir = args
        .prompts
        .clone()
        .or_else(|| cfg.engine.prompts_dir.as_deref().map(PathBuf::from));
    let registry = load_registry(registry_path.as_deref(), prompts_dir.as_deref())?;

    let invoker = build_invoker(&cfg).map_err(|e| CliError::Invoker(format!("{e:#}")))?;

    let progress_enabled =
        args.format == OutputFormat::Text && !args.no_progress && atty::is(atty::Stream::Stderr);
    let sinks: Vec<Arc<dyn EventSink>> = vec![
        build_renderer(args.format.as_str(), args.show_output),
        Arc::new(ProgressMonitor::new(progress_enabled)),
    ];

    let engine = PhaseEngine::builder(registry.into_graph(), invoker)
        .model(resolve_model(&cfg))
        .initial_input(input)
        .sink(Arc::new(FanoutSink::new(sinks)))
        .build();

    let cancel = CancelSignal::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, cancelling run...");
                cancel.request_cancel();
            }
        })
    };

    let parallel = args.parallel || cfg.engine.mode == ExecutionMode::Parallel;
    tracing::info!(
        parallel,
        model = %engine.model(),
        invoker = cfg.invoker.kind(),
        "starting run"
    );
    let report = if parallel {
        engine.run_parallel(&cancel).await
    } else {
        engine.run_sequential(&cancel).await
    };
    interrupt.abort();

    Ok(exit_code_for_report(&report?))
}

pub fn list(args: ListArgs, cfg: &AppConfig) -> Result<i32, CliError> {
    let path = args
        .registry
        .or_else(|| cfg.engine.registry.as_deref().map(PathBuf::from));
    let registry = load_registry(path.as_deref(), None)?;
    print!("{}", render_plan(&registry.into_graph()));
    Ok(0)
}

pub fn models(cfg: &AppConfig) -> i32 {
    print!("{}", render_models(cfg));
    0
}

async fn read_input(args: &RunArgs) -> Result<String, CliError> {
    if let Some(text) = &args.input {
        return Ok(text.clone());
    }
    if let Some(path) = &args.input_file {
        return Ok(tokio::fs::read_to_string(path).await?);
    }
    if args.stdin {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        return Ok(buf);
    }
    Err(CliError::Usage(
        "one of --input, --input-file or --stdin is required".into(),
    ))
}

/// Registry from `path`, or the built-in crew registry. Prompts are hydrated
/// from `prompts` when given.
pub fn load_registry(
    path: Option<&Path>,
    prompts: Option<&Path>,
) -> Result<PhaseRegistry, CliError> {
    let mut registry = match path {
        Some(p) => PhaseRegistry::load(p)?,
        None => builtin::crew_generation()?,
    };
    if let Some(dir) = prompts {
        registry.hydrate_prompts(dir);
    }
    Ok(registry)
}

pub fn exit_code_for_report(report: &RunReport) -> i32 {
    if report.success {
        0
    } else if report.was_cancelled() {
        130
    } else {
        1
    }
}

pub fn render_plan(graph: &PhaseGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Phases ({}):", graph.len());
    for phase in graph.iter() {
        let deps = if phase.dependencies.is_empty() {
            "-".to_string()
        } else {
            phase
                .dependencies
                .iter()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = write!(
            out,
            "  [{}] {}  deps: {}  composer: {}",
            phase.id,
            phase.title,
            deps,
            phase.composer.as_str()
        );
        if let Some(path) = &phase.file_path {
            let _ = write!(out, "  file: {}", path);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "\nExecution plan:");
    for (n, stage) in graph.stages().iter().enumerate() {
        let names: Vec<String> = stage
            .iter()
            .filter_map(|id| graph.get(*id))
            .map(|p| format!("[{}] {}", p.id, p.title))
            .collect();
        let _ = writeln!(out, "  Stage {}: {}", n + 1, names.join(", "));
    }
    out
}

pub fn render_models(cfg: &AppConfig) -> String {
    let mut out = String::new();
    for model in &cfg.models {
        let marker = if model.id == cfg.engine.model { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} {:<28} {} (backend: {}, timeout {}s)",
            marker,
            model.id,
            model.name,
            model.backend_model(),
            model.timeout_secs
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use phaseforge_core::config::InvokerConfig;
    use pretty_assertions::assert_eq;

    use super::*;

    const REGISTRY: &str = r#"
[[phase]]
id = 1
title = "Brief"
prompt = "Expand: {{initial_input}}"
composer = "root"

[[phase]]
id = 2
title = "Agents"
prompt = "List agents"
depends_on = [1]
"#;

    fn run_args(input: &str) -> RunArgs {
        RunArgs {
            parallel: false,
            input: Some(input.to_string()),
            input_file: None,
            stdin: false,
            registry: None,
            prompts: None,
            model: None,
            format: OutputFormat::Jsonl,
            no_progress: true,
            show_output: false,
        }
    }

    fn write_registry(dir: &Path) -> PathBuf {
        let path = dir.join("registry.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(REGISTRY.as_bytes()).unwrap();
        path
    }

    #[test]
    fn plan_lists_phases_and_stages() {
        let graph = PhaseRegistry::from_toml_str(REGISTRY, Path::new("inline"))
            .unwrap()
            .into_graph();
        let plan = render_plan(&graph);
        assert_eq!(
            plan,
            "Phases (2):\n  [1] Brief  deps: -  composer: root\n  [2] Agents  deps: 1  composer: default\n\nExecution plan:\n  Stage 1: [1] Brief\n  Stage 2: [2] Agents\n"
        );
    }

    #[test]
    fn models_marks_selected_entry() {
        let mut cfg = AppConfig::default();
        cfg.engine.model = "minimax-m2".into();
        let rendered = render_models(&cfg);
        let selected: Vec<&str> = rendered.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(selected.len(), 1);
        assert!(selected[0].contains("minimax-m2"));
        assert!(selected[0].contains("backend: MiniMax-M2"));
    }

    #[test]
    fn prompts_directory_overrides_inline_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let registry_path = dir.path().join("registry.toml");
        std::fs::write(
            &registry_path,
            "[[phase]]\nid = 1\ntitle = \"Only\"\nprompt = \"inline\"\nprompt_file = \"only.md\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("only.md"), "from file").unwrap();

        let registry = load_registry(Some(&registry_path), Some(dir.path())).unwrap();
        assert_eq!(registry.phases()[0].prompt, "from file");
    }

    #[test]
    fn missing_registry_file_is_a_config_error() {
        let err = load_registry(Some(Path::new("/nonexistent/registry.toml")), None).unwrap_err();
        assert_eq!(err.exit_code(), 11);
    }

    #[tokio::test]
    async fn echo_run_completes_with_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = run_args("a research crew");
        args.registry = Some(write_registry(dir.path()));

        let mut cfg = AppConfig::default();
        cfg.invoker = InvokerConfig::Echo;

        assert_eq!(run(args, cfg).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_input_is_rejected() {
        let err = run(run_args("   "), AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, CliError::Usage(_)));
    }

    #[tokio::test]
    async fn unknown_model_override_fails_validation() {
        let mut args = run_args("x");
        args.model = Some("no-such-model".into());
        let err = run(args, AppConfig::default()).await.unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[tokio::test]
    async fn input_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.txt");
        std::fs::write(&path, "from a file").unwrap();
        let mut args = run_args("unused");
        args.input = None;
        args.input_file = Some(path);
        assert_eq!(read_input(&args).await.unwrap(), "from a file");
    }
}
