use std::path::PathBuf;

use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Jsonl => "jsonl",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "phaseforge", version, about = "Run dependency-ordered LLM generation phases")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the default lookup.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(ClapArgs, Debug, Clone)]
#[command(group(ArgGroup::new("seed").required(true).args(["input", "input_file", "stdin"])))]
pub struct RunArgs {
    /// Run independent phases concurrently (overrides `engine.mode`).
    #[arg(long)]
    pub parallel: bool,

    /// Seed instruction for the root phases.
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Read the seed instruction from stdin.
    #[arg(long)]
    pub stdin: bool,

    /// Registry TOML with `[[phase]]` tables; the built-in registry otherwise.
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Directory holding prompt files.
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Model id from the catalogue (see `phaseforge models`).
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long)]
    pub no_progress: bool,

    /// Print each phase's output as it completes.
    #[arg(long)]
    pub show_output: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ListArgs {
    #[arg(long)]
    pub registry: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the phase graph.
    Run(RunArgs),
    /// Show phases, dependencies and the execution plan.
    List(ListArgs),
    /// Show the model catalogue.
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_exactly_one_input() {
        assert!(Args::try_parse_from(["phaseforge", "run"]).is_err());
        assert!(Args::try_parse_from([
            "phaseforge",
            "run",
            "--input",
            "x",
            "--stdin"
        ])
        .is_err());

        let args = Args::try_parse_from([
            "phaseforge",
            "run",
            "--parallel",
            "--input",
            "a travel agent crew",
            "--format",
            "jsonl",
        ])
        .unwrap();
        match args.command {
            Commands::Run(run) => {
                assert!(run.parallel);
                assert_eq!(run.input.as_deref(), Some("a travel agent crew"));
                assert_eq!(run.format, OutputFormat::Jsonl);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn run_accepts_each_input_source() {
        let args = Args::try_parse_from(["phaseforge", "run", "--input", "a crew"]).unwrap();
        assert!(matches!(args.command, Commands::Run(ref run) if run.input.as_deref() == Some("a crew")));

        let args = Args::try_parse_from(["phaseforge", "run", "--stdin"]).unwrap();
        assert!(matches!(args.command, Commands::Run(ref run) if run.stdin));

        let args =
            Args::try_parse_from(["phaseforge", "run", "--input-file", "seed.txt"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Run(ref run) if run.input_file == Some(PathBuf::from("seed.txt"))
        ));
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn config_flag_is_global() {
        let args =
            Args::try_parse_from(["phaseforge", "models", "--config", "/tmp/pf.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/pf.toml")));
    }
}
