use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use promptlog_contracts::events::RunEventLog;
use promptlog_engine::{
    CompletionProvider, DryrunProvider, InteractionRunner, OpenAiProvider, RunError, RunOptions,
    RunOutcome, Variant,
};

mod config;

use config::RuntimeConfig;

#[derive(Debug, Parser)]
#[command(
    name = "promptlog",
    version,
    about = "Run a prompt file against OpenAI and keep a per-prompt conversation log"
)]
struct Cli {
    /// Directory for answer files and conversation logs.
    #[arg(long, global = true, default_value = "log")]
    log_dir: PathBuf,
    #[arg(long, global = true, value_enum, default_value_t = ProviderKind::Openai)]
    provider: ProviderKind,
    /// Append JSONL run events to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    /// Log HTTP request and response bodies to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Openai,
    Dryrun,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate an image with DALL·E 3 from a prompt in a file.
    #[command(name = "dall-e-3")]
    DallE3 {
        #[command(subcommand)]
        action: ImageAction,
    },
    /// Send a prompt file to o1-preview.
    #[command(name = "o1-preview")]
    O1Preview {
        #[command(subcommand)]
        action: ChatAction,
    },
    /// Send a prompt file to a reasoning model with the developer preamble.
    Reasoning {
        #[command(subcommand)]
        action: ReasoningAction,
    },
}

#[derive(Debug, Subcommand)]
enum ImageAction {
    Execute(ImageExecuteArgs),
}

#[derive(Debug, Subcommand)]
enum ChatAction {
    Execute(ChatExecuteArgs),
}

#[derive(Debug, Subcommand)]
enum ReasoningAction {
    Execute(ReasoningExecuteArgs),
}

#[derive(Debug, Parser)]
struct ImageExecuteArgs {
    prompt_file: PathBuf,
    #[arg(long, value_enum, default_value_t = Size::Square)]
    size: Size,
    #[arg(long, value_enum, default_value_t = Quality::Standard)]
    quality: Quality,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct ChatExecuteArgs {
    prompt_file: PathBuf,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Parser)]
struct ReasoningExecuteArgs {
    prompt_file: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long, value_enum, default_value_t = ReasoningEffort::High)]
    reasoning_effort: ReasoningEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Size {
    #[value(name = "1024x1024")]
    Square,
    #[value(name = "1024x1792")]
    Portrait,
    #[value(name = "1792x1024")]
    Landscape,
}

impl Size {
    fn as_str(&self) -> &'static str {
        match self {
            Size::Square => "1024x1024",
            Size::Portrait => "1024x1792",
            Size::Landscape => "1792x1024",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Quality {
    Standard,
    Hd,
}

impl Quality {
    fn as_str(&self) -> &'static str {
        match self {
            Quality::Standard => "standard",
            Quality::Hd => "hd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    fn as_str(&self) -> &'static str {
        match self {
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

impl Command {
    fn into_run(self) -> (PathBuf, RunOptions) {
        match self {
            Command::DallE3 {
                action: ImageAction::Execute(args),
            } => {
                let mut options = RunOptions::new(Variant::DALL_E_3);
                options.model = args.model;
                options.size = Some(args.size.as_str().to_string());
                options.quality = Some(args.quality.as_str().to_string());
                (args.prompt_file, options)
            }
            Command::O1Preview {
                action: ChatAction::Execute(args),
            } => {
                let mut options = RunOptions::new(Variant::O1_PREVIEW);
                options.model = args.model;
                (args.prompt_file, options)
            }
            Command::Reasoning {
                action: ReasoningAction::Execute(args),
            } => {
                let mut options = RunOptions::new(Variant::REASONING);
                options.model = args.model;
                options.reasoning_effort = Some(args.reasoning_effort.as_str().to_string());
                (args.prompt_file, options)
            }
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("promptlog error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RuntimeConfig::from_env()?;
    let provider = build_provider(cli.provider, &config)?;
    let mut runner = InteractionRunner::new(provider, &cli.log_dir);
    if let Some(events) = &cli.events {
        runner = runner.with_events(RunEventLog::new(events));
    }

    let (prompt_file, options) = cli.command.into_run();
    log::info!(
        "running {} via {} into {}",
        prompt_file.display(),
        runner.provider_name(),
        runner.log_dir().display()
    );
    report(runner.execute(&prompt_file, &options))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();
}

/// Missing credentials are fatal at startup, before any prompt is read.
fn build_provider(
    kind: ProviderKind,
    config: &RuntimeConfig,
) -> Result<Box<dyn CompletionProvider>> {
    match kind {
        ProviderKind::Openai => {
            let api_key = config.require_api_key()?;
            Ok(Box::new(OpenAiProvider::new(
                api_key,
                &config.api_base,
                config.timeout,
            )?))
        }
        ProviderKind::Dryrun => Ok(Box::new(DryrunProvider)),
    }
}

fn report(result: Result<RunOutcome>) -> Result<i32> {
    match result {
        Ok(outcome) => {
            if let Some(note) = &outcome.model_note {
                eprintln!("Warning: {note}");
            }
            for line in outcome.summary_lines() {
                println!("{line}");
            }
            Ok(0)
        }
        Err(err) => match err.downcast_ref::<RunError>() {
            Some(run_err) => {
                println!("Error: {run_err}");
                Ok(1)
            }
            None => Err(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Context;
    use clap::Parser;
    use promptlog_engine::{DryrunProvider, InteractionRunner, RunError, RunOptions, Variant};

    use super::{build_provider, report, Cli, ProviderKind, RuntimeConfig};

    #[test]
    fn image_execute_parses_size_and_quality() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "promptlog",
            "dall-e-3",
            "execute",
            "prompts/dall-e-3-000000",
            "--size=1024x1792",
            "--quality=hd",
        ])?;
        assert_eq!(cli.log_dir, PathBuf::from("log"));
        assert_eq!(cli.provider, ProviderKind::Openai);

        let (path, options) = cli.command.into_run();
        assert_eq!(path, PathBuf::from("prompts/dall-e-3-000000"));
        assert_eq!(options.variant, Variant::DALL_E_3);
        assert_eq!(options.size.as_deref(), Some("1024x1792"));
        assert_eq!(options.quality.as_deref(), Some("hd"));
        Ok(())
    }

    #[test]
    fn reasoning_execute_defaults_to_high_effort() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "promptlog",
            "reasoning",
            "execute",
            "prompts/o1-000001",
            "--provider",
            "dryrun",
            "--log-dir",
            "out",
        ])?;
        assert_eq!(cli.provider, ProviderKind::Dryrun);
        assert_eq!(cli.log_dir, PathBuf::from("out"));

        let (_, options) = cli.command.into_run();
        assert_eq!(options.variant, Variant::REASONING);
        assert_eq!(options.reasoning_effort.as_deref(), Some("high"));
        assert_eq!(options.model, None);
        Ok(())
    }

    #[test]
    fn unknown_quality_is_rejected() {
        let parsed = Cli::try_parse_from([
            "promptlog",
            "dall-e-3",
            "execute",
            "prompt",
            "--quality",
            "ultra",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn unlisted_size_is_rejected() {
        let parsed = Cli::try_parse_from([
            "promptlog",
            "dall-e-3",
            "execute",
            "prompt",
            "--size",
            "512x512",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn successful_dryrun_exits_zero_with_two_log_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let prompt = temp.path().join("dall-e-3-000000");
        std::fs::write(&prompt, "a red boat at dusk\n")?;
        let log_dir = temp.path().join("log");
        let runner = InteractionRunner::new(Box::new(DryrunProvider), log_dir.clone());

        let code = report(runner.execute(&prompt, &RunOptions::new(Variant::DALL_E_3)))?;

        assert_eq!(code, 0);
        assert_eq!(std::fs::read_dir(&log_dir)?.count(), 2);
        Ok(())
    }

    #[test]
    fn openai_provider_without_token_is_missing_credential() -> anyhow::Result<()> {
        let config = RuntimeConfig::from_lookup(|_| None)?;
        let err = build_provider(ProviderKind::Openai, &config)
            .err()
            .context("expected a missing credential")?;
        assert!(matches!(
            err.downcast_ref::<RunError>(),
            Some(RunError::MissingCredential { var }) if var == "OPENAI_ACCESS_TOKEN"
        ));
        assert!(build_provider(ProviderKind::Dryrun, &config).is_ok());
        Ok(())
    }

    #[test]
    fn handled_failures_exit_one_and_others_propagate() {
        let handled = report(Err(RunError::NotFound {
            path: PathBuf::from("prompts/missing"),
        }
        .into()));
        assert_eq!(handled.ok(), Some(1));

        let fatal = report(Err(anyhow::anyhow!("connection reset")));
        assert!(fatal.is_err());
    }
}
