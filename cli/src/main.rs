//! CLI entrypoint for devgate
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use devgate_application::{
    CheckpointScheduler, ConsultationProgress, EvaluateInput, NoProgress, Outcome,
    WorkflowRepository,
};
use devgate_domain::{CheckpointLabel, WorkflowInstance};
use devgate_infrastructure::{
    ConfigLoader, FileConfig, FilePromptSource, GateSetup, JsonWorkflowStore,
    JsonlConversationLogger, LauncherTransport,
};
use devgate_presentation::{
    Cli, Command, OutputFormatter, ProgressReporter, SimpleProgress, formatter_for,
};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

type Scheduler = CheckpointScheduler<LauncherTransport>;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };
    if let Some(dir) = &cli.state_dir {
        config.workflow.state_dir = dir.clone();
    }

    let _guard = init_logging(cli.verbose, &config);
    info!("Starting devgate");

    if !config.output.color {
        colored::control::set_override(false);
    }
    let format = cli
        .output
        .map(Into::into)
        .or(config.output.format)
        .unwrap_or_default();
    let formatter = formatter_for(format);

    if let Command::Config { validate } = &cli.command {
        return Ok(show_config(&cli, &config, *validate, formatter.as_ref()));
    }

    let labels = match &cli.command {
        Command::Start {
            checkpoints: Some(list),
            ..
        } => Some(CheckpointLabel::parse_list(list)?),
        _ => None,
    };
    let setup = config.resolve(labels.as_deref())?;
    for warning in &setup.warnings {
        warn!("{}", warning);
    }

    // === Dependency Injection ===
    let scheduler = build_scheduler(&config, &setup);
    let store = JsonWorkflowStore::new(&setup.state_dir);

    let show_progress = !cli.quiet && config.output.progress;
    let progress: Box<dyn ConsultationProgress> = if !show_progress {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    match cli.command {
        Command::Start { force, .. } => {
            if let Some(snapshot) = store.load().await?
                && !snapshot.instance.is_closed()
                && !force
            {
                bail!(
                    "Workflow {} is still {}; finish or abort it first, or pass --force",
                    snapshot.instance.id(),
                    snapshot.instance.status()
                );
            }
            let instance = scheduler.create_instance(setup.plan)?;
            scheduler.save(&store, &instance).await?;
            println!("{}", formatter.format_status(&instance, &[]));
            Ok(ExitCode::SUCCESS)
        }

        Command::Check {
            label,
            revision,
            changed_lines,
            context,
            skip,
        } => {
            let mut instance = scheduler.load(&store).await?;
            let outcome = if skip {
                scheduler.skip(&mut instance, label, changed_lines, revision)?
            } else {
                if !launcher_available(&setup) {
                    warn!(
                        "Launcher '{}' not found on PATH; consultations will fail",
                        setup.launcher.command
                    );
                }
                let mut input = EvaluateInput::new(label);
                if let Some(revision) = revision {
                    input = input.at_revision(revision);
                }
                if let Some(lines) = changed_lines {
                    input = input.with_changed_lines(lines);
                }
                if let Some(source) = context {
                    input = input.with_context(read_context(&source, false)?);
                }

                let cancel = cancel_on_ctrl_c();
                scheduler
                    .evaluate_with_progress(&mut instance, input, progress.as_ref(), &cancel)
                    .await?
            };
            scheduler.save(&store, &instance).await?;
            println!("{}", formatter.format_outcome(&outcome));
            Ok(exit_code(&outcome))
        }

        Command::Consult { role, context } => {
            let instance = scheduler.load(&store).await?;
            let context = match context {
                Some(source) => read_context(&source, true)?,
                None => String::new(),
            };
            let cancel = cancel_on_ctrl_c();
            let consultation = scheduler
                .consult_out_of_band(&instance, &role, &context, progress.as_ref(), &cancel)
                .await?;
            scheduler.save(&store, &instance).await?;
            println!("{}", formatter.format_consultation(&consultation));
            Ok(if consultation.outcome().is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Status => {
            let instance = scheduler.load(&store).await?;
            let handles = scheduler.sessions().handles_for(instance.id());
            println!("{}", formatter.format_status(&instance, &handles));
            Ok(ExitCode::SUCCESS)
        }

        Command::Abort { reason, discard } => {
            let mut instance = scheduler.load(&store).await?;
            let outcome = scheduler.abort(&mut instance, &reason)?;
            if discard {
                store.clear().await?;
            } else {
                scheduler.save(&store, &instance).await?;
            }
            println!("{}", formatter.format_outcome(&outcome));
            Ok(exit_code(&outcome))
        }

        Command::ResetSession { role } => {
            let instance = scheduler.load(&store).await?;
            let reset = scheduler.reset_session(&instance, &role, "reset by operator")?;
            scheduler.save(&store, &instance).await?;
            if reset {
                println!("Conversation with {} reset; the next consultation starts afresh", role);
            } else {
                println!("No conversation with {} to reset", role);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Finish => {
            let instance = scheduler.load(&store).await?;
            if !instance.is_closed() {
                bail!(
                    "Workflow {} is still {}; abort it first to discard it",
                    instance.id(),
                    instance.status()
                );
            }
            finish(&store, &instance).await?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Config { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// Console diagnostics on stderr, plus a daily rolling file when enabled.
///
/// `RUST_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8, config: &FileConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    });

    let (file_layer, guard) = if config.logging.file {
        let appender =
            tracing_appender::rolling::daily(config.workflow.state_dir.join("logs"), "devgate.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    guard
}

fn build_scheduler(config: &FileConfig, setup: &GateSetup) -> Scheduler {
    let transport = Arc::new(LauncherTransport::new(setup.launcher.clone()));

    let mut prompt_dirs = setup.prompt_dirs.clone();
    prompt_dirs.extend(ConfigLoader::global_prompt_dir());
    let prompts = Arc::new(FilePromptSource::new(prompt_dirs));

    let scheduler = CheckpointScheduler::new(
        transport,
        Arc::new(setup.registry.clone()),
        prompts,
        setup.params.clone(),
    );

    if !config.logging.audit {
        return scheduler;
    }
    match JsonlConversationLogger::new(audit_log_path(&setup.state_dir)) {
        Some(logger) => scheduler.with_logger(Arc::new(logger)),
        None => scheduler,
    }
}

fn launcher_available(setup: &GateSetup) -> bool {
    LauncherTransport::new(setup.launcher.clone()).is_available()
}

fn audit_log_path(state_dir: &Path) -> PathBuf {
    state_dir.join("audit.jsonl")
}

/// Ctrl-C cancels the running consultations and aborts the workflow
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; aborting the workflow");
            token.cancel();
        }
    });
    cancel
}

/// Read `--context`: "-" is stdin, an existing path is read from disk, and
/// anything else is literal text when `literal` is allowed.
fn read_context(source: &str, literal: bool) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read context from stdin")?;
        return Ok(buf);
    }
    let path = Path::new(source);
    if path.is_file() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read context file {}", path.display()));
    }
    if literal {
        return Ok(source.to_string());
    }
    bail!("Context file {} not found", path.display())
}

async fn finish(store: &dyn WorkflowRepository, instance: &WorkflowInstance) -> Result<()> {
    store.clear().await?;
    println!("Workflow {} ({}) discarded", instance.id(), instance.status());
    Ok(())
}

fn show_config(
    cli: &Cli,
    config: &FileConfig,
    validate: bool,
    formatter: &dyn OutputFormatter,
) -> ExitCode {
    if !validate {
        for line in ConfigLoader::describe_sources(cli.config.as_ref()) {
            println!("{}", line);
        }
        println!();
        println!("State directory: {}", config.workflow.state_dir.display());
        println!("Launcher:        {}", config.transport.command);
        println!(
            "Roles:           {}",
            config.roles.keys().cloned().collect::<Vec<_>>().join(", ")
        );
        return ExitCode::SUCCESS;
    }

    let issues = config.validate();
    println!("{}", formatter.format_issues(&issues));
    if issues.iter().any(|i| i.is_error()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// 0 advanced or completed, 2 held, 3 aborted
fn exit_code(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Advanced { .. } | Outcome::Completed { .. } => ExitCode::SUCCESS,
        Outcome::Held { .. } => ExitCode::from(2),
        Outcome::Aborted { .. } => ExitCode::from(3),
    }
}
