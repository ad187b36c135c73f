//! opsrun CLI - run named operational tasks

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::Diagnostic;
use tracing_subscriber::EnvFilter;

use opsrun::error::exit_code;
use opsrun::util::jsonpath::value_to_text;
use opsrun::{parse_cli_params, OpsConfig, OpsError, Result, TaskRegistry, TaskResult, TaskRunner};

#[derive(Parser)]
#[command(name = "opsrun")]
#[command(about = "opsrun - run named operational tasks")]
#[command(version)]
struct Cli {
    /// Task file (default: config, OPSRUN_TASKS, then the built-in tasks)
    #[arg(long, global = true, value_name = "FILE")]
    tasks: Option<PathBuf>,

    /// Config file (default: ~/.config/opsrun/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log step execution to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task: opsrun run [--json] [--events FILE] <task> [--param value]...
    Run {
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,

        /// Write execution events as JSON Lines
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,

        /// Task name
        task: String,

        /// Task parameters as --name value
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "PARAMS")]
        params: Vec<String>,
    },

    /// List available tasks
    List,

    /// Show the parameters and steps of a task
    Show {
        /// Task name
        task: String,
    },

    /// Validate a task file (load only, nothing is run)
    Validate {
        /// Task file (default: the configured one)
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only task results
    let filter = if cli.verbose {
        EnvFilter::new("opsrun=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) => OpsConfig::from_file(path)?,
        None => OpsConfig::load()?,
    }
    .with_env()?;

    let tasks_file = cli.tasks.or_else(|| config.tasks_file.clone());

    match cli.command {
        Commands::Run {
            json,
            events,
            task,
            params,
        } => {
            let registry = load_registry(tasks_file.as_deref())?;
            run_task(registry, config, &task, &params, json, events.as_deref()).await
        }
        Commands::List => {
            list_tasks(&load_registry(tasks_file.as_deref())?);
            Ok(exit_code::SUCCESS)
        }
        Commands::Show { task } => {
            let registry = load_registry(tasks_file.as_deref())?;
            let runner = TaskRunner::new(Arc::new(registry)).with_tools(config.tools);
            show_task(&runner, &task)?;
            Ok(exit_code::SUCCESS)
        }
        Commands::Validate { file } => {
            let path = file.or(tasks_file);
            let registry = load_registry(path.as_deref())?;
            let name = path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "built-in".to_string());
            println!("{} Task file '{}' is valid", "✓".green(), name);
            println!("  Tasks: {}", registry.len());
            println!("  Tools: {}", registry.tools().len());
            Ok(exit_code::SUCCESS)
        }
    }
}

fn load_registry(path: Option<&Path>) -> Result<TaskRegistry> {
    match path {
        Some(path) => TaskRegistry::from_file(path),
        None => TaskRegistry::builtin(),
    }
}

async fn run_task(
    registry: TaskRegistry,
    config: OpsConfig,
    task: &str,
    raw_params: &[String],
    json: bool,
    events: Option<&Path>,
) -> Result<i32> {
    let params = parse_cli_params(raw_params)?;
    let runner = TaskRunner::new(Arc::new(registry))
        .with_default_timeout(config.default_timeout())
        .with_tools(config.tools);

    // Ctrl-C or SIGTERM kills the running step and stops the task
    let shutdown = shutdown_signal()?;
    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        shutdown.await;
        cancel.cancel();
    });

    let result = runner.run(task, &params).await?;

    if let Some(path) = events {
        runner.event_log().save_jsonl(path)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if let Some(output) = &result.output {
        println!("{}", value_to_text(output));
    }

    match result.error() {
        None => Ok(exit_code::SUCCESS),
        Some(e) => {
            print_failure(&result);
            report(&e);
            Ok(e.exit_code())
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM
///
/// The SIGTERM handler is registered before this returns, so a signal that
/// arrives while the first step is starting is not lost.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_err() {
                    terminate.recv().await;
                }
            }
            _ = terminate.recv() => {}
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
}

/// The step that ended the run, its exit code and captured stderr
fn print_failure(result: &TaskResult) {
    let Some(step) = result.aborting_failure() else {
        return;
    };
    let failure = step
        .failure
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    eprintln!("{} step '{}' failed: {}", "✗".red(), step.step_id.bold(), failure);
    if let Some(code) = step.exit_code {
        eprintln!("  exit code: {}", code);
    }
    let stderr = step.stderr.trim();
    if !stderr.is_empty() {
        eprintln!("  stderr:");
        for line in stderr.lines() {
            eprintln!("    {}", line.dimmed());
        }
    }
}

fn list_tasks(registry: &TaskRegistry) {
    let width = registry.tasks().map(|t| t.name.len()).max().unwrap_or(0);
    for task in registry.tasks() {
        println!(
            "{:<width$}  {}",
            task.name.cyan().bold(),
            task.description.as_deref().unwrap_or(""),
            width = width
        );
    }
}

fn show_task(runner: &TaskRunner, name: &str) -> Result<()> {
    let task = runner.registry().resolve(name)?;

    println!("{}", task.name.cyan().bold());
    if let Some(description) = &task.description {
        println!("  {}", description);
    }

    if !task.params.is_empty() {
        println!("\n{}", "Parameters:".bold());
        for param in &task.params {
            let requirement = match (&param.default, param.is_required()) {
                (Some(default), _) => format!("default: {}", default),
                (None, true) => "required".to_string(),
                (None, false) => "optional".to_string(),
            };
            println!("  --{:<20} {:<8} {}", param.name, param.kind, requirement.dimmed());
            if let Some(description) = &param.description {
                println!("    {}", description);
            }
        }
    }

    println!("\n{}", "Steps:".bold());
    for (i, step) in task.steps.iter().enumerate() {
        let (program, prefix) = runner.resolve_tool(&step.program);
        let args: Vec<&str> = prefix
            .iter()
            .chain(&step.args)
            .map(String::as_str)
            .collect();
        println!("  {}. {} → {} {}", i + 1, step.id.bold(), program, args.join(" "));
        if let Some(cwd) = &step.cwd {
            println!("     cwd: {}", cwd);
        }
        if let Some(query) = &step.query {
            println!("     query: {}", query);
        }
        if !step.abort_on_failure {
            println!("     {}", "continues on failure".yellow());
        }
    }
    Ok(())
}

fn report(e: &OpsError) {
    eprintln!("{} {}", "Error:".red().bold(), e);
    if let Some(help) = e.help() {
        eprintln!("  {} {}", "Fix:".yellow(), help);
    }
}
