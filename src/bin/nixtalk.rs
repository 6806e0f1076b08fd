/*!
 * nixtalk CLI
 *
 * Ask for package-management tasks in plain language. Commands are built
 * from fixed templates, checked, and run in a sandbox (or simulated with
 * --mock). Logs go to stderr, controlled by NIXTALK_LOG.
 */

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use nixtalk_core::{ExecutorMode, NixTalkConfig, Pipeline, ProcessResult, RequestContext};

#[derive(Parser)]
#[command(name = "nixtalk")]
#[command(about = "Talk to Nix in plain language", long_about = None)]
struct Cli {
    /// Simulate commands instead of running them
    #[arg(long, global = true)]
    mock: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Command timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one request
    Ask {
        /// What you want, e.g. "search firefox"
        #[arg(required = true)]
        text: Vec<String>,

        /// Print the full result as JSON
        #[arg(short, long)]
        json: bool,

        /// Session identifier for logs
        #[arg(long)]
        session: Option<String>,
    },

    /// Show the intent and command a request maps to, without running it
    Explain {
        #[arg(required = true)]
        text: Vec<String>,

        #[arg(short, long)]
        json: bool,
    },

    /// Read requests line by line from stdin
    Repl {
        /// One JSON result per line
        #[arg(short, long)]
        json: bool,
    },

    /// List the command templates
    Templates {
        #[arg(short, long)]
        json: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NIXTALK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(config_path: Option<&Path>, mock: bool, timeout: Option<u64>) -> Result<Pipeline> {
    let mut config = match config_path {
        Some(path) => NixTalkConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => NixTalkConfig::default(),
    };
    if mock {
        config.executor.mode = ExecutorMode::Mock;
    }
    if let Some(secs) = timeout {
        anyhow::ensure!(secs > 0, "--timeout must be positive");
        config.executor.timeout_secs = secs;
    }
    Pipeline::from_config(&config).context("building pipeline")
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let Cli {
        mock,
        config,
        timeout,
        command,
    } = cli;
    let pipeline = || build_pipeline(config.as_deref(), mock, timeout);

    match command {
        Commands::Version => {
            println!("nixtalk v{}", env!("CARGO_PKG_VERSION"));
            println!("Natural-language front end for Nix");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Ask {
            text,
            json,
            session,
        } => {
            let context = RequestContext {
                session_id: session,
                previous_command: None,
            };
            let result = pipeline()?.process(&text.join(" "), Some(&context)).await;
            print_result(&result, json)?;
            Ok(exit_code(&result))
        }
        Commands::Explain { text, json } => {
            let explanation = match pipeline()?.explain(&text.join(" ")) {
                Ok(explanation) => explanation,
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    return Ok(ExitCode::FAILURE);
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&explanation)?);
            } else {
                println!(
                    "intent:     {} ({:.2})",
                    explanation.intent.kind, explanation.intent.confidence
                );
                for entity in &explanation.intent.entities {
                    println!("{:<11} {}", format!("{}:", entity.kind.as_str()), entity.value);
                }
                match &explanation.command {
                    Some(command) => println!("command:    {}", command.raw),
                    None => println!("command:    (needs clarification)"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Repl { json } => {
            repl(&pipeline()?, json).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Templates { json } => {
            let pipeline = pipeline()?;
            let templates = pipeline.templates().list();
            if json {
                println!("{}", serde_json::to_string_pretty(&templates)?);
            } else {
                for template in templates {
                    let argument = if template.requires_argument {
                        format!(" <{}>", template.argument_kind.as_str())
                    } else {
                        String::new()
                    };
                    let options = if template.allowed_options.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", template.allowed_options.join(" "))
                    };
                    println!(
                        "{:<16} {}{}{}",
                        template.intent.as_str(),
                        template.base,
                        argument,
                        options
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn repl(pipeline: &Pipeline, json: bool) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut context = RequestContext {
        session_id: Some(Uuid::new_v4().to_string()),
        previous_command: None,
    };

    loop {
        if interactive {
            stdout.write_all(b"nixtalk> ").await?;
            stdout.flush().await?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        let result = pipeline.process(line, Some(&context)).await;
        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            print_result(&result, false)?;
        }
        if result.command.is_some() {
            context.previous_command = result.command;
        }
    }

    Ok(())
}

fn print_result(result: &ProcessResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("{}", result.message);
    if let Some(suggestions) = &result.suggestions {
        println!("Try:");
        for suggestion in suggestions {
            println!("  - {}", suggestion);
        }
    }
    Ok(())
}

fn exit_code(result: &ProcessResult) -> ExitCode {
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
