// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Drover main entry point - CLI and subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::Level;

use drover::config::DroverConfig;
use drover::discovery::{agents, CapabilityCache};
use drover::exec::{AgentRunner, OutputSource, TokioRunner};
use drover::telemetry::{init_telemetry, TelemetryConfig};
use drover::types::RunRequest;

/// Drover - delegate job nodes to an external CLI coding agent.
#[derive(Parser)]
#[command(name = "drover")]
#[command(author, version, about = "Delegate work to a CLI coding agent", long_about = None)]
struct Cli {
    /// Show verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show debug output
    #[arg(long)]
    debug: bool,

    /// Suppress the agent's streamed output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for drover.
#[derive(Subcommand)]
enum Commands {
    /// Delegate one task to the agent and stream its output
    Run {
        /// Task text for the agent
        task: String,

        /// Working directory for the run
        #[arg(short = 'C', long, default_value = ".")]
        cwd: PathBuf,

        /// Model identifier to request
        #[arg(short, long, env = "DROVER_MODEL")]
        model: Option<String>,

        /// Session identifier to resume
        #[arg(short, long)]
        resume: Option<String>,

        /// Maximum agent turns
        #[arg(long)]
        max_turns: Option<u32>,

        /// Timeout in milliseconds (0 = unbounded)
        #[arg(short, long, default_value_t = 0)]
        timeout: u64,

        /// Additional directories the agent may access
        #[arg(long = "add-dir")]
        add_dirs: Vec<PathBuf>,

        /// URLs the agent may fetch
        #[arg(long = "allow-url")]
        allow_urls: Vec<String>,

        /// Skip writing the per-job instructions file
        #[arg(long)]
        no_instructions: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the models the installed agent CLI supports
    Models {
        /// Bypass the discovery cache
        #[arg(long)]
        refresh: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List installed agent plugins
    Plugins,

    /// List custom agent definitions found on disk
    Agents,

    /// Check whether the agent CLI is installed and responsive
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };
    let _guard = init_telemetry(&TelemetryConfig::default().with_level(level))?;

    let config = DroverConfig::from_env();

    match cli.command {
        Commands::Run {
            task,
            cwd,
            model,
            resume,
            max_turns,
            timeout,
            add_dirs,
            allow_urls,
            no_instructions,
            json,
        } => {
            let cwd = cwd.canonicalize().unwrap_or(cwd);
            let mut request = RunRequest::new(cwd, task).with_timeout_ms(timeout);
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(resume) = resume {
                request = request.with_resume_session(resume);
            }
            if let Some(turns) = max_turns {
                request = request.with_max_turns(turns);
            }
            if !add_dirs.is_empty() {
                request = request.with_allowed_folders(add_dirs);
            }
            if !allow_urls.is_empty() {
                request = request.with_allowed_urls(allow_urls);
            }
            if no_instructions {
                request = request.without_instructions_file();
            }

            let mut runner = AgentRunner::new(config);
            if !cli.quiet {
                runner = runner.with_output_callback(Arc::new(|source, line| match source {
                    OutputSource::Stdout => println!("{line}"),
                    OutputSource::Stderr => eprintln!("{}", line.dimmed()),
                }));
            }

            let result = runner.run(&request).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_run_result(&result);
            }
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Models { refresh, json } => {
            let cache = CapabilityCache::new(config, Arc::new(TokioRunner));
            let discovered = if refresh {
                cache.refresh_models().await?
            } else {
                cache.discover_models().await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&discovered)?);
            } else {
                println!("{}", "Available models".bright_blue().bold());
                for model in &discovered.models {
                    println!(
                        "  {} {:?}/{} ({:?})",
                        model.id.bold(),
                        model.vendor,
                        model.family,
                        model.tier
                    );
                }
            }
        }

        Commands::Plugins => {
            let cache = CapabilityCache::new(config, Arc::new(TokioRunner));
            let plugins = cache.list_plugins().await?;
            if plugins.is_empty() {
                println!("No plugins installed.");
            } else {
                for plugin in plugins {
                    match plugin.source {
                        Some(source) => println!("{} ({})", plugin.name.bold(), source.dimmed()),
                        None => println!("{}", plugin.name.bold()),
                    }
                }
            }
        }

        Commands::Agents => {
            let repo_root = std::env::current_dir()?;
            let found = agents::discover_custom_agents(&repo_root);
            if found.is_empty() {
                println!("No custom agents found.");
            } else {
                for agent in found {
                    println!("{} ({})", agent.name.bold(), agent.path.display());
                }
            }
        }

        Commands::Doctor => {
            let agent_binary = config.agent_binary.clone();
            let cache = CapabilityCache::new(config, Arc::new(TokioRunner));
            let available = cache.check_cli_available().await;
            if available {
                println!("{} agent CLI `{}` responds", "ok".green().bold(), agent_binary);
            } else {
                println!(
                    "{} agent CLI `{}` not detected",
                    "fail".red().bold(),
                    agent_binary
                );
                std::process::exit(1);
            }

            match cache.discover_models().await {
                Ok(discovered) => println!(
                    "{} {} models declared",
                    "ok".green().bold(),
                    discovered.models.len()
                ),
                Err(e) => println!("{} model discovery: {e}", "warn".yellow().bold()),
            }

            match cache.list_plugins().await {
                Ok(plugins) => {
                    println!("{} {} plugins installed", "ok".green().bold(), plugins.len())
                }
                Err(e) => println!("{} plugin listing: {e}", "warn".yellow().bold()),
            }
        }
    }

    Ok(())
}

fn print_run_result(result: &drover::types::RunResult) {
    if result.success {
        println!("{}", "Run succeeded".green().bold());
    } else {
        println!("{}", "Run failed".red().bold());
        if let Some(error) = &result.error {
            println!("  {error}");
        }
    }
    if let Some(session) = &result.session_id {
        println!("  session: {session}");
    }
    if let Some(metrics) = &result.metrics {
        if metrics.premium_requests > 0.0 {
            println!("  premium requests: {}", metrics.premium_requests);
        }
        if let Some(tokens) = &metrics.tokens {
            println!(
                "  tokens: {} in, {} out",
                tokens.input_tokens, tokens.output_tokens
            );
        }
        if metrics.lines_added > 0 || metrics.lines_removed > 0 {
            println!(
                "  code changes: +{} -{}",
                metrics.lines_added, metrics.lines_removed
            );
        }
    }
}
