//! CYOA sidecar entry point.
//!
//! Usage:
//!   cyoa run                  Serve host events over stdin/stdout
//!   cyoa init                 Write a default config file
//!   cyoa status               Show the current configuration
//!   cyoa load-preset <file>   Validate and store a preset document
//!   cyoa clear-preset         Remove the stored preset

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use async_trait::async_trait;
use cyoa::config;
use cyoa::engine::{Engine, OptionsSink};
use cyoa::preset;
use cyoa::types::{EngineOutput, HostEvent};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "cyoa")]
#[command(version = "0.1.0")]
#[command(about = "Choose-your-own-adventure option generator sidecar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the cyoa home directory (default ~/.cyoa).
    #[arg(long)]
    home: Option<String>,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve host events: JSON lines in on stdin, JSON lines out on stdout.
    Run,

    /// Write a default config file.
    Init,

    /// Show the current configuration.
    Status,

    /// Validate a preset document and store it in the config.
    LoadPreset {
        /// Path to the preset JSON file.
        file: PathBuf,
    },

    /// Remove the stored preset.
    ClearPreset,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the host protocol.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let home_dir = match &cli.home {
        Some(home) => PathBuf::from(shellexpand::tilde(home).into_owned()),
        None => config::default_home_dir(),
    };

    match cli.command {
        Commands::Run => cmd_run(&home_dir).await,
        Commands::Init => cmd_init(&home_dir),
        Commands::Status => cmd_status(&home_dir),
        Commands::LoadPreset { file } => cmd_load_preset(&home_dir, &file),
        Commands::ClearPreset => cmd_clear_preset(&home_dir),
    }
}

fn config_path(home_dir: &Path) -> PathBuf {
    home_dir.join("cyoa.toml")
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_run(home_dir: &Path) -> Result<()> {
    let config_path = config_path(home_dir);
    if !config_path.exists() {
        eprintln!(
            "{} No config found at {:?}. Run `cyoa init` first.",
            "Error:".red().bold(),
            config_path
        );
        std::process::exit(1);
    }

    let cfg = config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if !cfg.enabled {
        warn!("Option generation is disabled in the config; events will be ignored");
    }

    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel::<HostEvent>(32);

    // Feed stdin lines into the event channel.
    let reader_cancel = cancel.clone();
    let reader_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<HostEvent>(line) {
                            Ok(event) => {
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Ignoring malformed host event: {e}"),
                        }
                    }
                    Ok(None) => {
                        info!("Host closed stdin");
                        break;
                    }
                    Err(e) => {
                        error!("stdin read error: {e}");
                        break;
                    }
                },
                _ = reader_cancel.cancelled() => break,
            }
        }
    });

    let sink: Arc<dyn OptionsSink> = Arc::new(StdoutSink::new());
    let engine = Engine::new(cfg, sink);
    let engine_cancel = cancel.clone();
    let mut engine_handle = tokio::spawn(async move { engine.run(event_rx, engine_cancel).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
        }
        result = &mut engine_handle => {
            return result.context("Engine task panicked")?;
        }
    }

    cancel.cancel();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let _ = tokio::time::timeout(shutdown_timeout, async {
        if let Err(e) = reader_handle.await {
            warn!("Reader task join error: {e}");
        }
        if let Err(e) = engine_handle.await {
            warn!("Engine task join error: {e}");
        }
    })
    .await;

    Ok(())
}

fn cmd_init(home_dir: &Path) -> Result<()> {
    let config_path = config_path(home_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }

    config::save_config(&config::CyoaConfig::default(), &config_path)?;
    println!("Wrote default config to {}", config_path.display());
    println!("Set api_endpoint, api_key and enabled = true to activate generation.");
    Ok(())
}

fn cmd_status(home_dir: &Path) -> Result<()> {
    let cfg = config::load_config(&config_path(home_dir))?;

    let enabled = if cfg.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".yellow().to_string()
    };
    let endpoint = if cfg.api_endpoint.is_empty() {
        "(not set)".red().to_string()
    } else {
        cfg.api_endpoint.clone()
    };
    let key = if cfg.api_key.is_empty() {
        "(not set)".red().to_string()
    } else {
        "set".green().to_string()
    };

    println!();
    println!("{}", "=== CYOA Status ===".bold());
    println!();
    println!("  {}:       {}", "State".bold(), enabled);
    println!("  {}:    {}", "Endpoint".bold(), endpoint);
    println!("  {}:     {}", "API key".bold(), key);
    println!("  {}:       {}", "Model".bold(), cfg.model);
    println!();
    println!("  {}:", "Generation".bold());
    println!("    Options:         {}", cfg.number_of_options);
    println!("    Context length:  {}", cfg.context_length);
    println!("    Max tokens:      {}", cfg.max_tokens);
    println!("    Post-processing: {}", cfg.post_processing);
    println!("    Preserved tags:  {}", if cfg.preserved_tags.is_empty() {
        "(none)".to_string()
    } else {
        cfg.preserved_tags.clone()
    });
    println!();
    match &cfg.uploaded_preset {
        Some(preset) if cfg.use_preset => {
            println!(
                "  {}:      {} ({} prompts)",
                "Preset".bold(),
                preset.name,
                preset.prompts.len()
            );
        }
        Some(preset) => {
            println!(
                "  {}:      {} ({} prompts, not in use)",
                "Preset".bold(),
                preset.name,
                preset.prompts.len()
            );
        }
        None => println!("  {}:      none", "Preset".bold()),
    }
    println!();

    Ok(())
}

fn cmd_load_preset(home_dir: &Path, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read preset file {}", file.display()))?;

    let name = file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("preset");

    // A Format error leaves any previously stored preset untouched.
    let parsed = match preset::parse_preset(name, &raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let config_path = config_path(home_dir);
    let mut cfg = config::load_config(&config_path)?;
    let prompt_count = parsed.prompts.len();
    let preset_name = parsed.name.clone();
    cfg.uploaded_preset = Some(parsed);
    config::save_config(&cfg, &config_path)?;

    println!(
        "Loaded preset \"{}\" with {} prompts",
        preset_name, prompt_count
    );
    Ok(())
}

fn cmd_clear_preset(home_dir: &Path) -> Result<()> {
    let config_path = config_path(home_dir);
    let mut cfg = config::load_config(&config_path)?;
    cfg.uploaded_preset = None;
    config::save_config(&cfg, &config_path)?;
    println!("Preset cleared");
    Ok(())
}

// ---------------------------------------------------------------------------
// Stdout transport
// ---------------------------------------------------------------------------

/// Writes engine outputs to stdout, one JSON object per line.
struct StdoutSink {
    out: tokio::sync::Mutex<tokio::io::Stdout>,
}

impl StdoutSink {
    fn new() -> Self {
        Self {
            out: tokio::sync::Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl OptionsSink for StdoutSink {
    async fn emit(&self, output: EngineOutput) -> Result<()> {
        let mut line = serde_json::to_string(&output).context("Failed to encode engine output")?;
        line.push('\n');

        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .context("Failed to write to stdout")?;
        out.flush().await.context("Failed to flush stdout")?;
        Ok(())
    }
}
