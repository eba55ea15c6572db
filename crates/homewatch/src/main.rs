//! `hwatch` - CLI for homewatch
//!
//! Runs the monitoring agent in the foreground and provides offline tools to
//! decrypt what it recorded.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{info, warn};

use homewatch::cli::{Cli, Command, ConfigCommand, DecryptCommand, RunCommand};
use homewatch::scheduler::CaptureScheduler;
use homewatch::store::{decrypt_keyword_log, decrypt_screenshot, list_partitions, ErrorLog};
use homewatch::{
    init_logging, platform, AgentPaths, CaptureOrchestrator, Config, DailyLogStore, KeyStore,
    OrchestratorSettings,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);

    match cli.command {
        Command::Run(cmd) => handle_run(&config_path, &cmd).await,
        Command::Decrypt(cmd) => handle_decrypt(&config_path, cmd),
        Command::Status(cmd) => handle_status(&config_path, cmd.json),
        Command::Config(cmd) => handle_config(&config_path, cmd),
    }
}

fn load_config(config_path: &Path) -> anyhow::Result<Config> {
    Config::load_from(Some(config_path.to_path_buf()))
        .with_context(|| format!("loading configuration from {}", config_path.display()))
}

async fn handle_run(config_path: &Path, cmd: &RunCommand) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let paths = config.resolve_paths();
    check_consent(&config, config_path, &paths)?;

    info!(
        platform = platform::platform_name(),
        log_directory = %paths.log_directory.display(),
        "Starting homewatch"
    );
    platform::init()?;

    let keys = match open_verified_key(&paths.key_file) {
        Ok(keys) => keys,
        Err(e) => {
            ErrorLog::new(&paths.error_log).log(&format!("Encryption key unusable: {e}"), true);
            return Err(e).context("loading encryption key");
        }
    };

    let store = Arc::new(DailyLogStore::new(
        &paths.log_directory,
        Arc::new(keys),
        &paths.error_log,
    ));

    let mut orchestrator = CaptureOrchestrator::new(
        Arc::clone(&store),
        config.filter_policy(),
        OrchestratorSettings::from_config(&config),
    )
    .with_active_window(platform::active_window());

    match platform::key_source() {
        Ok(source) => orchestrator = orchestrator.with_key_source(source),
        Err(e) => warn!(error = %e, "Keystroke capture unavailable"),
    }
    match platform::screen_capture() {
        Ok(screen) => orchestrator = orchestrator.with_screen_capture(screen),
        Err(e) => warn!(error = %e, "Screenshot capture unavailable"),
    }

    orchestrator.start().await?;

    match cmd.duration {
        Some(secs) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => result?,
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    info!("Shutting down");
    orchestrator.stop().await?;
    Ok(())
}

/// Refuse to monitor without recorded consent. The refusal is written to the
/// event log as CRITICAL.
fn check_consent(
    config: &Config,
    config_path: &Path,
    paths: &AgentPaths,
) -> homewatch::Result<()> {
    if let Err(e) = config.require_consent(config_path) {
        ErrorLog::new(&paths.error_log).log(&format!("EULA not accepted. {e}"), true);
        return Err(e);
    }
    Ok(())
}

fn open_verified_key(path: &Path) -> homewatch::Result<KeyStore> {
    let keys = KeyStore::open(path)?;
    keys.verify()?;
    Ok(keys)
}

fn resolve_key_path(config_path: &Path, key: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = match key {
        Some(path) => path,
        None => load_config(config_path)?.resolve_paths().key_file,
    };
    if !path.is_file() {
        bail!("key file not found: {}", path.display());
    }
    Ok(path)
}

fn handle_decrypt(config_path: &Path, cmd: DecryptCommand) -> anyhow::Result<()> {
    match cmd {
        DecryptCommand::Keywords { file, key } => {
            let keys = KeyStore::open(resolve_key_path(config_path, key)?)?;
            let lines = decrypt_keyword_log(&keys, &file)
                .with_context(|| format!("reading {}", file.display()))?;

            let total = lines.len();
            let mut failed = 0usize;
            for line in lines {
                match line.text {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        failed += 1;
                        eprintln!("line {}: {e}", line.line_number);
                    }
                }
            }

            if failed > 0 {
                bail!("{failed} of {total} lines could not be decrypted");
            }
        }
        DecryptCommand::Screenshot { file, output, key } => {
            let keys = KeyStore::open(resolve_key_path(config_path, key)?)?;
            let image = decrypt_screenshot(&keys, &file)
                .with_context(|| format!("decrypting {}", file.display()))?;
            std::fs::write(&output, image)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Decrypted screenshot saved to {}", output.display());
        }
    }
    Ok(())
}

fn handle_status(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let paths = config.resolve_paths();

    let key_fingerprint = if paths.key_file.is_file() {
        KeyStore::open(&paths.key_file).ok().map(|k| k.fingerprint())
    } else {
        None
    };
    let partitions = list_partitions(&paths.log_directory)?;
    let screenshot_backend = platform::screen_capture().ok().map(|c| c.name());
    let keystrokes_available = platform::key_source().is_ok();

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "consent_recorded": config.consent.eula_accepted,
            "paths": paths,
            "key_present": key_fingerprint.is_some(),
            "key_fingerprint": key_fingerprint,
            "partitions": partitions.len(),
            "latest_partition": partitions.last().map(ToString::to_string),
            "keystroke_capture": keystrokes_available,
            "screenshot_backend": screenshot_backend,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("hwatch status");
        println!("-------------");
        println!("Platform:      {}", platform::platform_name());
        println!("Consent:       {}", yes_no(config.consent.eula_accepted));
        println!("Log directory: {}", paths.log_directory.display());
        println!("Key file:      {}", paths.key_file.display());
        println!("Error log:     {}", paths.error_log.display());
        match &key_fingerprint {
            Some(fp) => println!("Key:           present ({fp})"),
            None => println!("Key:           not created yet"),
        }
        match partitions.last() {
            Some(latest) => println!("Partitions:    {} (latest {latest})", partitions.len()),
            None => println!("Partitions:    0"),
        }
        let keystrokes = if keystrokes_available {
            "available"
        } else {
            "unsupported"
        };
        println!("Keystrokes:    {keystrokes}");
        println!("Screenshots:   {}", screenshot_backend.unwrap_or("unsupported"));
    }
    Ok(())
}

fn handle_config(config_path: &Path, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let paths = config.resolve_paths();
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Log directory:      {}", paths.log_directory.display());
                println!("  Key file:           {}", paths.key_file.display());
                println!("  Error log:          {}", paths.error_log.display());
                println!();
                println!("[Capture]");
                println!("  Keystrokes:         {}", config.capture.keystrokes_enabled);
                println!("  Screenshots:        {}", config.capture.screenshots_enabled);
                println!(
                    "  Interval (minutes): {}",
                    config.capture.screenshot_interval_minutes
                );
                println!(
                    "  Buffer timeout (s): {}",
                    config.capture.buffer_timeout_seconds
                );
                println!("  Max word length:    {}", config.capture.max_word_length);
                println!();
                println!("[Filters]");
                println!(
                    "  Include processes:  {}",
                    config.filters.include_processes.join(", ")
                );
                println!(
                    "  Exclude words:      {} entries",
                    config.filters.exclude_words.len()
                );
                println!();
                println!("[Consent]");
                println!("  EULA accepted:      {}", config.consent.eula_accepted);
            }
        }
        ConfigCommand::Path => {
            println!("{}", config_path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(|| config_path.to_path_buf());
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(config) => {
                    println!("Configuration is valid.");
                    let scheduler =
                        CaptureScheduler::new(config.capture.screenshot_interval_minutes);
                    if let Err(e) = scheduler.interval() {
                        println!("Warning: {e}; screenshots will not run.");
                    }
                }
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
