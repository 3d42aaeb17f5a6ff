mod cli;

use std::path::Path;

use abr_core::config::SessionConfig;
use abr_core::MediaSrc;
use abr_session::{replay, DashProviderLoader, Trace};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    // Logs go to stderr so replay output stays machine readable.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "abr_session=trace,abr_engine=debug,abr_tracks=debug,abr_core=debug".to_string()
        } else {
            "abr_session=warn,abr_engine=warn,abr_tracks=warn,abr_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check {
            src,
            mime_type,
            provider,
        } => check_source(src, mime_type, provider),
        Commands::Replay {
            trace,
            report,
            user_agent,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(replay_trace(&trace, cli.config.as_deref(), user_agent.as_deref(), report))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("abr-session {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn check_source(src: String, mime_type: Option<String>, provider: Option<String>) -> Result<()> {
    let mut source = MediaSrc::url(src);
    if let Some(mime_type) = mime_type {
        source = source.with_type(mime_type);
    }
    if let Some(provider) = provider {
        source = source.with_provider(provider);
    }

    let loader = DashProviderLoader::new();
    if loader.can_play(&source) {
        println!("dash: yes");
    } else if !loader.supported() {
        println!("dash: no (environment unsupported)");
    } else {
        println!("dash: no");
    }
    Ok(())
}

async fn replay_trace(
    path: &Path,
    config_path: Option<&Path>,
    user_agent: Option<&str>,
    full_report: bool,
) -> Result<()> {
    let mut config = SessionConfig::load_or_default(config_path);
    if let Some(user_agent) = user_agent {
        config = config.with_user_agent(user_agent);
    }
    let trace = Trace::load(path)?;
    tracing::info!(steps = trace.steps.len(), "replaying {}", path.display());

    let report = replay(&trace, config).await?;

    if full_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for event in &report.events {
            println!("{}", serde_json::to_string(event)?);
        }
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)?;
            let config = SessionConfig::from_json(&contents)?;
            let warnings = config.validate();
            println!("✓ Configuration is valid");
            println!("  Library: {}", config.library.url);
            println!("  Namespace: {}", config.library.namespace);
            println!("  Quality switch: {:?}", config.playback.quality_switch);
            println!("  Cue cache: {}", config.cues.capacity);
            for warning in &warnings {
                println!("  warning: {warning}");
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = SessionConfig::default();
            println!("Default config:");
            println!("  Library: {}", config.library.url);
        }
    }

    Ok(())
}
