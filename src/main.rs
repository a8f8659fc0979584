//! Registrar CLI - generate artifacts from a content manifest

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use registrar::{
    FixSuggestion, FsSink, GenConfig, HostEvent, KindRegistry, RegistrarError, Side, Sides,
};

#[derive(Parser)]
#[command(name = "registrar")]
#[command(about = "Registrar - deferred registration and artifact generation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the manifest content and generate its artifacts
    Gen {
        /// Path to the generation config (.yaml)
        config: PathBuf,

        /// Override the output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Only generate client-side kinds
        #[arg(long, conflicts_with = "server_only")]
        client_only: bool,

        /// Only generate server-side kinds
        #[arg(long)]
        server_only: bool,

        /// Write the run's event log as JSON
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Validate the manifest and print the kind execution order
    Check {
        /// Path to the generation config (.yaml)
        config: PathBuf,
    },

    /// List the built-in artifact kinds
    Kinds,
}

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not present)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Gen {
            config,
            out,
            client_only,
            server_only,
            events,
        } => {
            let sides = match (client_only, server_only) {
                (true, _) => Some(Sides::client_only()),
                (_, true) => Some(Sides::server_only()),
                _ => None,
            };
            generate(&config, out, sides, events).await
        }
        Commands::Check { config } => check(&config),
        Commands::Kinds => {
            list_kinds();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<RegistrarError>()
            .and_then(|e| e.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> anyhow::Result<GenConfig> {
    let config = GenConfig::load(path)?.with_env();
    config.validate()?;
    Ok(config)
}

async fn generate(
    path: &Path,
    out: Option<PathBuf>,
    sides: Option<Sides>,
    events: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = load_config(path)?;
    if let Some(out) = out {
        config.output = out;
    }
    if let Some(sides) = sides {
        config.sides = sides;
    }

    let registrar = config.registrar()?;
    println!(
        "{} Registered {} entries in '{}'",
        "→".cyan(),
        registrar.registry().len(),
        registrar.namespace().cyan().bold()
    );

    // Host registration phase: construct everything, then client setup
    let failures = registrar.registry().materialize_all();
    if !failures.is_empty() {
        for failure in &failures {
            println!("  {} {}", "✗".red(), failure);
        }
        return Err(RegistrarError::RunFailed {
            count: failures.len(),
        }
        .into());
    }
    if registrar.dist() == Side::Client {
        registrar.host().fire(HostEvent::RegisterColors);
        registrar.host().fire(HostEvent::ClientSetup);
    }

    let pipeline = registrar.pipeline(&config.filter())?;
    let order: Vec<&str> = pipeline.order().iter().map(|k| k.id()).collect();
    println!("{} Running kinds: {}", "→".cyan(), order.join(" → "));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    let sink = Arc::new(FsSink::new(config.output.clone()));
    let outcome = pipeline.run_until_cancelled(sink, cancel).await;

    if let Some(events_path) = events {
        let json = serde_json::to_string_pretty(&pipeline.event_log().to_json())?;
        tokio::fs::write(&events_path, json).await?;
    }

    let report = outcome?;
    for failure in &report.failures {
        println!(
            "  {} {} [{}] {}",
            "✗".red(),
            failure.key,
            failure.kind,
            failure.error
        );
    }

    let status = format!(
        "{} written, {} skipped, {} failed",
        report.emitted.len(),
        report.skipped,
        report.failures.len()
    );
    if report.is_success() {
        println!(
            "{} {} ({:.1}s) → {}",
            "✓".green(),
            status,
            report.duration.as_secs_f32(),
            config.output.display()
        );
    } else {
        println!("{} {}", "✗".red(), status);
    }

    report.ensure_success()?;
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let registrar = config.registrar()?;
    let pipeline = registrar.pipeline(&config.filter())?;

    println!("{} Config '{}' is valid", "✓".green(), path.display());
    println!("  Namespace: {}", registrar.namespace());
    println!("  Entries: {}", registrar.registry().len());
    println!("  Producers: {}", pipeline.producer_count());
    for (index, level) in pipeline.levels().iter().enumerate() {
        let kinds: Vec<&str> = level.iter().map(|k| k.id()).collect();
        println!("  Level {}: {}", index, kinds.join(", "));
    }

    Ok(())
}

fn list_kinds() {
    for kind in KindRegistry::with_builtins().all() {
        println!("  {:<12} {}", kind.id(), kind.side().to_string().dimmed());
    }
}
