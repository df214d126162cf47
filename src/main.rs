//! Binary entrypoint for the meshmon CLI.
//!
//! Commands:
//! - `init` - write a default configuration file to edit
//! - `walk` - crawl the whole mesh from the configured root node and write
//!   the map artifact
//! - `monitor` - run the link-quality monitor until interrupted
//!
//! Both commands exit non-zero when the configuration disables them or the
//! mesh is unreachable from the configured root; the monitor otherwise logs
//! problems and keeps ticking.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use meshmon::config::Config;
use meshmon::lqm::LqmService;
use meshmon::walker::{output, Walker};

#[derive(Parser)]
#[command(name = "meshmon")]
#[command(about = "Crawler and link-quality monitor for AREDN-compatible meshes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Walk the mesh and write the map artifact
    Walk,
    /// Run the link-quality monitor
    Monitor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging; Init writes the default later.
    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            if Path::new(&cli.config).exists() {
                bail!("refusing to overwrite existing config at {}", cli.config);
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
        }
        Commands::Walk => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            if !config.walker.enabled {
                bail!("walker is not enabled in the configuration");
            }

            let walker = Arc::new(Walker::new(
                config.walker.timeout(),
                config.walker.retries,
                config.walker.jitter(),
            ));

            info!("starting walk from {}", config.node.name);
            let mut responses = walker.clone().walk(&config.node.name).await?;

            let summary = output::write_artifact(
                &walker,
                &mut responses,
                Path::new(&config.walker.output_path),
            )
            .await?;

            info!(
                "finished walking: scraped={} mapped={} unmapped={}",
                summary.hosts_scraped,
                summary.completed.saturating_sub(summary.non_mapped),
                summary.non_mapped
            );
        }
        Commands::Monitor => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            if !config.lqm.enabled {
                bail!("lqm is not enabled in the configuration");
            }

            let service = LqmService::new(Arc::new(config));
            info!("starting link-quality monitor");

            let runner = service.clone();
            tokio::select! {
                _ = async move { runner.start().await } => {
                    warn!("link-quality monitor exited");
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("interrupt received, stopping monitor");
                    service.stop().await;
                }
            }
        }
    }

    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();

    // CLI verbosity overrides the configured level.
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|cfg| cfg.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config.as_ref().and_then(|cfg| cfg.logging.file.clone());
    if let Some(ref file) = log_file {
        if let Ok(f) = std::fs::OpenOptions::new().create(true).append(true).open(file) {
            let sink = std::sync::Arc::new(std::sync::Mutex::new(f));
            // When stdout is not a terminal (service mode) the console copy
            // is suppressed to avoid duplicate lines in journal captures.
            let is_tty = atty::is(atty::Stream::Stdout);

            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = sink.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        } else {
            builder.format(|fmt, record| {
                writeln!(
                    fmt,
                    "{} [{}] {}",
                    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                    record.level(),
                    record.args()
                )
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
