//! `vidlens` command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use page_cdp::CdpBrowser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vidlens::{MessageBridge, Settings, VidLens};
use vidlens_core_types::ControlCommand;

#[derive(Parser)]
#[command(name = "vidlens", version, about = "Video surface discovery and control")]
struct Cli {
    /// Path to a config file (TOML, YAML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset; overrides the config file's
    /// `log_level`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TargetArgs {
    /// Page url to open in a fresh tab.
    #[arg(long, conflicts_with = "attach")]
    url: Option<String>,

    /// Attach to the first existing tab instead of opening one.
    #[arg(long)]
    attach: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verb {
    Play,
    Pause,
    Seek,
    SetRate,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach, resolve the primary video and print its snapshot.
    Inspect(TargetArgs),
    /// Send one control verb and print the outcome.
    Control {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long, value_enum)]
        verb: Verb,
        /// Seek position in seconds.
        #[arg(long)]
        time: Option<f64>,
        /// Playback rate.
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Stream binding transitions until interrupted.
    Watch {
        #[command(flatten)]
        target: TargetArgs,
        /// Stop after this many seconds instead of running forever.
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&settings.effective_log_level(cli.log_level.as_deref()));
    let result = match cli.command {
        Commands::Inspect(target) => cmd_inspect(&settings, target).await,
        Commands::Control {
            target,
            verb,
            time,
            rate,
        } => cmd_control(&settings, target, verb, time, rate).await,
        Commands::Watch { target, duration } => cmd_watch(&settings, target, duration).await,
    };

    if let Err(err) = result {
        error!(target: "vidlens", error = %err, "command failed");
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn attach(settings: &Settings, target: &TargetArgs) -> Result<(CdpBrowser, Arc<VidLens>)> {
    let browser = match &settings.browser.ws_url {
        Some(ws) => CdpBrowser::connect(ws).await?,
        None => CdpBrowser::launch().await?,
    };
    let page = if target.attach {
        browser.first_page().await?
    } else {
        let url = target
            .url
            .as_deref()
            .context("either --url or --attach is required")?;
        browser.open(url).await?
    };
    let lens = VidLens::attach(Arc::new(page), settings.binding_center());
    Ok((browser, Arc::new(lens)))
}

async fn cmd_inspect(settings: &Settings, target: TargetArgs) -> Result<()> {
    let (browser, lens) = attach(settings, &target).await?;
    let bridge = MessageBridge::new(Arc::clone(&lens));
    let response = bridge
        .handle(serde_json::json!({"type": "getCurrentVideo"}))
        .await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    browser.close().await;
    Ok(())
}

async fn cmd_control(
    settings: &Settings,
    target: TargetArgs,
    verb: Verb,
    time: Option<f64>,
    rate: Option<f64>,
) -> Result<()> {
    let (browser, lens) = attach(settings, &target).await?;
    let command = match verb {
        Verb::Play => ControlCommand::play(),
        Verb::Pause => ControlCommand::pause(),
        Verb::Seek => ControlCommand::seek(time.context("--time is required for seek")?),
        Verb::SetRate => ControlCommand::set_rate(rate.context("--rate is required for set-rate")?),
    };
    let result = lens.control(command).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    browser.close().await;
    Ok(())
}

async fn cmd_watch(settings: &Settings, target: TargetArgs, duration: Option<u64>) -> Result<()> {
    let (browser, lens) = attach(settings, &target).await?;
    let mut events = lens.subscribe();
    info!(target: "vidlens", "watching binding transitions, ctrl-c to stop");

    let watch = async {
        loop {
            match events.recv().await {
                Ok(event) => println!("{event:?}"),
                Err(_) => break,
            }
        }
    };
    match duration {
        Some(secs) => {
            let _ = tokio::time::timeout(Duration::from_secs(secs), watch).await;
        }
        None => {
            tokio::select! {
                _ = watch => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
    browser.close().await;
    Ok(())
}
