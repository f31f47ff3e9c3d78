//! trackline - CLI for sending analytics events to a Matomo-compatible collector
//!
//! This tool provides commands for:
//! - Checking tracker configuration and the offline queue
//! - Tracking screen views and events
//! - Flushing queued events
//!
//! Uses XDG Base Directory specification for file locations:
//! - Preferences: $XDG_DATA_HOME/trackline/preferences.db (~/.local/share/trackline/preferences.db)
//! - Offline cache: $XDG_DATA_HOME/trackline/event_cache/
//! - Config: $XDG_CONFIG_HOME/trackline/config.toml (~/.config/trackline/config.toml)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use trackline_core::helper::{DownloadTracker, TrackHelper, TrackRequest};
use trackline_core::{
    Config, LinkType, ManualConnectivity, Tracker, TrackerBuilder, Trackline,
};

/// Application id reported to the collector when no base URL is configured
const APPLICATION_ID: &str = "trackline-cli";

#[derive(Parser)]
#[command(name = "trackline")]
#[command(about = "Send analytics events to a Matomo-compatible collector")]
#[command(version)]
struct Args {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Queue events in the offline cache instead of sending them
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracker configuration and queue status
    Status,

    /// Track a screen view
    Screen {
        /// Screen path, relative to the application base URL
        path: String,

        /// Screen title
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Track an event
    Event {
        /// Event category (e.g. "Music")
        category: String,

        /// Event action (e.g. "play")
        action: String,

        /// Event name
        #[arg(short, long)]
        name: Option<String>,

        /// Numeric event value
        #[arg(long)]
        value: Option<f32>,
    },

    /// Report this installation once per CLI version
    Download {
        /// Report again even if this version was reported before
        #[arg(long)]
        force: bool,
    },

    /// Send all queued events
    Flush,

    /// Forget the visitor: new visitor id and visit counters
    Reset,
}

/// Returns $HOME or panics
fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .expect("HOME environment variable not set")
}

/// Sets XDG environment variables to ensure the core library uses XDG paths
fn ensure_xdg_env() {
    let home = home_dir();

    if std::env::var("XDG_DATA_HOME").is_err() {
        std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
    }

    if std::env::var("XDG_STATE_HOME").is_err() {
        std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
    }

    if std::env::var("XDG_CONFIG_HOME").is_err() {
        std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging if verbose
    let _log_guard = if args.verbose {
        Some(trackline_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config, args.offline),
        Command::Screen { path, title } => {
            with_tracker(&config, args.offline, |tracker, _| {
                let mut screen = TrackHelper::track().screen(path);
                if let Some(title) = title {
                    screen = screen.title(title);
                }
                screen.with(tracker).context("invalid screen view")
            })
        }
        Command::Event {
            category,
            action,
            name,
            value,
        } => with_tracker(&config, args.offline, |tracker, _| {
            let mut event = TrackHelper::track().event(category, action);
            if let Some(name) = name {
                event = event.name(name);
            }
            if let Some(value) = value {
                event = event.value(value);
            }
            event.with(tracker).context("invalid event")
        }),
        Command::Download { force } => with_tracker(&config, args.offline, |tracker, context| {
            cmd_download(tracker, context, force)
        }),
        Command::Flush => with_tracker(&config, args.offline, |_, _| Ok(())),
        Command::Reset => with_tracker(&config, args.offline, |tracker, _| {
            tracker.reset();
            println!("New visitor id: {}", tracker.visitor_id());
            Ok(())
        }),
    }
}

/// Open the persistent context; `offline` pins connectivity to disconnected
fn open_context(offline: bool) -> Result<Trackline> {
    let context = Trackline::open_default(APPLICATION_ID).context("failed to open preference store")?;
    if offline {
        return Ok(context.with_connectivity(Arc::new(ManualConnectivity::new(false, LinkType::None))));
    }
    Ok(context)
}

fn build_tracker(config: &Config, context: &Trackline) -> Result<Tracker> {
    if !config.tracker.is_ready() {
        bail!(
            "tracker is not configured; set [tracker] api_url and site_id in {}",
            Config::config_path().display()
        );
    }

    TrackerBuilder::from_config(config)
        .context("invalid tracker configuration")?
        .build(context)
        .context("failed to build tracker")
}

/// Run `action` against a configured tracker, then dispatch and report
fn with_tracker<F>(config: &Config, offline: bool, action: F) -> Result<()>
where
    F: FnOnce(&Tracker, &Trackline) -> Result<()>,
{
    let context = open_context(offline)?;
    let tracker = build_tracker(config, &context)?;

    action(&tracker, &context)?;
    tracker.dispatch_blocking();

    let stats = tracker.dispatch_stats();
    println!("Dispatch Results");
    println!("================");
    println!("Events sent:     {}", stats.events_dispatched);
    println!("Packets sent:    {}", stats.packets_sent);
    println!("Failures:        {}", stats.packet_failures);
    println!("Pending events:  {}", tracker.pending_events());

    Ok(())
}

fn cmd_download(tracker: &Tracker, context: &Trackline, force: bool) -> Result<()> {
    let downloads = DownloadTracker::new(context, env!("CARGO_PKG_VERSION"));
    let mut download = TrackHelper::track().download(&downloads);
    if force {
        download = download.force();
    }
    if download.with(tracker) {
        println!("Download of version {} tracked", downloads.version());
    } else {
        println!("Download of version {} was already tracked", downloads.version());
    }
    Ok(())
}

fn cmd_status(config: &Config, offline: bool) -> Result<()> {
    println!("Trackline Configuration");
    println!("=======================");
    println!();

    let tracker_config = &config.tracker;

    println!(
        "API URL:         {}",
        tracker_config.api_url.as_deref().unwrap_or("<not set>")
    );
    println!(
        "Site ID:         {}",
        tracker_config
            .site_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<not set>".to_string())
    );
    println!("Tracker name:    {}", tracker_config.name);
    println!("Interval:        {}ms", config.dispatch.interval_ms);
    println!("Gzip:            {}", config.dispatch.gzip);
    println!("Config file:     {}", Config::config_path().display());
    println!("Data directory:  {}", Config::data_dir().display());
    println!(
        "Log file:        {}",
        trackline_core::logging::log_file_path().display()
    );
    println!();

    if !tracker_config.is_ready() {
        println!("Status: Not configured");
        println!();
        println!("Configure the tracker in config.toml:");
        println!();
        println!("  [tracker]");
        println!("  api_url = \"https://your-matomo-server.com/matomo.php\"");
        println!("  site_id = 1");
        return Ok(());
    }

    let context = open_context(offline)?;
    let tracker = build_tracker(config, &context)?;

    println!("Status: Ready");
    println!();
    println!("Visitor ID:      {}", tracker.visitor_id());
    println!(
        "User ID:         {}",
        tracker.user_id().as_deref().unwrap_or("<not set>")
    );
    println!("Opted out:       {}", tracker.is_opt_out());
    println!("Dispatch mode:   {}", tracker.dispatch_mode());
    println!("Pending events:  {}", tracker.pending_events());

    Ok(())
}
