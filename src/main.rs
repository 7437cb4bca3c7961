//! # Extranet Query
//!
//! Logs in to the Derytelecom customer extranet and reports how much
//! Internet data is left for the current billing period.
//!
//! ## Usage
//!
//! ```sh
//! extranet_query get availabledata USERNAME PASSWORD
//! ```
//!
//! ## Flow
//!
//! Every query runs the same short sequence:
//! 1. **Connect**: scrape the login form and post the credentials
//! 2. **Fetch**: request the page through `index.php`
//! 3. **Extract**: read the values next to their labels
//! 4. **Disconnect**: log out, even when the query failed
//!
//! Failures exit with a code identifying their kind (see [`error`]).

use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod models;
mod portal;
mod utils;

use cli::{Cli, Command, Data, GetArgs, WatchArgs};
use config::Settings;
use error::{Error, Result};
use models::{ContentParams, UsageReport};
use portal::content::{AVAILABLE_LABEL, USED_LABEL};
use portal::with_session;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(error = ?e, "Query failed");
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Logs go to stderr so that stdout only carries the queried data.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

async fn run(args: Cli) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    debug!(?settings, "Resolved settings");

    match &args.command {
        Command::Get(get) => run_get(&settings, get).await,
        Command::Watch(watch) => run_watch(&settings, watch).await,
    }
}

#[instrument(level = "info", skip_all, fields(data = ?args.data))]
async fn run_get(settings: &Settings, args: &GetArgs) -> Result<()> {
    let (username, password) = settings.credentials()?;

    let output = with_session(settings, username, password, async |session| {
        if args.data == Data::Page {
            let params = match args.subpage {
                Some(sub_page) => ContentParams::sub_page(sub_page),
                None => ContentParams::page(args.page),
            };
            return Ok(session.get_content(&params).await?.text());
        }
        let report = session.internet_traffic().await?.report();
        render_usage(args.data, &report, args.json)
    })
    .await?;

    println!("{output}");
    Ok(())
}

/// Query the available data every `interval_minutes`, printing `Error` for a
/// failed round, until interrupted.
#[instrument(level = "info", skip_all, fields(interval_minutes = args.interval_minutes))]
async fn run_watch(settings: &Settings, args: &WatchArgs) -> Result<()> {
    let (username, password) = settings.credentials()?;

    let round = move || async move {
        let available = with_session(settings, username, password, async |session| {
            session
                .internet_traffic()
                .await?
                .available()
                .ok_or_else(|| Error::DataNotFound(AVAILABLE_LABEL.to_string()))
        })
        .await;

        match available {
            Ok(available) => available,
            Err(Error::BadCredentials) => {
                warn!("Nothing retrieved; verify the username and password");
                "Error".to_string()
            }
            Err(e) => {
                error!(error = %e, "Unable to retrieve the available data");
                "Error".to_string()
            }
        }
    };

    let period = Duration::from_secs(args.interval_minutes * 60);
    let rounds = watch_until(period, tokio::signal::ctrl_c(), round).await;
    info!(rounds, "Interrupted; stopping");
    Ok(())
}

/// Run `round` once per `period` and print what it returns, until
/// `shutdown` completes. `shutdown` is watched while waiting for the next
/// tick and while a round is running, so one interrupt is always enough.
///
/// Returns the number of completed rounds.
async fn watch_until<S, R, Fut>(period: Duration, shutdown: S, mut round: R) -> usize
where
    S: Future,
    R: FnMut() -> Fut,
    Fut: Future<Output = String>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut rounds = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => return rounds,
        }
        tokio::select! {
            label = round() => {
                println!("{label}");
                rounds += 1;
            }
            _ = &mut shutdown => return rounds,
        }
    }
}

/// Format the usage report for `get`.
fn render_usage(data: Data, report: &UsageReport, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let missing = |label: &str| Error::DataNotFound(label.to_string());
    match data {
        Data::AvailableData => report.available.clone().ok_or_else(|| missing(AVAILABLE_LABEL)),
        Data::UsedData => report.used.clone().ok_or_else(|| missing(USED_LABEL)),
        Data::Page => Err(Error::Config(
            "`get page` prints page text, not a usage report".to_string(),
        )),
        Data::Usage => {
            let available = report.available.as_deref().ok_or_else(|| missing(AVAILABLE_LABEL))?;
            let used = report.used.as_deref().unwrap_or("?");
            Ok(format!("Available: {available}\nUsed: {used}"))
        }
    }
}
