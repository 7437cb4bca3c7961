//! Command-line interface definitions.
//!
//! Credentials can be given as positional arguments, through the
//! `EXTRANET_USERNAME`/`EXTRANET_PASSWORD` environment variables or in the
//! YAML configuration file; the command line wins.

use crate::config::Settings;
use crate::models::{Lang, Page, SubPage};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Query content from the Derytelecom extranet.
///
/// ```sh
/// # Remaining data for the current billing period
/// extranet_query get availabledata jdoe hunter2
///
/// # Both counters as JSON
/// extranet_query get usage --json
///
/// # Refresh every 15 minutes
/// extranet_query watch --interval-minutes 15
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML configuration file
    #[arg(short, long, env = "EXTRANET_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Root URL of the extranet
    #[arg(long, env = "EXTRANET_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Language of the fetched pages
    #[arg(short, long, value_enum, global = true)]
    pub lang: Option<Lang>,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Retrieve data from the extranet
    Get(GetArgs),
    /// Retrieve the available data periodically
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
pub struct Credentials {
    /// The username to use to log in
    #[arg(env = "EXTRANET_USERNAME")]
    pub username: Option<String>,

    /// The password to use to log in
    #[arg(env = "EXTRANET_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// The data to retrieve
    #[arg(value_enum, default_value_t = Data::AvailableData)]
    pub data: Data,

    #[command(flatten)]
    pub credentials: Credentials,

    /// The page to print with `get page`
    #[arg(short, long, value_enum, default_value_t = Page::Internet)]
    pub page: Page,

    /// The sub page to print with `get page`
    #[arg(short, long, value_enum)]
    pub subpage: Option<SubPage>,

    /// Print the usage as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub credentials: Credentials,

    /// Minutes between two queries
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_minutes: u64,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Data {
    /// Remaining data for the billing period
    #[value(name = "availabledata")]
    AvailableData,
    /// Data used in the billing period
    #[value(name = "useddata")]
    UsedData,
    /// Both available and used data
    Usage,
    /// The visible text of a page
    Page,
}

impl Cli {
    /// Apply the command-line overrides on top of the loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(base_url) = &self.base_url {
            settings.base_url = base_url.clone();
        }
        if let Some(lang) = self.lang {
            settings.lang = lang;
        }
        let credentials = match &self.command {
            Command::Get(args) => &args.credentials,
            Command::Watch(args) => &args.credentials,
        };
        if let Some(username) = &credentials.username {
            settings.username = Some(username.clone());
        }
        if let Some(password) = &credentials.password {
            settings.password = Some(password.clone());
        }
    }
}
