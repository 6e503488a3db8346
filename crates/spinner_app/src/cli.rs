use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};
use log::LevelFilter;
use spinner_engine::SyncConfig;
use url::Url;

/// Resolve the deferred placeholders of a report page as their jobs finish.
#[derive(Parser, Debug)]
#[command(name = "spinner-sync", version)]
#[command(about = "Swap placeholder spinners for job results as notifications arrive", long_about = None)]
pub struct Args {
    /// Page to drive: an http(s) URL or a local HTML file
    pub source: String,

    /// RON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Location links in the page resolve against (defaults to the source URL)
    #[arg(long)]
    pub base_url: Option<Url>,

    /// Write the final document here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep this file updated with the document after every change
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Where log records go
    #[arg(long, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,

    /// More output; repeat to include HTTP and websocket internals
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogDestination {
    /// Write to stderr.
    Terminal,
    /// Write to ./spinner-sync.log in the current directory.
    File,
    /// Write to both.
    Both,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SyncConfig::default(),
        };
        if let Some(snapshot) = &self.snapshot {
            config.snapshot_path = Some(snapshot.clone());
        }
        Ok(config)
    }

    pub fn level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Third-party records are shown only at the highest verbosity.
    pub fn include_dependencies(&self) -> bool {
        self.verbose >= 2
    }
}
