//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, SourceKind};

/// terrane command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "terrane", about = "Quadtree terrain streaming")]
pub struct CliArgs {
    /// Deepest quadtree level.
    #[arg(long)]
    pub max_level: Option<u8>,

    /// Worker threads for mesh simplification (0 = automatic).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Imagery URL template with {z}, {x}, {y} and {token} placeholders.
    #[arg(long)]
    pub imagery_url: Option<String>,

    /// Elevation URL template with {z}, {x}, {y} and {token} placeholders.
    #[arg(long)]
    pub elevation_url: Option<String>,

    /// Access token substituted for {token}.
    #[arg(long)]
    pub access_token: Option<String>,

    /// Log filter (error, warn, info, debug, trace or a full directive list).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Host ticks to run before exiting.
    #[arg(long, default_value_t = 600)]
    pub ticks: u64,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    ///
    /// A URL override switches that source to a remote tile service.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(level) = args.max_level {
            self.lod.max_level = level;
        }
        if let Some(count) = args.workers {
            self.workers.count = count;
        }
        if let Some(ref url) = args.imagery_url {
            self.imagery.kind = SourceKind::Remote;
            self.imagery.url_template = Some(url.clone());
        }
        if let Some(ref url) = args.elevation_url {
            self.elevation.kind = SourceKind::Remote;
            self.elevation.url_template = Some(url.clone());
        }
        if let Some(ref token) = args.access_token {
            self.imagery.access_token = Some(token.clone());
            self.elevation.access_token = Some(token.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
