//! Configuration for terrane.
//!
//! Settings persist to disk as `config.ron` and can be overridden from the
//! command line. Every section defaults independently, so partial or older
//! files keep loading.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, ErrorPolicyConfig, FetchConfig, LodConfig, RtinConfig, SourceKind,
    TileSourceConfig, WorkerConfig,
};
pub use error::ConfigError;
