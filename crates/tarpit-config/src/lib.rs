//! Hierarchical configuration for the tarpit node: built-in defaults,
//! overlaid by an optional TOML file, then `GOPOT__`-prefixed
//! environment variables, then CLI flags, with the merged result
//! validated before use.

mod cli;
mod loader;
mod sections;
mod validate;

pub use cli::ConfigOverrides;
pub use loader::load;
pub use sections::{
    ClusterMode, ClusterSection, FtpServerSection, LoggingSection, MultiProtocolSection, RecastSection,
    ServerSection, StallerSection, TarpitConfig, TelemetrySection, TimeoutWatcherSection,
};
pub use validate::{validate, ConfigError};
