use thiserror::Error;

/// Fatal, startup-time failures. Steady-state per-datagram failures are
/// never represented by this type — they are logged and dropped at the
/// server boundary instead (see each `server::*` module).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} as TOML")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}
