//! Command line arguments.
//!
//! Flags and their environment variables override values from the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::ProxyConfig;

/// Local development proxy that serves override rules and forwards everything else.
#[derive(Debug, Parser)]
#[command(name = "override-proxy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, env = "OVERRIDE_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (e.g. 127.0.0.1:8787)
    #[arg(short, long, env = "OVERRIDE_PROXY_BIND")]
    pub bind: Option<String>,

    /// Upstream origin for requests no rule handles
    #[arg(short, long, env = "OVERRIDE_PROXY_TARGET")]
    pub target: Option<String>,

    /// Directory scanned for *.toml rule files
    #[arg(short, long, env = "OVERRIDE_PROXY_DIR")]
    pub overrides: Option<PathBuf>,

    /// Do not reload rules when the overrides directory changes
    #[arg(long)]
    pub no_watch: bool,
}

impl Cli {
    /// Apply flag values on top of `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(target) = &self.target {
            config.upstream.target = target.clone();
        }
        if let Some(dir) = &self.overrides {
            config.overrides.directory = Some(dir.clone());
        }
        if self.no_watch {
            config.overrides.watch = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "override-proxy",
            "--bind",
            "0.0.0.0:9999",
            "--target",
            "http://localhost:4000",
            "--overrides",
            "mocks",
            "--no-watch",
        ])
        .unwrap();

        let mut config = ProxyConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.listener.bind_address, "0.0.0.0:9999");
        assert_eq!(config.upstream.target, "http://localhost:4000");
        assert_eq!(config.overrides.directory, Some(PathBuf::from("mocks")));
        assert!(!config.overrides.watch);
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["override-proxy"]).unwrap();
        let mut config = ProxyConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.listener.bind_address, "127.0.0.1:8787");
        assert!(config.overrides.watch);
    }
}
