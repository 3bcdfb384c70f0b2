//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.wayfinder/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//! The `[[routes]]` table describes the screens the host adapter can reach.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::LogLevel;
use crate::core::address::Address;
use crate::core::capability::DeepLinkStrategy;
use crate::core::coordinator::{DEFAULT_MAX_SHELL_DEPTH, NavSettings};
use crate::core::path::DEFAULT_MAX_REDIRECT_HOPS;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct WayfinderConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_address: Option<Address>,
    pub max_redirect_hops: Option<usize>,
    pub max_shell_depth: Option<usize>,
    pub log_level: Option<LogLevel>,
    pub log_file: Option<String>,
}

/// The kind of nested path a host route renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    Stack,
}

/// `host = "stack"` or `host = ["/tabs/feed", "/tabs/search"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum HostEntry {
    Kind(HostKind),
    Fixed(Vec<Address>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Literal segments and `:param` placeholders, e.g. `/users/:id`.
    pub pattern: String,
    /// Owning path. Defaults to the shell's nested path, else root.
    pub path: Option<String>,
    /// Address of the host route this screen is shown inside.
    pub shell: Option<Address>,
    /// Present when this route renders a nested path keyed by its pattern.
    pub host: Option<HostEntry>,
    /// Extra addresses the host answers for (diagnostics only).
    pub claims: Option<Vec<Address>>,
    pub redirect: Option<Address>,
    #[serde(default)]
    pub guarded: bool,
    pub strategy: Option<DeepLinkStrategy>,
    /// Rebuild the root stack from these addresses when opened externally.
    pub deep_link_stack: Option<Vec<Address>>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_LOG_FILE: &str = "wayfinder.log";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub default_address: Address,
    pub max_redirect_hops: usize,
    pub max_shell_depth: usize,
    pub log_level: LogLevel,
    pub log_file: String,
    pub routes: Vec<RouteEntry>,
}

impl ResolvedConfig {
    pub fn settings(&self) -> NavSettings {
        NavSettings {
            default_address: self.default_address.clone(),
            max_redirect_hops: self.max_redirect_hops,
            max_shell_depth: self.max_shell_depth,
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.wayfinder/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".wayfinder").join("config.toml"))
}

/// Load config from an explicit file, or from `~/.wayfinder/config.toml`.
///
/// A missing default file is generated (commented out) and yields
/// `WayfinderConfig::default()`. A missing explicit file is an I/O error.
/// A malformed file returns `ConfigError::Parse`.
pub fn load_config(explicit: Option<&Path>) -> Result<WayfinderConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(WayfinderConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(WayfinderConfig::default());
    }

    read_config(&path)
}

fn read_config(path: &Path) -> Result<WayfinderConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config = parse_config(&contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

pub fn parse_config(contents: &str) -> Result<WayfinderConfig, ConfigError> {
    toml::from_str(contents).map_err(ConfigError::Parse)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# Wayfinder Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_address = "/"              # Or set WAYFINDER_DEFAULT_ADDRESS
# max_redirect_hops = 32             # Or set WAYFINDER_MAX_REDIRECTS
# max_shell_depth = 16
# log_level = "info"                 # "off", "error", "warn", "info", "debug", "trace"
# log_file = "wayfinder.log"

# [[routes]]
# pattern = "/home"

# [[routes]]
# pattern = "/users/:id"
# guarded = true                     # refuses to pop while the host is locked

# [[routes]]
# pattern = "/tabs"
# host = ["/tabs/feed", "/tabs/search"]

# [[routes]]
# pattern = "/tabs/feed"
# shell = "/tabs"

# [[routes]]
# pattern = "/tabs/search"
# shell = "/tabs"

# [[routes]]
# pattern = "/old-home"
# redirect = "/home"

# [[routes]]
# pattern = "/promo"
# strategy = "push"                  # "replace" (default) or "push"
# deep_link_stack = ["/home"]
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_log_level` and `cli_log_file` are from CLI flags (None = not specified).
pub fn resolve(
    config: &WayfinderConfig,
    cli_log_level: Option<LogLevel>,
    cli_log_file: Option<&str>,
) -> ResolvedConfig {
    // Default address: env → config → root
    let default_address = std::env::var("WAYFINDER_DEFAULT_ADDRESS")
        .ok()
        .map(|s| Address::parse(&s))
        .or_else(|| config.general.default_address.clone())
        .unwrap_or_else(Address::root);

    // Redirect hops: env → config → default
    let max_redirect_hops = std::env::var("WAYFINDER_MAX_REDIRECTS")
        .ok()
        .and_then(|s| match s.trim().parse() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("Ignoring WAYFINDER_MAX_REDIRECTS={:?}: {}", s, e);
                None
            }
        })
        .or(config.general.max_redirect_hops)
        .unwrap_or(DEFAULT_MAX_REDIRECT_HOPS);

    // Log level: CLI → env → config → default
    let log_level = cli_log_level
        .or_else(|| {
            std::env::var("WAYFINDER_LOG_LEVEL")
                .ok()
                .and_then(|s| LogLevel::parse(&s))
        })
        .or(config.general.log_level)
        .unwrap_or_default();

    // Log file: CLI → config → default
    let log_file = cli_log_file
        .map(|s| s.to_string())
        .or_else(|| config.general.log_file.clone())
        .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

    ResolvedConfig {
        default_address,
        max_redirect_hops,
        max_shell_depth: config
            .general
            .max_shell_depth
            .unwrap_or(DEFAULT_MAX_SHELL_DEPTH),
        log_level,
        log_file,
        routes: config.routes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = WayfinderConfig::default();
        assert!(config.routes.is_empty());
        assert!(config.general.default_address.is_none());
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let config = WayfinderConfig::default();
        let resolved = resolve(&config, None, None);
        assert_eq!(resolved.max_shell_depth, DEFAULT_MAX_SHELL_DEPTH);
        assert_eq!(resolved.log_file, DEFAULT_LOG_FILE);
        assert!(resolved.routes.is_empty());
    }

    #[test]
    fn test_resolve_config_values_override_defaults() {
        let config = WayfinderConfig {
            general: GeneralConfig {
                max_shell_depth: Some(4),
                log_file: Some("nav.log".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, None, None);
        assert_eq!(resolved.max_shell_depth, 4);
        assert_eq!(resolved.log_file, "nav.log");
        assert_eq!(resolved.settings().max_shell_depth, 4);
    }

    #[test]
    fn test_resolve_cli_wins() {
        let config = WayfinderConfig {
            general: GeneralConfig {
                log_level: Some(LogLevel::Warn),
                log_file: Some("nav.log".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve(&config, Some(LogLevel::Trace), Some("cli.log"));
        assert_eq!(resolved.log_level, LogLevel::Trace);
        assert_eq!(resolved.log_file, "cli.log");
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
[general]
default_address = "/home"
max_redirect_hops = 8
log_level = "debug"

[[routes]]
pattern = "/home"

[[routes]]
pattern = "/users/:id"
guarded = true
strategy = "push"

[[routes]]
pattern = "/tabs"
host = ["/tabs/feed", "/tabs/search"]

[[routes]]
pattern = "/shell"
host = "stack"
claims = ["/shell/inbox"]

[[routes]]
pattern = "/tabs/feed"
shell = "/tabs"

[[routes]]
pattern = "/old"
redirect = "/home"
deep_link_stack = ["/home", "/tabs"]
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(
            config.general.default_address,
            Some(Address::parse("/home"))
        );
        assert_eq!(config.general.max_redirect_hops, Some(8));
        assert_eq!(config.general.log_level, Some(LogLevel::Debug));
        assert_eq!(config.routes.len(), 6);
        assert!(config.routes[1].guarded);
        assert_eq!(config.routes[1].strategy, Some(DeepLinkStrategy::Push));
        assert_eq!(
            config.routes[2].host,
            Some(HostEntry::Fixed(vec![
                Address::parse("/tabs/feed"),
                Address::parse("/tabs/search"),
            ]))
        );
        assert_eq!(config.routes[3].host, Some(HostEntry::Kind(HostKind::Stack)));
        assert_eq!(config.routes[4].shell, Some(Address::parse("/tabs")));
        assert_eq!(config.routes[5].deep_link_stack.as_ref().map(Vec::len), Some(2));
        assert!(!config.routes[5].guarded);
    }

    #[test]
    fn test_sparse_toml_parses() {
        // Only override one thing, everything else stays default
        let toml_str = r#"
[general]
max_shell_depth = 3
"#;
        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.general.max_shell_depth, Some(3));
        assert!(config.general.log_level.is_none());
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[general\nmax_shell_depth = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().starts_with("config parse error"));
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
