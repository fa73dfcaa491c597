use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::worker::RefreshConfig;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_POLL_SECS: u64 = 60;
pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_LMS_PORT: u16 = 9000;

/// Top-level app configuration. Every field is optional so files and CLI
/// flags can be layered; the accessors apply defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>, // e.g., "info" | "debug"
    pub server: Option<ServerConfig>,
    pub refresh: Option<RefreshSettings>,
    pub display: Option<DisplayConfig>,
    pub lms: Option<LmsConfig>,
    pub location: Option<LocationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RefreshSettings {
    pub poll_interval_secs: Option<u64>,
    pub render_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DisplayConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub dither: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LmsConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    /// player MAC / id as LMS reports it
    pub player: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub name: Option<String>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "lymons-frame", version, about = "LyMonS frame server", disable_help_flag = false)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Verbose logging (debug)
    #[arg(long, short = 'v', action = ArgAction::SetTrue)]
    pub debug: bool,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,
    #[arg(long)]
    pub render_timeout_secs: Option<u64>,
    #[arg(long)]
    pub display_width: Option<u32>,
    #[arg(long)]
    pub display_height: Option<u32>,
    #[arg(long, action = ArgAction::Set)]
    pub dither: Option<bool>,
    #[arg(long)]
    pub lms_host: Option<String>,
    #[arg(long)]
    pub lms_port: Option<u16>,
    /// LMS player MAC to monitor
    #[arg(long, short = 'N')]
    pub lms_player: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub latitude: Option<f64>,
    #[arg(long, allow_negative_numbers = true)]
    pub longitude: Option<f64>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Parse CLI, read YAML, merge, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if !p.exists() {
            return Err(ConfigError::Validation(format!("Config file not found: {}", p.display())));
        }
        merge(&mut cfg, read_yaml(p)?);
    } else if let Some(p) = find_config_file() {
        merge(&mut cfg, read_yaml(&p)?);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;
    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    if let Some(home) = home_dir() {
        let p = home.join(".config/lymons-frame/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/lymons-frame.yaml");
        if p.exists() { return Some(p) }
    }
    for candidate in &["lymons-frame.yaml", "config.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    Ok(serde_yaml::from_str(s)?)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some() { dst.log_level = src.log_level; }
    if let Some(s) = src.server {
        let d = dst.server.get_or_insert_with(Default::default);
        if s.bind.is_some() { d.bind = s.bind; }
    }
    if let Some(s) = src.refresh {
        let d = dst.refresh.get_or_insert_with(Default::default);
        if s.poll_interval_secs.is_some()  { d.poll_interval_secs = s.poll_interval_secs; }
        if s.render_timeout_secs.is_some() { d.render_timeout_secs = s.render_timeout_secs; }
    }
    if let Some(s) = src.display {
        let d = dst.display.get_or_insert_with(Default::default);
        if s.width.is_some()  { d.width = s.width; }
        if s.height.is_some() { d.height = s.height; }
        if s.dither.is_some() { d.dither = s.dither; }
    }
    if let Some(s) = src.lms {
        let d = dst.lms.get_or_insert_with(Default::default);
        if s.host.is_some()   { d.host = s.host; }
        if s.port.is_some()   { d.port = s.port; }
        if s.player.is_some() { d.player = s.player; }
    }
    if let Some(s) = src.location {
        let d = dst.location.get_or_insert_with(Default::default);
        if s.latitude.is_some()  { d.latitude = s.latitude; }
        if s.longitude.is_some() { d.longitude = s.longitude; }
        if s.name.is_some()      { d.name = s.name; }
    }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.debug { cfg.log_level = Some("debug".into()); }
    if cli.log_level.is_some() { cfg.log_level = cli.log_level.clone(); }

    let overrides = Config {
        log_level: None,
        server: Some(ServerConfig { bind: cli.bind.clone() }),
        refresh: Some(RefreshSettings {
            poll_interval_secs: cli.poll_interval_secs,
            render_timeout_secs: cli.render_timeout_secs,
        }),
        display: Some(DisplayConfig {
            width: cli.display_width,
            height: cli.display_height,
            dither: cli.dither,
        }),
        lms: Some(LmsConfig {
            host: cli.lms_host.clone(),
            port: cli.lms_port,
            player: cli.lms_player.clone(),
        }),
        location: Some(LocationConfig {
            latitude: cli.latitude,
            longitude: cli.longitude,
            name: None,
        }),
    };
    merge(cfg, overrides);
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    cfg.bind_addr()?;
    if let Some(r) = cfg.refresh.as_ref() {
        if r.poll_interval_secs == Some(0) {
            return Err(ConfigError::Validation("refresh poll_interval_secs must be > 0".into()));
        }
        if r.render_timeout_secs == Some(0) {
            return Err(ConfigError::Validation("refresh render_timeout_secs must be > 0".into()));
        }
    }
    if let Some(d) = cfg.display.as_ref() {
        if d.width == Some(0) || d.height == Some(0) {
            return Err(ConfigError::Validation("display width/height must be > 0".into()));
        }
    }
    if let Some(l) = cfg.location.as_ref() {
        match (l.latitude, l.longitude) {
            (Some(lat), Some(lng)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                    return Err(ConfigError::Validation(format!("location {lat}, {lng} out of range")));
                }
            }
            (None, None) => {}
            _ => return Err(ConfigError::Validation("location needs both latitude and longitude".into())),
        }
    }
    Ok(())
}

impl Config {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.server.as_ref().and_then(|s| s.bind.as_deref()).unwrap_or(DEFAULT_BIND);
        bind.parse()
            .map_err(|_| ConfigError::Validation(format!("server bind '{bind}' is not host:port")))
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        let r = self.refresh.clone().unwrap_or_default();
        RefreshConfig {
            poll_interval: Duration::from_secs(r.poll_interval_secs.unwrap_or(DEFAULT_POLL_SECS)),
            render_timeout: Duration::from_secs(r.render_timeout_secs.unwrap_or(DEFAULT_RENDER_TIMEOUT_SECS)),
        }
    }

    pub fn display_size(&self) -> (u32, u32) {
        let d = self.display.clone().unwrap_or_default();
        (d.width.unwrap_or(DEFAULT_WIDTH), d.height.unwrap_or(DEFAULT_HEIGHT))
    }

    pub fn initial_dither(&self) -> bool {
        self.display.as_ref().and_then(|d| d.dither).unwrap_or(false)
    }

    /// (host, port, player) when an LMS host is configured.
    pub fn lms_endpoint(&self) -> Option<(String, u16, String)> {
        let l = self.lms.as_ref()?;
        let host = l.host.clone().filter(|h| !h.is_empty())?;
        Some((
            host,
            l.port.unwrap_or(DEFAULT_LMS_PORT),
            l.player.clone().unwrap_or_else(|| "-".into()),
        ))
    }

    pub fn static_location(&self) -> Option<(f64, f64, Option<String>)> {
        let l = self.location.as_ref()?;
        Some((l.latitude?, l.longitude?, l.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
log_level: info
server:
  bind: "127.0.0.1:9090"
refresh:
  poll_interval_secs: 30
display:
  width: 296
  height: 128
  dither: true
lms:
  host: 192.168.1.20
  player: "aa:bb:cc:dd:ee:ff"
location:
  latitude: 43.6
  longitude: -79.4
  name: Home
"#;

    #[test]
    fn test_yaml_accessors() {
        let cfg = parse_yaml(YAML).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.bind_addr().unwrap(), "127.0.0.1:9090".parse().unwrap());
        assert_eq!(cfg.refresh_config().poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.refresh_config().render_timeout, Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS));
        assert_eq!(cfg.display_size(), (296, 128));
        assert!(cfg.initial_dither());
        assert_eq!(
            cfg.lms_endpoint(),
            Some(("192.168.1.20".into(), 9000, "aa:bb:cc:dd:ee:ff".into()))
        );
        assert_eq!(cfg.static_location(), Some((43.6, -79.4, Some("Home".into()))));
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_addr().unwrap(), DEFAULT_BIND.parse().unwrap());
        assert_eq!(cfg.display_size(), (DEFAULT_WIDTH, DEFAULT_HEIGHT));
        assert!(cfg.lms_endpoint().is_none());
        assert!(cfg.static_location().is_none());
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let mut cfg = parse_yaml(YAML).unwrap();
        let cli = Cli {
            debug: true,
            poll_interval_secs: Some(5),
            display_width: Some(400),
            lms_port: Some(9002),
            ..Default::default()
        };
        apply_cli_overrides(&mut cfg, &cli);
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.refresh_config().poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.display_size(), (400, 128));
        assert_eq!(cfg.lms_endpoint().map(|e| e.1), Some(9002));
        // untouched values survive
        assert_eq!(cfg.static_location().map(|l| l.0), Some(43.6));
    }

    #[test]
    fn test_validation_errors() {
        let bad = parse_yaml("refresh:\n  poll_interval_secs: 0\n").unwrap();
        assert!(matches!(validate(&bad), Err(ConfigError::Validation(_))));

        let bad = parse_yaml("display:\n  width: 0\n").unwrap();
        assert!(validate(&bad).is_err());

        let bad = parse_yaml("location:\n  latitude: 95.0\n  longitude: 0.0\n").unwrap();
        assert!(validate(&bad).is_err());

        let bad = parse_yaml("location:\n  latitude: 45.0\n").unwrap();
        assert!(validate(&bad).is_err());

        let bad = parse_yaml("server:\n  bind: nope\n").unwrap();
        assert!(validate(&bad).is_err());
    }
}
