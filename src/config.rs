use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

use log::LevelFilter;

use crate::optimizer::PackingConfig;

/// Service settings read once at startup from `GRID_PACKER_*` variables.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
    /// Threshold of the console logger (`GRID_PACKER_LOG_LEVEL`, default `warn`).
    pub log_level: LevelFilter,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
            log_level: resolve_log_level(env_string(LOG_LEVEL_VAR)),
        }
    }
}

const LOG_LEVEL_VAR: &str = "GRID_PACKER_LOG_LEVEL";

fn resolve_log_level(raw: Option<String>) -> LevelFilter {
    parse_or_default(
        LOG_LEVEL_VAR,
        raw.as_deref(),
        LevelFilter::Warn,
        |_| true,
        "unknown level",
    )
}

/// Where the HTTP service listens.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const HOST_VAR: &'static str = "GRID_PACKER_API_HOST";
    const PORT_VAR: &'static str = "GRID_PACKER_API_PORT";
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_BIND_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let (bind_ip, display_host) = Self::resolve_host(env_string(Self::HOST_VAR));
        let port = Self::resolve_port(env_string(Self::PORT_VAR));
        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    fn resolve_host(raw: Option<String>) -> (IpAddr, String) {
        let Some(host) = raw else {
            return (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string());
        };
        match host.parse::<IpAddr>() {
            Ok(ip) => (ip, host),
            Err(err) => {
                eprintln!(
                    "⚠️ {}='{}' is not an IP address ({}), binding {} instead.",
                    Self::HOST_VAR,
                    host,
                    err,
                    Self::DEFAULT_HOST
                );
                (Self::DEFAULT_BIND_IP, Self::DEFAULT_HOST.to_string())
            }
        }
    }

    fn resolve_port(raw: Option<String>) -> u16 {
        parse_or_default(
            Self::PORT_VAR,
            raw.as_deref(),
            Self::DEFAULT_PORT,
            |&port| port != 0,
            "must not be 0",
        )
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Host as written in the environment, for startup messages.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `true` for `0.0.0.0` and `::`.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Search limits applied to every request unless the request overrides them.
#[derive(Clone, Debug, Default)]
pub struct OptimizerConfig {
    packing: PackingConfig,
}

impl OptimizerConfig {
    const MAX_CANDIDATES_VAR: &'static str = "GRID_PACKER_MAX_CANDIDATES";
    const MIN_BOX_DIVISOR_VAR: &'static str = "GRID_PACKER_MIN_BOX_DIVISOR";
    const ALLOW_ROTATION_VAR: &'static str = "GRID_PACKER_ALLOW_ROTATIONS";

    fn from_env() -> Self {
        let max_candidates = load_with_warning(
            Self::MAX_CANDIDATES_VAR,
            PackingConfig::DEFAULT_MAX_CANDIDATES,
            |&value| value > 0,
            "must be greater than 0",
            "Non-default candidate limit trades placement quality against latency",
        );

        let min_box_divisor = load_with_warning(
            Self::MIN_BOX_DIVISOR_VAR,
            PackingConfig::DEFAULT_MIN_BOX_DIVISOR,
            |&value: &f64| value > 0.0 && value.is_finite(),
            "must be greater than 0",
            "Non-default divisor changes the grid cell size",
        );

        let allow_item_rotation = env_string(Self::ALLOW_ROTATION_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_ROTATION_VAR))
            .unwrap_or(PackingConfig::DEFAULT_ALLOW_ITEM_ROTATION);

        let packing = PackingConfig::builder()
            .max_candidates(max_candidates)
            .min_box_divisor(min_box_divisor)
            .allow_item_rotation(allow_item_rotation)
            .build();

        Self { packing }
    }

    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

impl From<PackingConfig> for OptimizerConfig {
    fn from(packing: PackingConfig) -> Self {
        Self { packing }
    }
}

/// Non-empty, trimmed value of `name`. Unset and blank both read as `None`.
fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => Some(value.trim().to_owned()).filter(|v| !v.is_empty()),
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!("⚠️ {} is unreadable ({}), ignoring it.", name, err);
            None
        }
    }
}

const TRUTHY: [&str; 5] = ["1", "true", "yes", "y", "on"];
const FALSY: [&str; 5] = ["0", "false", "no", "n", "off"];

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    let value = raw.trim().to_ascii_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Some(true)
    } else if FALSY.contains(&value.as_str()) {
        Some(false)
    } else {
        eprintln!(
            "⚠️ {} ('{}') is neither on nor off, ignoring it.",
            var_name, raw
        );
        None
    }
}

/// Parses `raw` or falls back to `default` with a warning on stderr.
fn parse_or_default<T>(
    var_name: &str,
    raw: Option<&str>,
    default: T,
    validator: impl Fn(&T) -> bool,
    invalid_hint: &str,
) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if validator(&value) => value,
        Ok(_) => {
            eprintln!(
                "⚠️ {}='{}' rejected ({}), falling back to {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            eprintln!(
                "⚠️ {}='{}' is not a valid value ({}), falling back to {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn load_with_warning<T>(
    var_name: &str,
    default: T,
    validator: impl Fn(&T) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> T
where
    T: FromStr + Display + PartialEq + Copy,
    T::Err: Display,
{
    let value = parse_or_default(
        var_name,
        env_string(var_name).as_deref(),
        default,
        validator,
        invalid_hint,
    );
    if value != default {
        println!("⚠️ {}: {}={}", warning, var_name, value);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_switch_accepts_common_spellings() {
        for raw in ["1", "true", "Yes", " on ", "Y"] {
            assert_eq!(parse_bool(raw, "GRID_PACKER_ALLOW_ROTATIONS"), Some(true), "{raw}");
        }
        for raw in ["0", "FALSE", "no", "off", "  n  "] {
            assert_eq!(parse_bool(raw, "GRID_PACKER_ALLOW_ROTATIONS"), Some(false), "{raw}");
        }
        for raw in ["", "2", "sometimes"] {
            assert_eq!(parse_bool(raw, "GRID_PACKER_ALLOW_ROTATIONS"), None, "{raw}");
        }
    }

    #[test]
    fn test_parse_or_default_accepts_valid_numbers() {
        let candidates = parse_or_default("TEST_VAR", Some("250"), 1000usize, |&v| v > 0, "hint");
        assert_eq!(candidates, 250);

        let divisor = parse_or_default("TEST_VAR", Some(" 12.5 "), 50.0, |&v: &f64| v > 0.0, "hint");
        assert_eq!(divisor, 12.5);
    }

    #[test]
    fn test_parse_or_default_falls_back() {
        assert_eq!(
            parse_or_default("TEST_VAR", None, 1000usize, |&v| v > 0, "hint"),
            1000
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("0"), 1000usize, |&v| v > 0, "hint"),
            1000,
            "validator rejection must fall back to the default"
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("lots"), 1000usize, |&v| v > 0, "hint"),
            1000,
            "parse failure must fall back to the default"
        );
        assert_eq!(
            parse_or_default("TEST_VAR", Some("-3"), 50.0, |&v: &f64| v > 0.0, "hint"),
            50.0
        );
    }

    #[test]
    fn log_level_defaults_to_warn() {
        assert_eq!(resolve_log_level(None), LevelFilter::Warn);
        assert_eq!(resolve_log_level(Some("debug".to_string())), LevelFilter::Debug);
        assert_eq!(resolve_log_level(Some("OFF".to_string())), LevelFilter::Off);
        assert_eq!(resolve_log_level(Some("chatty".to_string())), LevelFilter::Warn);
    }

    #[test]
    fn test_resolve_host_and_port() {
        let (ip, host) = ApiConfig::resolve_host(Some("127.0.0.1".to_string()));
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(host, "127.0.0.1");

        let (ip, host) = ApiConfig::resolve_host(Some("not-an-ip".to_string()));
        assert_eq!(ip, ApiConfig::DEFAULT_BIND_IP);
        assert_eq!(host, ApiConfig::DEFAULT_HOST);

        assert_eq!(ApiConfig::resolve_port(Some("9000".to_string())), 9000);
        assert_eq!(ApiConfig::resolve_port(Some("0".to_string())), 8080);
        assert_eq!(ApiConfig::resolve_port(None), 8080);
    }

    #[test]
    fn test_default_host_binds_all_interfaces() {
        let (bind_ip, display_host) = ApiConfig::resolve_host(None);
        let config = ApiConfig {
            bind_ip,
            display_host,
            port: 8080,
        };
        assert!(config.binds_to_all_interfaces());
        assert!(config.uses_default_host());
        assert_eq!(config.socket_addr().port(), 8080);
    }
}
