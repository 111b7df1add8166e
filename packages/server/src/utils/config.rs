use once_cell::sync::Lazy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub static CONFIG: Lazy<ServerConfig> = Lazy::new(ServerConfig::from_env);

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub cors_origin: String,
    /// JSON file seeding the global game configuration at startup.
    pub game_config_path: Option<PathBuf>,
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_origin: DEFAULT_ORIGIN.to_string(),
            game_config_path: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Reads the process environment; unset or unparsable values fall back
    /// to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse()
            .unwrap_or(defaults.addr);
        let history_limit = lookup("HISTORY_LIMIT")
            .and_then(|v| v.parse().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(defaults.history_limit);

        Self {
            addr,
            cors_origin: lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin),
            game_config_path: lookup("GAME_CONFIG_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            history_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config.addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.history_limit, 20);
        assert!(config.game_config_path.is_none());
    }

    #[test]
    fn bad_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_ADDR", "not an address"),
            ("HISTORY_LIMIT", "0"),
            ("GAME_CONFIG_PATH", "/etc/werewolf.json"),
        ]));
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.history_limit, 20);
        assert_eq!(
            config.game_config_path,
            Some(PathBuf::from("/etc/werewolf.json"))
        );
    }
}
