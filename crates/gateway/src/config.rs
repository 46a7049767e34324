use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub table_name: String,
    pub aws_region: String,
    pub dynamodb_endpoint: Option<String>,
    pub path_prefix: String,
    pub store_timeout_ms: u64,
    pub scan_follow_pages: bool,
    pub metrics_enabled: bool,
    pub loggly: Option<LogglyConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogglyConfig {
    pub base_url: String,
    pub token: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StartupError {}

impl GatewayConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("SNOWDEX_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                let file_kv = parse_env_file(config_path)?;
                merged.extend(file_kv);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = parse_socket_addr(
            kv.get("SNOWDEX_BIND_ADDR"),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            "SNOWDEX_BIND_ADDR",
        )?;

        let table_name = require_nonempty(kv, "SNOWDEX_TABLE_NAME")?;

        let aws_region = optional_trimmed(kv, "SNOWDEX_AWS_REGION")
            .unwrap_or_else(|| "us-east-1".to_string());

        let dynamodb_endpoint = optional_trimmed(kv, "SNOWDEX_DYNAMODB_ENDPOINT");

        let path_prefix = optional_trimmed(kv, "SNOWDEX_PATH_PREFIX")
            .unwrap_or_else(|| "/snowdex".to_string());
        if !path_prefix.starts_with('/') || (path_prefix.len() > 1 && path_prefix.ends_with('/'))
        {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "SNOWDEX_PATH_PREFIX must start with / and must not end with /"
                    .to_string(),
            });
        }

        let store_timeout_ms = parse_u64(
            kv.get("SNOWDEX_STORE_TIMEOUT_MS"),
            5000,
            "SNOWDEX_STORE_TIMEOUT_MS",
        )?;
        if store_timeout_ms == 0 {
            return Err(StartupError {
                code: "ERR_INVALID_CONFIG",
                message: "SNOWDEX_STORE_TIMEOUT_MS must be >= 1".to_string(),
            });
        }

        let scan_follow_pages = parse_bool_strict(
            kv.get("SNOWDEX_SCAN_FOLLOW_PAGES"),
            false,
            "SNOWDEX_SCAN_FOLLOW_PAGES",
        )?;
        let metrics_enabled = parse_bool_strict(
            kv.get("SNOWDEX_METRICS_ENABLED"),
            true,
            "SNOWDEX_METRICS_ENABLED",
        )?;

        let loggly = optional_trimmed(kv, "SNOWDEX_LOGGLY_TOKEN").map(|token| LogglyConfig {
            base_url: optional_trimmed(kv, "SNOWDEX_LOGGLY_URL")
                .unwrap_or_else(|| "https://logs-01.loggly.com".to_string()),
            token,
            tag: optional_trimmed(kv, "SNOWDEX_LOGGLY_TAG")
                .unwrap_or_else(|| "snowdex".to_string()),
        });

        Ok(Self {
            bind_addr,
            table_name,
            aws_region,
            dynamodb_endpoint,
            path_prefix,
            store_timeout_ms,
            scan_follow_pages,
            metrics_enabled,
            loggly,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Full route path for an endpoint name under the configured prefix.
    pub fn route(&self, name: &str) -> String {
        format!("{}/{}", self.path_prefix.trim_end_matches('/'), name)
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path).map_err(|_| StartupError {
        code: "ERR_CONFIG_FILE_READ",
        message: format!("failed to read config file at {}", path),
    })?;

    parse_env_lines(&contents)
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>, StartupError> {
    let mut kv = HashMap::new();

    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| StartupError {
            code: "ERR_CONFIG_FILE_PARSE",
            message: format!("invalid config line {} (expected KEY=VALUE)", idx + 1),
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError {
                code: "ERR_CONFIG_FILE_PARSE",
                message: format!("invalid config line {} (empty key)", idx + 1),
            });
        }

        kv.insert(key.to_string(), strip_quotes(value.trim()));
    }

    Ok(kv)
}

fn strip_quotes(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..bytes.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn require_nonempty(
    kv: &HashMap<String, String>,
    key: &'static str,
) -> Result<String, StartupError> {
    optional_trimmed(kv, key).ok_or_else(|| StartupError {
        code: "ERR_MISSING_CONFIG",
        message: format!("missing required config key {}", key),
    })
}

fn optional_trimmed(kv: &HashMap<String, String>, key: &str) -> Option<String> {
    kv.get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

fn parse_socket_addr(
    value: Option<&String>,
    default: SocketAddr,
    key: &'static str,
) -> Result<SocketAddr, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<SocketAddr>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a valid host:port socket address", key),
        }),
    }
}

fn parse_u64(value: Option<&String>, default: u64, key: &'static str) -> Result<u64, StartupError> {
    match value {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse::<u64>().map_err(|_| StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be an integer", key),
        }),
    }
}

fn parse_bool_strict(
    value: Option<&String>,
    default: bool,
    key: &'static str,
) -> Result<bool, StartupError> {
    let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(default);
    };

    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Ok(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Ok(false),
        _ => Err(StartupError {
            code: "ERR_INVALID_CONFIG",
            message: format!("{} must be a boolean", key),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_ok_env() -> HashMap<String, String> {
        HashMap::from([(
            "SNOWDEX_TABLE_NAME".to_string(),
            "snow_products".to_string(),
        )])
    }

    #[test]
    fn minimal_env_uses_defaults() {
        let cfg = GatewayConfig::from_kv(&minimal_ok_env()).expect("config should load");
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.table_name, "snow_products");
        assert_eq!(cfg.aws_region, "us-east-1");
        assert_eq!(cfg.dynamodb_endpoint, None);
        assert_eq!(cfg.path_prefix, "/snowdex");
        assert_eq!(cfg.store_timeout(), Duration::from_millis(5000));
        assert!(!cfg.scan_follow_pages);
        assert!(cfg.metrics_enabled);
        assert_eq!(cfg.loggly, None);
        assert_eq!(cfg.route("search"), "/snowdex/search");
    }

    #[test]
    fn missing_table_name_fails() {
        let err = GatewayConfig::from_kv(&HashMap::new()).unwrap_err();
        assert_eq!(err.code, "ERR_MISSING_CONFIG");
    }

    #[test]
    fn prefix_with_trailing_slash_fails() {
        let mut env = minimal_ok_env();
        env.insert("SNOWDEX_PATH_PREFIX".to_string(), "/api/".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn root_prefix_routes_without_double_slash() {
        let mut env = minimal_ok_env();
        env.insert("SNOWDEX_PATH_PREFIX".to_string(), "/".to_string());
        let cfg = GatewayConfig::from_kv(&env).expect("root prefix should be accepted");
        assert_eq!(cfg.route("all"), "/all");
    }

    #[test]
    fn zero_store_timeout_fails() {
        let mut env = minimal_ok_env();
        env.insert("SNOWDEX_STORE_TIMEOUT_MS".to_string(), "0".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn invalid_boolean_fails() {
        let mut env = minimal_ok_env();
        env.insert("SNOWDEX_SCAN_FOLLOW_PAGES".to_string(), "maybe".to_string());
        let err = GatewayConfig::from_kv(&env).unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_CONFIG");
    }

    #[test]
    fn loggly_token_enables_sink_config() {
        let mut env = minimal_ok_env();
        env.insert("SNOWDEX_LOGGLY_TOKEN".to_string(), "tok-123".to_string());
        env.insert("SNOWDEX_LOGGLY_TAG".to_string(), "snow".to_string());
        let cfg = GatewayConfig::from_kv(&env).expect("config should load");
        assert_eq!(
            cfg.loggly,
            Some(LogglyConfig {
                base_url: "https://logs-01.loggly.com".to_string(),
                token: "tok-123".to_string(),
                tag: "snow".to_string(),
            })
        );
    }

    #[test]
    fn env_file_lines_skip_comments_and_strip_quotes() {
        let kv = parse_env_lines(
            "# comment\n\nSNOWDEX_TABLE_NAME=\"snow_products\"\nSNOWDEX_AWS_REGION='eu-west-1'\n",
        )
        .expect("env lines should parse");
        assert_eq!(kv.get("SNOWDEX_TABLE_NAME").map(String::as_str), Some("snow_products"));
        assert_eq!(kv.get("SNOWDEX_AWS_REGION").map(String::as_str), Some("eu-west-1"));
    }

    #[test]
    fn env_file_line_without_equals_fails() {
        let err = parse_env_lines("SNOWDEX_TABLE_NAME").unwrap_err();
        assert_eq!(err.code, "ERR_CONFIG_FILE_PARSE");
    }
}
