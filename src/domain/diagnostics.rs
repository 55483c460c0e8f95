//! Server self-description shared by the `diagnostics` tool and the
//! `diagnostics://server` resource.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::domain::tools::tool_names;
use crate::mcp::server::LATEST_PROTOCOL_VERSION;

#[derive(Debug, Clone)]
pub struct Diagnostics {
    started_at: DateTime<Utc>,
    transport: &'static str,
    app_env: &'static str,
    credentials_configured: bool,
}

impl Diagnostics {
    pub fn new(
        transport: &'static str,
        app_env: &'static str,
        credentials_configured: bool,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            transport,
            app_env,
            credentials_configured,
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        (Utc::now() - self.started_at)
            .to_std()
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self, include_environment: bool) -> Map<String, Value> {
        let mut meta = Map::from_iter([
            ("version".to_string(), json!(env!("CARGO_PKG_VERSION"))),
            (
                "mcpProtocolVersion".to_string(),
                json!(LATEST_PROTOCOL_VERSION),
            ),
            ("os".to_string(), json!(std::env::consts::OS)),
            ("arch".to_string(), json!(std::env::consts::ARCH)),
            ("uptime".to_string(), json!(self.uptime_secs())),
            (
                "startTime".to_string(),
                json!(self
                    .started_at
                    .to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            ("enabledTools".to_string(), json!(tool_names())),
            ("apiStatus".to_string(), json!("unknown")),
        ]);

        if include_environment {
            meta.insert(
                "env".to_string(),
                json!({
                    "APP_ENV": self.app_env,
                    "MCP_TRANSPORT": self.transport,
                    "RAINDROP_ACCESS_TOKEN": if self.credentials_configured { "set" } else { "unset" },
                }),
            );
        }

        meta
    }
}

#[cfg(test)]
mod tests {
    use super::Diagnostics;

    #[test]
    fn snapshot_reports_version_and_tools() {
        let diagnostics = Diagnostics::new("stdio", "production", false);
        let meta = diagnostics.snapshot(false);

        assert_eq!(meta["version"], env!("CARGO_PKG_VERSION"));
        assert!(meta["enabledTools"]
            .as_array()
            .expect("tool list")
            .iter()
            .any(|name| name == "diagnostics"));
        assert!(!meta.contains_key("env"));
    }

    #[test]
    fn environment_never_exposes_token_value() {
        let diagnostics = Diagnostics::new("http", "development", true);
        let meta = diagnostics.snapshot(true);

        assert_eq!(meta["env"]["RAINDROP_ACCESS_TOKEN"], "set");
        assert_eq!(meta["env"]["MCP_TRANSPORT"], "http");
    }
}
