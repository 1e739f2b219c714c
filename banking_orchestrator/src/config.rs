//! Environment-driven configuration
//!
//! `.env` is loaded first; real environment variables win.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::context::ContextConfig;
use crate::error::AnalysisError;
use crate::generation::{GeminiGenerator, Generator, MockGenerator};
use crate::pipeline::PipelineConfig;
use crate::Result;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Absent means no profile source; sample profiles are used
    pub database_url: Option<String>,
    pub pipeline: PipelineConfig,
    pub context: ContextConfig,
    pub retrieval: RetrievalConfig,
    pub telemetry: TelemetryConfig,
    pub server: ServerConfig,
}

/// Policy search and external fetch limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub fetch_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self.host.parse().map_err(|_| {
            AnalysisError::Configuration(format!(
                "HOST must parse to an IPv4 or IPv6 address, got '{}'",
                self.host
            ))
        })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let pipeline = PipelineConfig {
            global_timeout: secs(&get, "PIPELINE_TIMEOUT_SECS", 180)?,
            stage_timeout: secs(&get, "STAGE_TIMEOUT_SECS", 90)?,
        };

        let retrieval = RetrievalConfig {
            top_k: parse(&get, "POLICY_TOP_K", 8)?,
            fetch_timeout: secs(&get, "FETCH_TIMEOUT_SECS", 30)?,
        };

        let port = match get("PORT") {
            Some(_) => parse(&get, "PORT", 8080)?,
            None => parse(&get, "API_PORT", 8080)?,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            database_url: get("DATABASE_URL"),
            pipeline,
            context: ContextConfig::default(),
            retrieval,
            telemetry: TelemetryConfig {
                log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
            server: ServerConfig {
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
        })
    }

    /// Mock generator when asked for, otherwise Gemini (key required).
    pub fn generator(&self, use_mock: bool) -> Result<Arc<dyn Generator>> {
        if use_mock {
            return Ok(Arc::new(MockGenerator::new()));
        }

        let key = self.gemini_api_key.clone().ok_or_else(|| {
            AnalysisError::Configuration(
                "GEMINI_API_KEY is not set (use the mock generator for offline runs)".to_string(),
            )
        })?;

        Ok(Arc::new(GeminiGenerator::new(key, &self.gemini_model)?))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            database_url: None,
            pipeline: PipelineConfig::default(),
            context: ContextConfig::default(),
            retrieval: RetrievalConfig::default(),
            telemetry: TelemetryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn parse<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AnalysisError::Configuration(format!("{} has an invalid value '{}'", key, raw))
        }),
    }
}

fn secs<G>(get: &G, key: &str, default: u64) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    let value: u64 = parse(get, key, default)?;
    if value == 0 {
        return Err(AnalysisError::Configuration(format!(
            "{} must be greater than zero",
            key
        )));
    }
    Ok(Duration::from_secs(value))
}
