// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;
use thiserror::Error;

/// Upper bound of the score scale used by the quiz grader.
pub const DEFAULT_MAX_SCORE: f64 = 10.0;

/// Average score below which a tag is reported as a weak point.
/// Midpoint of the default scale.
pub const DEFAULT_WEAK_POINT_THRESHOLD: f64 = 5.0;

/// Request body limit for routes accepting uploads.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Tunables of the scoring scale shared by the grader and the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub max_score: f64,
    pub weak_point_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_score: DEFAULT_MAX_SCORE,
            weak_point_threshold: DEFAULT_WEAK_POINT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub upload_dir: String,
    pub upload_base_url: String,
    pub scoring: ScoringConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let jwt_secret = required("JWT_SECRET")?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let upload_base_url =
            env::var("UPLOAD_BASE_URL").unwrap_or_else(|_| "/uploads".to_string());

        let scoring = ScoringConfig {
            max_score: parsed("MAX_SCORE", DEFAULT_MAX_SCORE)?,
            weak_point_threshold: parsed("WEAK_POINT_THRESHOLD", DEFAULT_WEAK_POINT_THRESHOLD)?,
        };

        if scoring.max_score <= 0.0 {
            return Err(ConfigError::Invalid {
                name: "MAX_SCORE",
                value: scoring.max_score.to_string(),
            });
        }

        Ok(Self {
            database_url,
            jwt_secret,
            rust_log,
            bind_addr,
            upload_dir,
            upload_base_url,
            scoring,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}
