use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Dev,
    Testing,
    Production,
}

impl Environment {
    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Dev | Self::Testing)
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, Self::Testing)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEV" => Ok(Self::Dev),
            "TESTING" => Ok(Self::Testing),
            "PRODUCTION" => Ok(Self::Production),
            other => bail!("unknown ENVIRONMENT: {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub expires_in_minutes: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub origins: Vec<String>,
    pub origins_regex: Option<String>,
    pub headers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub app_name: String,
    pub database_url: String,
    pub database_echo: bool,
    /// Accepted for deployment parity; nothing reads it yet.
    pub redis_url: Option<String>,
    pub cors: CorsConfig,
    pub jwt: JwtConfig,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let environment = match get("ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let algorithm = get("JWT_ALG").unwrap_or_else(|| "HS256".to_string());
        let algorithm = Algorithm::from_str(&algorithm)
            .with_context(|| format!("invalid JWT_ALG: {}", algorithm))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            bail!("JWT_ALG must be an HMAC algorithm (HS256, HS384, HS512)");
        }

        Ok(Self {
            environment,
            app_name: get("APP_NAME").unwrap_or_else(|| "app".to_string()),
            database_url: get("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_echo: parse_bool(get("DATABASE_ECHO"))?,
            redis_url: get("REDIS_URL").filter(|s| !s.is_empty()),
            cors: CorsConfig {
                origins: parse_list(get("CORS_ORIGINS")),
                origins_regex: get("CORS_ORIGINS_REGEX").filter(|s| !s.is_empty()),
                headers: parse_list(get("CORS_HEADERS")),
            },
            jwt: JwtConfig {
                secret: get("JWT_SECRET").context("JWT_SECRET must be set")?,
                algorithm,
                expires_in_minutes: get("JWT_EXP")
                    .unwrap_or_else(|| "15".to_string()) // 15 minutes
                    .parse()
                    .context("JWT_EXP must be a number of minutes")?,
            },
            port: get("PORT")
                .unwrap_or_else(|| "8000".to_string())
                .parse()
                .context("PORT must be a valid port number")?,
        })
    }
}

/// Accepts a comma separated list or a JSON array of strings.
fn parse_list(value: Option<String>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    if let Ok(items) = serde_json::from_str::<Vec<String>>(&value) {
        return items;
    }
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(value: Option<String>) -> anyhow::Result<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => bail!("invalid boolean: {}", other),
    }
}
