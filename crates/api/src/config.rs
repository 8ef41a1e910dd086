//! Process configuration, read from the environment.

/// Runtime settings for the API process.
///
/// Everything has a dev-friendly default so `jobhub-api` starts with no
/// environment at all (with loud warnings where that is insecure).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    /// Session token lifetime, minutes.
    pub access_token_lifetime_min: i64,
    /// Password KDF work factor.
    pub bcrypt_cost: u32,
    /// Executor worker pool size.
    pub worker_count: usize,
    /// Hard cap on one payload execution, seconds.
    pub execution_timeout_secs: u64,
    /// Artificial delay of the built-in payload handler, milliseconds.
    pub simulated_execution_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: "dev-secret".to_string(),
            access_token_lifetime_min: 60,
            bcrypt_cost: jobhub_auth::password::DEFAULT_COST,
            worker_count: 5,
            execution_timeout_secs: 30,
            simulated_execution_ms: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            defaults.jwt_secret.clone()
        });

        Self {
            port: env_parse("PORT", defaults.port),
            jwt_secret,
            access_token_lifetime_min: env_parse(
                "ACCESS_TOKEN_LIFETIME_MIN",
                defaults.access_token_lifetime_min,
            ),
            bcrypt_cost: env_parse("BCRYPT_COST", defaults.bcrypt_cost),
            worker_count: env_parse("JOB_WORKER_COUNT", defaults.worker_count),
            execution_timeout_secs: env_parse(
                "JOB_EXECUTION_TIMEOUT_SECS",
                defaults.execution_timeout_secs,
            ),
            simulated_execution_ms: env_parse(
                "JOB_SIMULATED_EXECUTION_MS",
                defaults.simulated_execution_ms,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw, "unparseable env var; using default");
            default
        }),
        Err(_) => default,
    }
}
