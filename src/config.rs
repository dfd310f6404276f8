use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Rules applied to every password chosen at signup or password change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PasswordPolicy {
    pub min_len: usize,
    pub max_len: usize,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: 8,
            max_len: 128,
            require_digit: true,
            require_special: true,
        }
    }
}

impl PasswordPolicy {
    fn from_env() -> Self {
        let defaults = Self::default();
        let min_len = env_parse::<usize>("PASSWORD_MIN_LEN").unwrap_or(defaults.min_len);
        Self {
            min_len,
            max_len: env_parse::<usize>("PASSWORD_MAX_LEN")
                .filter(|v| *v >= min_len)
                .unwrap_or(defaults.max_len.max(min_len)),
            require_digit: env_parse::<bool>("PASSWORD_REQUIRE_DIGIT")
                .unwrap_or(defaults.require_digit),
            require_special: env_parse::<bool>("PASSWORD_REQUIRE_SPECIAL")
                .unwrap_or(defaults.require_special),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Origin allowed by the CORS layer (the web frontend).
    pub cors_origin: String,
    pub password: PasswordPolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mlog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mlog-users".into()),
            ttl_minutes: env_parse::<i64>("JWT_TTL_MINUTES")
                .filter(|v| *v > 0)
                .unwrap_or(60),
        };
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".into());
        Ok(Self {
            database_url,
            jwt,
            cors_origin,
            password: PasswordPolicy::from_env(),
        })
    }
}
