use serde::Deserialize;

/// Deployment environment. Governs cookie `Secure` attributes and whether
/// verify/reset links may be returned directly in responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
}

/// Settings for the HTTP mail API transport. When absent from the
/// environment, verify/reset flows fall back to dev-mode links.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub refresh_ttl_days: i64,
    pub environment: Environment,
    pub app_base_url: String,
    pub cors_origins: Vec<String>,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "devboard".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "devboard-users".into()),
            access_ttl_minutes: std::env::var("ACCESS_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(15),
        };
        let refresh_ttl_days = std::env::var("REFRESH_TTL_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7);
        let app_base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_string();
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        // All three mail vars must be present for the transport to count
        // as configured.
        let mail = match (
            std::env::var("MAIL_API_URL"),
            std::env::var("MAIL_API_KEY"),
            std::env::var("MAIL_FROM"),
        ) {
            (Ok(api_url), Ok(api_key), Ok(from_address)) => Some(MailConfig {
                api_url,
                api_key,
                from_address,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            refresh_ttl_days,
            environment: Environment::from_env(),
            app_base_url,
            cors_origins,
            mail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_flag_parses() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_production());
    }
}
