use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Lifetime of a session token. Sessions end on logout; this only bounds a leaked token.
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub reset_link_base: String,
    pub admin_emails: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "enrollboard".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "enrollboard-staff".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 30),
            reset_ttl_minutes: env_or("RESET_TTL_MINUTES", 60),
        };
        Ok(Self {
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            jwt,
            reset_link_base: std::env::var("RESET_LINK_BASE")
                .unwrap_or_else(|_| "http://localhost:3000/reset-password".into()),
            admin_emails: parse_admin_emails(
                &std::env::var("ADMIN_EMAILS").unwrap_or_default(),
            ),
        })
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.iter().any(|a| a == email)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

pub(crate) fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_emails_are_trimmed_and_lowercased() {
        let emails = parse_admin_emails(" Registrar@School.edu ,, head@school.edu ");
        assert_eq!(emails, vec!["registrar@school.edu", "head@school.edu"]);
    }

    #[test]
    fn empty_admin_list() {
        assert!(parse_admin_emails("").is_empty());
    }
}
