use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub upload_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub notify_webhook_url: Option<String>,
    pub notify_timeout: Duration,
    /// Keep rejected revisions in the in-review listing.
    pub in_review_includes_rejected: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://thesis_review.db".to_string());
        let database_max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?;

        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let upload_folder = base_dir.join(
            std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".to_string()),
        );

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 5001u16)?;

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let notify_timeout = Duration::from_secs(parse_var("NOTIFY_TIMEOUT_SECS", 10u64)?);

        let in_review_includes_rejected = match std::env::var("IN_REVIEW_INCLUDES_REJECTED") {
            Ok(raw) => parse_flag(&raw).ok_or_else(|| {
                Error::Config(format!("IN_REVIEW_INCLUDES_REJECTED: '{}' is not a boolean", raw))
            })?,
            Err(_) => true,
        };

        Ok(Self {
            database_url,
            database_max_connections,
            upload_folder,
            host,
            port,
            notify_webhook_url,
            notify_timeout,
            in_review_includes_rejected,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{}: '{}' is not valid", name, raw))),
        Err(_) => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
