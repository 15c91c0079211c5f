use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

/// Configuración leída del entorno al arrancar. El token del bot lo toma
/// teloxide directamente de TELOXIDE_TOKEN.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub payments_base_url: String,
    pub payments_secret_key: String,
    pub commission_percent: u32,
    pub admin_telegram_ids: Vec<i64>,
}

impl Config {
    pub fn from_env() -> Result<Config, AppError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::config("DATABASE_URL not set"))?;
        let payments_base_url = env::var("PAYMENTS_BASE_URL")
            .map_err(|_| AppError::config("PAYMENTS_BASE_URL not set"))?;
        let payments_secret_key = env::var("PAYMENTS_SECRET_KEY")
            .map_err(|_| AppError::config("PAYMENTS_SECRET_KEY not set"))?;

        let commission_percent = match env::var("COMMISSION_PERCENT") {
            Ok(raw) => parse_percent(&raw)
                .ok_or_else(|| AppError::config("COMMISSION_PERCENT must be 0-100"))?,
            Err(_) => 15,
        };

        let admin_telegram_ids = match env::var("ADMIN_TELEGRAM_IDS") {
            Ok(raw) => parse_admin_ids(&raw),
            Err(_) => vec![],
        };

        Ok(Config {
            database_url,
            payments_base_url,
            payments_secret_key,
            commission_percent,
            admin_telegram_ids,
        })
    }
}

fn parse_percent(raw: &str) -> Option<u32> {
    let value = raw.trim().parse::<u32>().ok()?;
    if value <= 100 {
        Some(value)
    } else {
        None
    }
}

/// Lista separada por comas, ej. "12345,67890".
fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_admin_ids_skips_garbage() {
        assert_eq!(parse_admin_ids("123, 456"), vec![123, 456]);
        assert_eq!(parse_admin_ids("123,abc, 789 "), vec![123, 789]);
        assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
    }

    #[test]
    fn parse_percent_bounds() {
        assert_eq!(parse_percent("15"), Some(15));
        assert_eq!(parse_percent(" 0 "), Some(0));
        assert_eq!(parse_percent("100"), Some(100));
        assert_eq!(parse_percent("101"), None);
        assert_eq!(parse_percent("quince"), None);
    }
}
