use crate::errors::{AppError, AppResult};
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "Benutzerverwaltung";
pub const DATABASE_FILE: &str = "users.db";
pub const LOCK_FILE: &str = "benutzerverwaltung.lock";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_PORT_ATTEMPTS: u16 = 10;
const DEFAULT_BROWSER_DELAY_MS: u64 = 1500;

const ENV_DATA_DIR: &str = "BENUTZERVERWALTUNG_DATA_DIR";
const ENV_DB: &str = "BENUTZERVERWALTUNG_DB";
const ENV_LOCK: &str = "BENUTZERVERWALTUNG_LOCK";
const ENV_HOST: &str = "BENUTZERVERWALTUNG_HOST";
const ENV_PORT: &str = "BENUTZERVERWALTUNG_PORT";
const ENV_PORT_ATTEMPTS: &str = "BENUTZERVERWALTUNG_PORT_ATTEMPTS";
const ENV_BROWSER_DELAY_MS: &str = "BENUTZERVERWALTUNG_BROWSER_DELAY_MS";
const ENV_NO_BROWSER: &str = "BENUTZERVERWALTUNG_NO_BROWSER";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub lock_path: PathBuf,
    pub host: String,
    pub preferred_port: u16,
    pub port_attempts: u16,
    pub browser_delay: Duration,
    pub open_browser: bool,
}

impl AppConfig {
    pub fn resolve() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let data_dir = value(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_dir(&lookup));
        let database_path = value(ENV_DB)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(DATABASE_FILE));
        let lock_path = value(ENV_LOCK)
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join(LOCK_FILE));

        Self {
            host: value(ENV_HOST)
                .map(|host| host.trim().to_string())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            preferred_port: value(ENV_PORT)
                .and_then(|raw| raw.trim().parse::<u16>().ok())
                .filter(|port| *port > 0)
                .unwrap_or(DEFAULT_PORT),
            port_attempts: value(ENV_PORT_ATTEMPTS)
                .and_then(|raw| raw.trim().parse::<u16>().ok())
                .unwrap_or(DEFAULT_PORT_ATTEMPTS)
                .max(1),
            browser_delay: Duration::from_millis(
                value(ENV_BROWSER_DELAY_MS)
                    .and_then(|raw| raw.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_BROWSER_DELAY_MS),
            ),
            open_browser: value(ENV_NO_BROWSER).is_none(),
            data_dir,
            database_path,
            lock_path,
        }
    }

    pub fn url(&self, port: u16) -> String {
        match self.host.parse::<Ipv6Addr>() {
            Ok(_) => format!("http://[{}]:{}", self.host, port),
            Err(_) => format!("http://{}:{}", self.host, port),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    pub fn ensure_data_dir(&self) -> AppResult<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|err| {
            AppError::Io(format!(
                "failed to create data directory {}: {}",
                self.data_dir.display(),
                err
            ))
        })
    }
}

fn default_data_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let home = home_dir(lookup).unwrap_or_else(|| PathBuf::from("."));
    platform_data_dir(&home)
}

fn home_dir<F>(lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    #[cfg(windows)]
    {
        if let Some(home) = lookup("USERPROFILE").filter(|value| !value.is_empty()) {
            return Some(PathBuf::from(home));
        }
    }

    lookup("HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(any(windows, target_os = "macos"))]
fn platform_data_dir(home: &Path) -> PathBuf {
    home.join("Documents").join(APP_NAME)
}

#[cfg(not(any(windows, target_os = "macos")))]
fn platform_data_dir(home: &Path) -> PathBuf {
    home.join(".local").join("share").join(APP_NAME)
}
