use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;
use std::time::Duration;

use foodlog_core::store::{Capabilities, KvLocation, StoreOptions};

/// Which storage backends the store may probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// SQLite file, falling back to the key-value directory.
    Auto,
    Sqlite,
    /// In-process SQLite; nothing survives the command.
    Memory,
    Kv,
}

impl std::str::FromStr for BackendChoice {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(BackendChoice::Auto),
            "sqlite" | "native" => Ok(BackendChoice::Sqlite),
            "memory" => Ok(BackendChoice::Memory),
            "kv" | "key-value" => Ok(BackendChoice::Kv),
            other => bail!("Unknown backend '{other}'. Use auto, sqlite, memory or kv"),
        }
    }
}

pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub kv_dir: PathBuf,
    pub permissions_path: PathBuf,
    pub pictures_dir: Option<PathBuf>,
    pub backend: BackendChoice,
    /// Shell command that saves a photo to `{output}`.
    pub camera_cmd: Option<String>,
    pub timeout: Duration,
}

impl Config {
    pub fn load(backend: Option<BackendChoice>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "foodlog").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let pictures_dir = UserDirs::new().and_then(|d| d.picture_dir().map(PathBuf::from));

        Self::resolve(data_dir, pictures_dir, backend, |key| std::env::var(key).ok())
    }

    /// Build the config from a data directory and an environment lookup.
    /// An explicit `backend` wins over `FOODLOG_BACKEND`.
    pub fn resolve(
        data_dir: PathBuf,
        pictures_dir: Option<PathBuf>,
        backend: Option<BackendChoice>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let backend = match backend {
            Some(choice) => choice,
            None => env("FOODLOG_BACKEND")
                .map(|v| v.parse::<BackendChoice>())
                .transpose()
                .context("Invalid FOODLOG_BACKEND")?
                .unwrap_or(BackendChoice::Auto),
        };

        let timeout = match env("FOODLOG_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().with_context(|| {
                    format!("Invalid FOODLOG_TIMEOUT_SECS '{raw}'. Use a whole number of seconds")
                })?;
                if secs == 0 {
                    bail!("FOODLOG_TIMEOUT_SECS must be greater than 0");
                }
                Duration::from_secs(secs)
            }
            None => StoreOptions::default().timeout,
        };

        let camera_cmd = env("FOODLOG_CAMERA_CMD").filter(|c| !c.trim().is_empty());

        Ok(Config {
            db_path: data_dir.join("foodlog.db"),
            kv_dir: data_dir.join("kv"),
            permissions_path: data_dir.join("permissions"),
            data_dir,
            pictures_dir,
            backend,
            camera_cmd,
            timeout,
        })
    }

    /// What the store is allowed to probe. `auto` never falls back to
    /// in-memory storage, which would silently lose entries on exit.
    pub fn capabilities(&self) -> Capabilities {
        let native = Some(self.db_path.clone());
        let key_value = Some(KvLocation::Dir(self.kv_dir.clone()));
        match self.backend {
            BackendChoice::Auto => Capabilities {
                native,
                relational: false,
                key_value,
            },
            BackendChoice::Sqlite => Capabilities {
                native,
                ..Capabilities::default()
            },
            BackendChoice::Memory => Capabilities {
                relational: true,
                ..Capabilities::default()
            },
            BackendChoice::Kv => Capabilities {
                key_value,
                ..Capabilities::default()
            },
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            timeout: self.timeout,
        }
    }
}
