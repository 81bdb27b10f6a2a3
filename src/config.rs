use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_SCHOOL_DATA_PATH: &str = "data/school_data.json";
pub const DEFAULT_ADMIN_ROLES_PATH: &str = "data/admin_roles.json";

/// Process configuration read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub school_data_path: PathBuf,
    pub admin_roles_path: PathBuf,
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Self {
            school_data_path: non_empty("SCHOOL_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHOOL_DATA_PATH)),
            admin_roles_path: non_empty("ADMIN_ROLES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ADMIN_ROLES_PATH)),
            database_url: non_empty("DATABASE_URL"),
        }
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}
