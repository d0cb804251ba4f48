use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::DEFAULT_TTL;
use crate::error::{GradebookError, Result};

const DEFAULT_CONFIG_NAME: &str = "gradebook.toml";
const CONFIG_ENV_VAR: &str = "GRADEBOOK_CONFIG";
const DATABASE_URL_ENV_VAR: &str = "DATABASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradebookConfig {
    pub store: StoreConfig,
    pub workbook: WorkbookConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkbookConfig {
    pub grades_sheet: String,
    pub windows_sheet: String,
}

impl Default for WorkbookConfig {
    fn default() -> Self {
        Self {
            grades_sheet: "Notas_Tabela".to_string(),
            windows_sheet: "Controle_Liberacao".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL.as_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "gradebook_sheets=info".to_string(),
        }
    }
}

impl GradebookConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (resolved, explicit) = resolve_path(path);
        let mut config = if resolved.exists() || explicit {
            let content = fs::read_to_string(&resolved).map_err(|err| {
                GradebookError::Configuration(format!("{}: {err}", resolved.display()))
            })?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        if let Ok(url) = env::var(DATABASE_URL_ENV_VAR) {
            if !url.trim().is_empty() {
                config.store.database_url = Some(url);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|err| GradebookError::Configuration(format!("config parse error: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.workbook.grades_sheet.trim().is_empty() {
            return Err(GradebookError::Configuration(
                "workbook.grades_sheet must be non-empty".to_string(),
            ));
        }
        if self.workbook.windows_sheet.trim().is_empty() {
            return Err(GradebookError::Configuration(
                "workbook.windows_sheet must be non-empty".to_string(),
            ));
        }
        if self.workbook.grades_sheet == self.workbook.windows_sheet {
            return Err(GradebookError::Configuration(
                "grade and release window sheets must differ".to_string(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(GradebookError::Configuration(
                "store.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_url(&self) -> Result<&str> {
        self.store.database_url.as_deref().ok_or_else(|| {
            GradebookError::Configuration(
                "DATABASE_URL must be set to a production Postgres instance".to_string(),
            )
        })
    }
}

fn resolve_path(path: Option<&Path>) -> (PathBuf, bool) {
    if let Some(path) = path {
        return (path.to_path_buf(), true);
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        return (PathBuf::from(env_path), true);
    }
    (PathBuf::from(DEFAULT_CONFIG_NAME), false)
}
