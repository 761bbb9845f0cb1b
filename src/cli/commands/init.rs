//! Implementation of the `foilopt init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{database_url, initialize_database};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file and database
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub config_written: Option<PathBuf>,
    pub database_initialized: Option<PathBuf>,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if let Some(path) = &self.config_written {
            lines.push(format!("  config:   {}", path.display()));
        }
        if let Some(path) = &self.database_initialized {
            lines.push(format!("  database: {}", path.display()));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };
    let out = initialize(&target, args.force).await?;
    output(&out, json_mode);
    Ok(())
}

/// Lay out `.foilopt/` under `target` with default settings.
pub async fn initialize(target: &std::path::Path, force: bool) -> Result<InitOutput> {
    let config_dir = target.join(CONFIG_DIR);
    let config_path = config_dir.join("config.yaml");

    if config_path.exists() && !force {
        return Ok(InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target.to_path_buf(),
            config_written: None,
            database_initialized: None,
        });
    }

    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config = Config::default();
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize default config")?;
    fs::write(&config_path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let db_path = target.join(&config.database.path);
    if force && db_path.exists() {
        fs::remove_file(&db_path)
            .await
            .with_context(|| format!("Failed to remove {}", db_path.display()))?;
    }
    let pool = initialize_database(&database_url(&db_path.to_string_lossy()), None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    Ok(InitOutput {
        success: true,
        message: format!("Initialized foilopt project in {}", target.display()),
        initialized_path: target.to_path_buf(),
        config_written: Some(config_path),
        database_initialized: Some(db_path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let out = initialize(dir.path(), false).await.unwrap();
        assert!(out.success);
        assert!(dir.path().join(".foilopt/foilopt.db").exists());

        let loaded = ConfigLoader::load_from_file(dir.path().join(".foilopt/config.yaml")).unwrap();
        assert_eq!(loaded.search, Config::default().search);
    }

    #[tokio::test]
    async fn test_init_twice_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        initialize(dir.path(), false).await.unwrap();
        assert!(!initialize(dir.path(), false).await.unwrap().success);
        assert!(initialize(dir.path(), true).await.unwrap().success);
    }
}
