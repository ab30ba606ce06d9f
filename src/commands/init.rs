//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use std::path::PathBuf;
use tracing::{info, warn};

/// Create the config file and the queue database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<Config> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.paths.config_file.exists() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.base_dir.display().to_string(),
        ));
    }

    std::fs::create_dir_all(&config.paths.base_dir)?;
    config.validate()?;

    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    let db = MetaDb::connect(&config).await?;
    db.init_schema().await?;
    info!("Created database at {:?}", config.paths.db_file);

    if config.acquisition.oauth_token().is_none() && config.acquisition.session_cookie().is_none()
    {
        warn!(
            "Neither {} nor {} is set; processing will fail until one is",
            config.acquisition.token_env, config.acquisition.session_env
        );
    }
    if config.models.api_key().is_none() {
        warn!("{} is not set; processing will fail until it is", config.models.api_key_env);
    }

    Ok(config)
}

/// Print the post-init summary
pub fn print_init(config: &Config) {
    println!("✓ Initialized tubedigest at {:?}", config.paths.base_dir);
    println!("\nConfiguration: {:?}", config.paths.config_file);
    println!("Database: {:?}", config.paths.db_file);
    println!("\nNext steps:");
    println!(
        "  export {}=...   # or {}=...",
        config.acquisition.token_env, config.acquisition.session_env
    );
    println!("  export {}=...", config.models.api_key_env);
    println!("  tubedigest submit --file videos.json   # Queue candidates");
    println!("  tubedigest run                         # Process one cycle");
}
