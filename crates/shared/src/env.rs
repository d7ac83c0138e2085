use std::path::{Path, PathBuf};

use anyhow::Context;

// Called before logging is configured; failures are returned, not logged.

fn traverse_up_for_env_file(file_name: &str) -> Option<PathBuf> {
    let relative_workspace_root = PathBuf::from("./../../").join(file_name);

    if PathBuf::from(file_name).exists() {
        Some(PathBuf::from(file_name))
    } else if relative_workspace_root.exists() {
        Some(relative_workspace_root)
    } else {
        None
    }
}

fn load_optional_env_file(path: Option<&Path>) -> Result<(), anyhow::Error> {
    let Some(path) = path else {
        return Ok(());
    };

    dotenv::from_filename(path).with_context(|| {
        format!(
            "Failed to load environment variables from {}",
            path.display()
        )
    })?;
    Ok(())
}

/// Loads `.env` then `.env.secrets`, from the working directory or the workspace root.
/// Variables already present in the process environment win.
pub fn load_optional_env_files() -> Result<(), anyhow::Error> {
    load_optional_env_file(traverse_up_for_env_file(".env").as_deref())?;
    load_optional_env_file(traverse_up_for_env_file(".env.secrets").as_deref())?;
    Ok(())
}

pub fn configure_env() -> Result<(), anyhow::Error> {
    load_optional_env_files()
}
