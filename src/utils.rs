//! Directory management following the XDG Base Directory specification
//!
//! # Directory Structure
//!
//! - Data: `~/.local/share/fwaudit/` - configuration and report snapshots
//! - State: `~/.local/state/fwaudit/` - audit log and diagnostic log
//!
//! # Example
//!
//! ```no_run
//! use fwaudit::utils::{ensure_dirs, get_data_dir};
//!
//! ensure_dirs().expect("Failed to create directories");
//!
//! if let Some(data_path) = get_data_dir() {
//!     println!("snapshots live under {}", data_path.join("reports").display());
//! }
//! ```

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "fwaudit", "fwaudit")
}

pub fn get_data_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.data_dir().to_path_buf())
}

/// Falls back to the data directory on platforms without a state directory
pub fn get_state_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| {
        pd.state_dir()
            .map_or_else(|| pd.data_dir().to_path_buf(), Path::to_path_buf)
    })
}

/// Creates `dir` and its parents, user-only on Unix
pub fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::fs::DirBuilder;
        use std::os::unix::fs::DirBuilderExt;

        let mut builder = DirBuilder::new();
        builder.mode(0o700);
        builder.recursive(true);
        builder.create(dir)
    }

    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

pub fn ensure_dirs() -> std::io::Result<()> {
    if let Some(dir) = get_data_dir() {
        create_private_dir(&dir)?;
    }
    if let Some(dir) = get_state_dir() {
        create_private_dir(&dir)?;
    }
    Ok(())
}

/// Writes `contents` to `path` atomically with user-only permissions.
///
/// Data goes to `<path>.tmp` first, is flushed to disk, then renamed over the
/// target.
pub async fn write_private_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600) // Set permissions BEFORE any data is written
            .open(&temp_path)
            .await?;

        file.write_all(contents).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("Disk full: cannot write {}. Free up space and try again.", path.display()),
            )
        } else {
            e
        }
    })
}
