use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::TempDir;
use tracing::{debug, warn};

/// Owns every directory created while injecting assets: staging areas and
/// build contexts.
///
/// Context directories must outlive the build that consumes them, so nothing
/// is removed until [`teardown`](Self::teardown) runs. Teardown happens once,
/// no matter how many injections registered directories. Dropping an
/// un-torn-down janitor tears it down and logs failures.
#[derive(Debug, Default)]
pub struct Janitor {
    state: Mutex<JanitorState>,
}

#[derive(Debug, Default)]
struct JanitorState {
    staging: Vec<TempDir>,
    contexts: Vec<PathBuf>,
    torn_down: bool,
}

impl Janitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh private staging directory under `root`.
    pub async fn staging_dir(&self, root: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(root).await?;
        let root = root.to_path_buf();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("infuse-").tempdir_in(root)
        })
        .await
        .map_err(std::io::Error::other)??;
        let path = dir.path().to_path_buf();
        self.lock().staging.push(dir);
        Ok(path)
    }

    /// Registers a context directory for removal at teardown.
    pub fn track_context(&self, dir: &Path) {
        let mut state = self.lock();
        if !state.contexts.iter().any(|known| known == dir) {
            state.contexts.push(dir.to_path_buf());
        }
    }

    pub fn contexts(&self) -> Vec<PathBuf> {
        self.lock().contexts.clone()
    }

    /// Removes every registered directory. Subsequent calls are no-ops.
    ///
    /// All directories are attempted; the first failure is returned.
    pub fn teardown(&self) -> std::io::Result<()> {
        let (staging, contexts) = {
            let mut state = self.lock();
            if state.torn_down {
                return Ok(());
            }
            state.torn_down = true;
            (
                std::mem::take(&mut state.staging),
                std::mem::take(&mut state.contexts),
            )
        };

        let mut first_error = None;
        for dir in staging {
            debug!(path = %dir.path().display(), "removing staging directory");
            if let Err(e) = dir.close() {
                first_error.get_or_insert(e);
            }
        }
        for dir in contexts {
            debug!(path = %dir.display(), "removing build context");
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JanitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!(error = %e, "failed to clean up injection directories");
        }
    }
}
