use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError};

use chrono::{DateTime, Local};
use research_agent_core::tool::{Error as ToolError, Tool, ToolResult};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Where [`SaveTool`] writes unless told otherwise.
pub const DEFAULT_DESTINATION: &str = "research_output.txt";

/// Appends research notes to a text file.
///
/// Every call appends one timestamped block and nothing is ever rewritten,
/// so repeated calls leave repeated blocks. A block is written while holding
/// a process-wide lock keyed by the destination path, so blocks from
/// concurrent runs never interleave, even across separate tool instances.
#[derive(Clone, Debug)]
pub struct SaveTool {
    destination: PathBuf,
}

type FileLock = Arc<Mutex<()>>;

static FILE_LOCKS: LazyLock<std::sync::Mutex<HashMap<PathBuf, FileLock>>> =
    LazyLock::new(Default::default);

/// Returns the lock guarding appends to `path`.
fn lock_for(path: &Path) -> FileLock {
    let key = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut locks = FILE_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key).or_default())
}

impl SaveTool {
    /// Creates a save tool writing to [`DEFAULT_DESTINATION`].
    #[inline]
    pub fn new() -> Self {
        Self {
            destination: PathBuf::from(DEFAULT_DESTINATION),
        }
    }

    /// Sets the destination file.
    #[inline]
    pub fn with_destination<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.destination = path.into();
        self
    }

    /// Returns the destination file.
    #[inline]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Appends `payload` as one block to `destination`, creating the file
    /// if needed.
    pub fn append_to<P: Into<PathBuf>>(
        &self,
        destination: P,
        payload: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let destination = destination.into();
        let lock = lock_for(&destination);
        async move {
            let block = format_block(&payload, Local::now());
            let _guard = lock.lock().await;
            write_block(&destination, &block).await.map_err(|err| {
                ToolError::execution_error().with_reason(format!(
                    "failed to write {}: {err}",
                    destination.display()
                ))
            })?;
            debug!("saved {} bytes to {}", block.len(), destination.display());
            Ok(format!("Data saved to {}", destination.display()))
        }
    }
}

impl Default for SaveTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SaveTool {
    fn name(&self) -> &str {
        "save"
    }

    fn description(&self) -> &str {
        "Save research data to a text file. Input is the text to save."
    }

    #[inline]
    fn execute(
        &self,
        input: String,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        self.append_to(self.destination.clone(), input)
    }
}

fn format_block(payload: &str, timestamp: DateTime<Local>) -> String {
    format!(
        "--- Research Output ---\nTimestamp: {}\n\n{payload}\n\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
    )
}

async fn write_block(path: &Path, block: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(block.as_bytes()).await?;
    file.flush().await
}
