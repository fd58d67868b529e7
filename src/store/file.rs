//! Durable append-only backend storing one JSON row per line.
//!
//! The file is replayed into a [`MemoryBackend`] index when opened; queries are
//! answered from the index and every `put` appends a single line. A line left
//! unterminated by a crash or a failed write is closed off with `\n` before the
//! next append, so it stays one skipped line and never swallows a later row.

use super::backend::{KeyRange, StoreBackend, StoredRow};
use super::memory::MemoryBackend;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// JSON-lines file backend.
#[derive(Debug)]
pub struct JsonlBackend {
    path: PathBuf,
    log: Mutex<LogFile>,
    index: MemoryBackend,
    replay_errors: u64,
}

#[derive(Debug)]
struct LogFile {
    file: File,
    /// The file does not end with `\n`.
    torn: bool,
}

impl LogFile {
    async fn seal(&mut self) -> std::io::Result<()> {
        if self.torn {
            self.file.write_all(b"\n").await?;
            self.file.flush().await?;
            self.torn = false;
        }
        Ok(())
    }
}

impl JsonlBackend {
    /// Open (or create) the log at `path`, replaying any existing rows.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let index = MemoryBackend::new();
        let mut replay_errors = 0;
        let mut replayed = 0;
        let mut torn = false;

        match fs::read(&path).await {
            Ok(bytes) => {
                torn = bytes.last().is_some_and(|&last| last != b'\n');
                let contents = String::from_utf8_lossy(&bytes);
                for (line_no, line) in contents.lines().enumerate() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Ok(row) => {
                            index.put(row).await?;
                            replayed += 1;
                        }
                        Err(e) => {
                            warn!("Skipping line {} of {}: {}", line_no + 1, path.display(), e);
                            replay_errors += 1;
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let mut log = LogFile { file, torn };
        if log.torn {
            warn!("{} ends with an unterminated line", path.display());
            log.seal().await?;
        }

        info!(
            "Opened store log {} ({} rows, {} skipped)",
            path.display(),
            replayed,
            replay_errors
        );

        Ok(Self {
            path,
            log: Mutex::new(log),
            index,
            replay_errors,
        })
    }

    /// Lines skipped during replay because they were not valid rows.
    pub fn replay_errors(&self) -> u64 {
        self.replay_errors
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_line(line: &str) -> Result<StoredRow> {
    let item: Map<String, Value> =
        serde_json::from_str(line).map_err(|e| RelayError::decode_failure("log line", e))?;
    StoredRow::from_item(item)
}

#[async_trait]
impl StoreBackend for JsonlBackend {
    async fn put(&self, row: StoredRow) -> Result<()> {
        let mut line = serde_json::to_string(&row.item)
            .map_err(|e| RelayError::storage_error(format!("Failed to encode row: {}", e)))?;
        line.push('\n');

        // Holding the file lock across the index update keeps the index in log order.
        let mut log = self.log.lock().await;
        log.seal().await?;
        let written = match log.file.write_all(line.as_bytes()).await {
            Ok(()) => log.file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            // Part of the line may have reached the file.
            log.torn = true;
            if log.seal().await.is_err() {
                warn!("Could not terminate partial line in {}", self.path.display());
            }
            return Err(RelayError::storage_error(format!(
                "Failed to append to {}: {}",
                self.path.display(),
                e
            )));
        }
        debug!("Appended row {}/{}", row.partition, row.sort_key);
        self.index.put(row).await
    }

    async fn query(&self, partition: &str, range: KeyRange) -> Result<Vec<StoredRow>> {
        self.index.query(partition, range).await
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
