//! File drop directory for incoming statements.
//!
//! Pending files sit at the top level of the directory. After handling, a
//! file is moved to `processed/` or `failed/` so it is never picked up
//! twice by the same worker.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

const PROCESSED_DIR: &str = "processed";
const FAILED_DIR: &str = "failed";

/// A pending statement file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFile {
    /// Full path of the file.
    pub path: PathBuf,
    /// File name, used for logging.
    pub name: String,
    /// UTF-8 contents.
    pub contents: String,
}

/// Directory polled for camt statement files.
#[derive(Debug, Clone)]
pub struct StatementDirectory {
    root: PathBuf,
}

impl StatementDirectory {
    /// Creates a source for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The polled directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads every pending `.xml` file, ordered by name.
    ///
    /// A missing directory is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from listing or reading the directory.
    pub async fn drain(&self) -> io::Result<Vec<StatementFile>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(dir = %self.root.display(), "Statement directory does not exist yet");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let mut paths = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_xml = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
            if entry.file_type().await?.is_file() && is_xml {
                paths.push(path);
            }
        }
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path).await?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            files.push(StatementFile {
                path,
                name,
                contents,
            });
        }
        if !files.is_empty() {
            info!(dir = %self.root.display(), files = files.len(), "Found statement files");
        }
        Ok(files)
    }

    /// Moves a handled file to `processed/`.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from creating the folder or moving the file.
    pub async fn mark_processed(&self, file: &StatementFile) -> io::Result<PathBuf> {
        self.move_into(file, PROCESSED_DIR).await
    }

    /// Moves an unreadable file to `failed/`.
    ///
    /// # Errors
    ///
    /// Returns I/O errors from creating the folder or moving the file.
    pub async fn mark_failed(&self, file: &StatementFile) -> io::Result<PathBuf> {
        self.move_into(file, FAILED_DIR).await
    }

    async fn move_into(&self, file: &StatementFile, folder: &str) -> io::Result<PathBuf> {
        let target_dir = self.root.join(folder);
        fs::create_dir_all(&target_dir).await?;
        let target = target_dir.join(&file.name);
        fs::rename(&file.path, &target).await?;
        debug!(file = %file.name, folder, "Moved statement file");
        Ok(target)
    }
}
