//! Durable, append-only record of authorized groups.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One authorization as written to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub group_id: String,
    /// Whitelisted sender whose message authorized the group.
    pub granted_by: String,
    /// RFC 3339 timestamp.
    pub granted_at: String,
}

impl Grant {
    pub fn now(group_id: &str, granted_by: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            granted_by: granted_by.to_string(),
            granted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Errors reading or writing the durable record.
#[derive(Debug)]
pub enum PersistenceError {
    Io { path: PathBuf, source: std::io::Error },
    Encode(serde_json::Error),
    Sqlite(rusqlite::Error),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "grant log I/O error on '{}': {}", path.display(), source)
            }
            Self::Encode(e) => write!(f, "failed to encode grant: {e}"),
            Self::Sqlite(e) => write!(f, "grant database error: {e}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
            Self::Sqlite(e) => Some(e),
        }
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// Backing storage for [`AuthorizationStore`](super::AuthorizationStore).
///
/// `append` must not return `Ok` until the grant is durable.
pub trait GrantLog: Send + Sync {
    fn append(&self, grant: &Grant) -> Result<(), PersistenceError>;

    /// Every group id ever appended. Order is unspecified; duplicates are allowed.
    fn read_all(&self) -> Result<Vec<String>, PersistenceError>;
}

/// JSON-lines file, one grant per line.
///
/// Lines holding only a bare group id are also accepted when reading.
pub struct FileGrantLog {
    path: PathBuf,
}

impl FileGrantLog {
    /// Open the log at `path`. The file itself is created on first append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_err(&path, e))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GrantLog for FileGrantLog {
    /// Append one line and sync it.
    ///
    /// A partial last line left by an earlier failed write is terminated
    /// first, and a failed write is truncated back to the previous length, so
    /// a retry always lands on a line of its own.
    fn append(&self, grant: &Grant) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_string(grant).map_err(PersistenceError::Encode)?;
        line.push('\n');

        let created = !self.path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| io_err(&self.path, e))?;
        let len = file.metadata().map_err(|e| io_err(&self.path, e))?.len();

        if ends_with_partial_line(&mut file, len).map_err(|e| io_err(&self.path, e))? {
            warn!("Grant log {:?} ends with a partial line, terminating it", self.path);
            line.insert(0, '\n');
        }

        let written = file
            .write_all(line.as_bytes())
            .and_then(|()| file.sync_data())
            .and_then(|()| if created { sync_parent_dir(&self.path) } else { Ok(()) });
        if let Err(e) = written {
            if let Err(truncate) = file.set_len(len) {
                warn!("Failed to roll back grant log {:?}: {truncate}", self.path);
            }
            return Err(io_err(&self.path, e));
        }

        debug!("Appended grant for {} to {:?}", grant.group_id, self.path);
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, PersistenceError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.path, e)),
        };

        let mut groups = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('{') {
                match serde_json::from_str::<Grant>(line) {
                    Ok(grant) => groups.push(grant.group_id),
                    Err(e) => warn!("Skipping unreadable grant on line {}: {e}", i + 1),
                }
            } else {
                groups.push(line.to_string());
            }
        }
        Ok(groups)
    }
}

fn ends_with_partial_line(file: &mut File, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Persist the directory entry of a newly created file.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir,
        None => Path::new("."),
    };
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn io_err(path: &Path, source: std::io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}
