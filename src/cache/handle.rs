use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, TryLockError};

use anyhow::{bail, Context, Result};
use log::debug;
use rusqlite::{Connection, OpenFlags};
use serde::{Serialize, Deserialize};

use crate::constants::DATABASE_PROBE_QUERY;

/// How a resolved file is held by the cache
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    PathOnly,
    OpenDatabase,
    OpenStream,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::PathOnly => write!(f, "path"),
            HandleKind::OpenDatabase => write!(f, "database"),
            HandleKind::OpenStream => write!(f, "stream"),
        }
    }
}

enum Resource {
    PathOnly,
    Database(Mutex<Connection>),
    Stream(Mutex<File>),
}

/// A resolved file plus the OS resource the cache keeps open for it.
///
/// The cache owns the resource; artifacts only borrow it through
/// [`FileHandle::with_database`] and [`FileHandle::with_stream`] for the
/// duration of their own processing call. Access to an open connection is
/// serialized by a mutex, and callers that need a connection of their own
/// use [`FileHandle::open_connection`].
///
/// A panic inside a borrowing call never disables the handle for later
/// artifacts: a poisoned lock is recovered, and while the shared resource
/// is still held (by a worker abandoned after a timeout) callers get a
/// private connection or file instead of waiting.
pub struct FileHandle {
    path: PathBuf,
    resource: Resource,
}

impl FileHandle {
    /// Keep only the path
    pub fn path_only(path: &Path) -> Self {
        FileHandle {
            path: path.to_path_buf(),
            resource: Resource::PathOnly,
        }
    }

    /// Open `path` as a read-only database, falling back to a binary stream
    /// and finally to a bare path.
    pub fn materialize(path: &Path) -> Self {
        if path.is_dir() {
            return Self::path_only(path);
        }

        if let Ok(conn) = open_connection(path) {
            return FileHandle {
                path: path.to_path_buf(),
                resource: Resource::Database(Mutex::new(conn)),
            };
        }

        match File::open(path) {
            Ok(file) => FileHandle {
                path: path.to_path_buf(),
                resource: Resource::Stream(Mutex::new(file)),
            },
            Err(_) => Self::path_only(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> HandleKind {
        match self.resource {
            Resource::PathOnly => HandleKind::PathOnly,
            Resource::Database(_) => HandleKind::OpenDatabase,
            Resource::Stream(_) => HandleKind::OpenStream,
        }
    }

    /// Run `f` against a read-only connection to this file.
    ///
    /// Uses the cached connection when it is free; path-only handles and
    /// busy handles get a connection opened for this call.
    pub fn with_database<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        match &self.resource {
            Resource::Database(conn) => match conn.try_lock() {
                Ok(guard) => f(&guard),
                Err(TryLockError::Poisoned(poisoned)) => {
                    debug!("Recovering database handle for {} after a panic", self.path.display());
                    conn.clear_poison();
                    f(&poisoned.into_inner())
                }
                Err(TryLockError::WouldBlock) => {
                    debug!("Database handle for {} is busy, opening a private connection", self.path.display());
                    let private = open_connection(&self.path)?;
                    f(&private)
                }
            },
            Resource::PathOnly => {
                let conn = open_connection(&self.path)?;
                f(&conn)
            }
            Resource::Stream(_) => bail!("{} is not an SQLite database", self.path.display()),
        }
    }

    /// Run `f` against a reader positioned at the start of this file
    pub fn with_stream<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        match &self.resource {
            Resource::Stream(file) => {
                let mut guard = match file.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::Poisoned(poisoned)) => {
                        debug!("Recovering stream handle for {} after a panic", self.path.display());
                        file.clear_poison();
                        poisoned.into_inner()
                    }
                    Err(TryLockError::WouldBlock) => {
                        debug!("Stream handle for {} is busy, opening the file again", self.path.display());
                        return self.with_private_stream(f);
                    }
                };
                guard.seek(SeekFrom::Start(0))
                    .with_context(|| format!("Failed to rewind {}", self.path.display()))?;
                let mut reader = BufReader::new(&mut *guard);
                f(&mut reader)
            }
            _ => self.with_private_stream(f),
        }
    }

    fn with_private_stream<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Read) -> Result<T>,
    {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        f(&mut reader)
    }

    /// Read the whole file
    pub fn read_all(&self) -> Result<Vec<u8>> {
        self.with_stream(|reader| {
            let mut buffer = Vec::new();
            reader.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    }

    /// Open a fresh read-only connection owned by the caller
    pub fn open_connection(&self) -> Result<Connection> {
        open_connection(&self.path)
    }

    /// Drop any open resource, keeping the path
    pub fn downgrade(&mut self) {
        self.resource = Resource::PathOnly;
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Open a read-only connection and prove the file really is a database
pub fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database {}", path.display()))?;

    conn.query_row(DATABASE_PROBE_QUERY, [], |_| Ok(()))
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(()),
            other => Err(other),
        })
        .with_context(|| format!("{} is not an SQLite database", path.display()))?;

    Ok(conn)
}
