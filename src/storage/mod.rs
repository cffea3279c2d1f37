use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::VaultOptions;

pub const NOTE_EXTENSION: &str = "md";
const TEMP_PREFIX: &str = ".termnote-";
const TEMP_SUFFIX: &str = ".tmp";
#[cfg(unix)]
const VAULT_DIR_MODE: u32 = 0o750;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("a note named '{name}' already exists")]
    AlreadyExists { name: String },
    #[error("note '{name}' no longer exists")]
    NotFound { name: String },
    #[error("invalid note name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("cannot read vault {}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to {op} {}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type VaultResult<T> = std::result::Result<T, VaultError>;

/// One note as it appears in the vault listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEntry {
    pub name: String,
    pub modified: OffsetDateTime,
}

/// Reference to a single note file, held while the note is open for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteHandle {
    name: String,
    path: PathBuf,
}

impl NoteHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct Vault {
    root: Arc<PathBuf>,
}

impl Vault {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Non-directory entries of the vault, sorted by file name. Dotfiles are
    /// skipped so an interrupted save never shows up as a note.
    pub fn list_notes(&self) -> VaultResult<Vec<NoteEntry>> {
        let dir = fs::read_dir(&*self.root).map_err(|source| VaultError::Unreadable {
            path: self.root.to_path_buf(),
            source,
        })?;

        let mut notes = Vec::new();
        for entry in dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::debug!(?err, "skipping unreadable vault entry");
                    continue;
                }
            };
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::debug!(?raw, "skipping vault entry with non UTF-8 name");
                    continue;
                }
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    tracing::debug!(?err, %name, "skipping vault entry without metadata");
                    continue;
                }
            };
            if metadata.is_dir() {
                continue;
            }
            let modified = match metadata.modified() {
                Ok(modified) => OffsetDateTime::from(modified),
                Err(err) => {
                    tracing::debug!(?err, %name, "skipping vault entry without mtime");
                    continue;
                }
            };
            notes.push(NoteEntry { name, modified });
        }

        notes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(notes)
    }

    /// Creates `<vault>/<name>.md` as an empty file. Existing notes are never
    /// touched.
    pub fn create_note(&self, name: &str) -> VaultResult<NoteHandle> {
        let name = validate_name(name)?;
        let file_name = format!("{name}.{NOTE_EXTENSION}");
        let path = self.root.join(&file_name);

        if fs::symlink_metadata(&path).is_ok() {
            return Err(VaultError::AlreadyExists { name: file_name });
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::AlreadyExists { name: file_name });
            }
            Err(source) => {
                return Err(VaultError::Io {
                    op: "create",
                    path,
                    source,
                });
            }
        }

        tracing::debug!(note = %file_name, "created note");
        Ok(NoteHandle {
            name: file_name,
            path,
        })
    }

    /// Reads a note by its file name and checks that it can be written back.
    /// The name is used verbatim, as `list_notes` reported it.
    pub fn open_note(&self, file_name: &str) -> VaultResult<(String, NoteHandle)> {
        check_name(file_name, file_name)?;
        let path = self.root.join(file_name);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(VaultError::NotFound {
                    name: file_name.to_string(),
                });
            }
            Err(source) => {
                return Err(VaultError::Io {
                    op: "read",
                    path,
                    source,
                });
            }
        };

        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => VaultError::NotFound {
                    name: file_name.to_string(),
                },
                _ => VaultError::Io {
                    op: "open for writing",
                    path: path.clone(),
                    source,
                },
            })?;

        tracing::debug!(note = %file_name, bytes = content.len(), "opened note");
        Ok((
            content,
            NoteHandle {
                name: file_name.to_string(),
                path,
            },
        ))
    }

    /// Replaces the note's content through a temporary file in the vault and
    /// an atomic rename. On failure the note on disk is left untouched.
    pub fn save_note(&self, handle: &NoteHandle, content: &str) -> VaultResult<()> {
        let io_error = |op: &'static str| {
            let path = handle.path.clone();
            move |source: io::Error| VaultError::Io { op, path, source }
        };

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&*self.root)
            .map_err(io_error("create a temporary file for"))?;
        temp.write_all(content.as_bytes())
            .map_err(io_error("write"))?;
        temp.as_file().sync_all().map_err(io_error("sync"))?;

        if let Ok(metadata) = fs::metadata(&handle.path) {
            if let Err(err) = temp.as_file().set_permissions(metadata.permissions()) {
                tracing::debug!(?err, note = %handle.name, "could not carry over note permissions");
            }
        }

        temp.persist(&handle.path)
            .map_err(|err| io_error("replace")(err.error))?;

        tracing::debug!(note = %handle.name, bytes = content.len(), "saved note");
        Ok(())
    }
}

fn validate_name(raw: &str) -> VaultResult<&str> {
    let name = raw.trim();
    check_name(raw, name)?;
    Ok(name)
}

fn check_name(raw: &str, name: &str) -> VaultResult<()> {
    let invalid = |reason| VaultError::InvalidName {
        name: raw.to_string(),
        reason,
    };
    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    // dotfiles are hidden from the listing
    if name.starts_with('.') {
        return Err(invalid("name cannot start with '.'"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name cannot contain path separators"));
    }
    if name.contains('\0') {
        return Err(invalid("name cannot contain NUL"));
    }
    Ok(())
}

pub fn init(options: &VaultOptions) -> Result<Vault> {
    let root = &options.path;
    create_vault_dir(root)
        .with_context(|| format!("creating vault directory {}", root.display()))?;
    fs::read_dir(root).with_context(|| format!("reading vault directory {}", root.display()))?;
    tracing::info!(vault = %root.display(), "vault ready");
    Ok(Vault {
        root: Arc::new(root.clone()),
    })
}

fn create_vault_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(VAULT_DIR_MODE);
    }
    builder.create(path)
}
