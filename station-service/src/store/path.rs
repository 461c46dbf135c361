//! Store location checks run before either store touches the filesystem.

use std::path::{Component, Path};

use thiserror::Error;

/// Which store a path is meant for. The rules differ slightly: SQLite accepts
/// `:memory:`, while the fast store needs a real file plus a writable sibling
/// for its temp-file swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Durable,
    Fast,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorePathError {
    #[error("store path is empty")]
    Empty,

    #[error("store path contains a control character")]
    ControlCharacter,

    #[error("store path must not contain '..'")]
    ParentTraversal,

    #[error("store path has no file name")]
    NoFileName,

    #[error("fast store needs a file, not an in-memory database")]
    InMemory,

    #[error("{0} is a directory")]
    Directory(String),

    #[error("{0} is a symlink")]
    Symlink(String),
}

/// Validate `path` as the location of a `kind` store. Missing files are fine;
/// existing ones must be regular files.
pub fn check_store_path(path: &Path, kind: StoreKind) -> Result<(), StorePathError> {
    let text = path.to_string_lossy();
    if text == ":memory:" {
        return match kind {
            StoreKind::Durable => Ok(()),
            StoreKind::Fast => Err(StorePathError::InMemory),
        };
    }
    if text.trim().is_empty() {
        return Err(StorePathError::Empty);
    }
    if text.chars().any(char::is_control) {
        return Err(StorePathError::ControlCharacter);
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(StorePathError::ParentTraversal);
    }
    if path.file_name().is_none() {
        return Err(StorePathError::NoFileName);
    }

    check_existing(path)?;
    if kind == StoreKind::Fast {
        // Writes go through this sibling before the rename.
        check_existing(&path.with_extension("tmp"))?;
    }
    Ok(())
}

fn check_existing(path: &Path) -> Result<(), StorePathError> {
    let Ok(meta) = std::fs::symlink_metadata(path) else {
        return Ok(());
    };
    if meta.file_type().is_symlink() {
        return Err(StorePathError::Symlink(path.display().to_string()));
    }
    if meta.is_dir() {
        return Err(StorePathError::Directory(path.display().to_string()));
    }
    Ok(())
}
