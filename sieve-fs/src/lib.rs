//! Capability-based filesystem helpers shared by the sieve crates.
//!
//! Paths handed to the extraction pipeline arrive from configuration, so they
//! may be relative or absolute. Every helper resolves an ambient directory
//! first and then operates relative to it through `cap-std`.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Report whether `path` names an existing regular file.
///
/// Returns `Ok(false)` for directories and other non-file entries, and an
/// error of kind [`io::ErrorKind::NotFound`] when nothing exists at `path`.
pub fn is_regular_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = parent_and_name(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Create every missing ancestor directory of `path`.
///
/// Paths without a parent, or whose parent is the filesystem root, need no
/// work and succeed immediately.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }

    let (base, relative) = split_ambient(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

fn parent_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Split a directory path into an ambient base directory and the remainder
/// that must be created beneath it.
fn split_ambient(dir: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let mut components = dir.as_std_path().components();
    let base = match components.next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            // Consume the root separator that follows a drive prefix.
            if matches!(components.clone().next(), Some(Component::RootDir)) {
                components.next();
            }
            Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => {
            components = dir.as_std_path().components();
            Utf8PathBuf::from(".")
        }
    };

    let relative = Utf8PathBuf::from_path_buf(components.as_path().to_path_buf())
        .map_err(|_| io::Error::other("non-UTF-8 directory path"))?;
    let base_dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((base_dir, relative))
}
