//! Attachment packaging: recursive folder zipping, the restricted-extension
//! policy, email-bound bundles, and the receiving-side unpack that reverses
//! the `.safe` rename.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::{CompressionMethod, ZipArchive};

/// Extensions commonly blocked by mail providers, checked case-insensitively.
const RESTRICTED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "com", "msi", "cmd", "sh", "apk", "js", "vbs", "ps1", "jar",
    "iso", "dmg", "zip", "rar", "tar", "gz", "docm", "xlsm",
];

/// Suffix appended to deny-listed filenames under the rename policy; the
/// extraction side strips it again.
pub const SAFE_SUFFIX: &str = ".safe";

/// True if `name` ends in a deny-listed extension.
pub fn is_restricted(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => RESTRICTED_EXTENSIONS
            .iter()
            .any(|r| ext.eq_ignore_ascii_case(r)),
        None => false,
    }
}

/// What to do with a deny-listed attachment filename. The active policy is
/// an explicit configuration choice, never a hidden default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictedPolicy {
    /// Fail the whole send.
    Reject,
    /// Append `.safe` to the wire filename so filename-based filtering
    /// passes it through; [`unpack_archive`] strips it on the other side.
    RenameSafe,
}

impl RestrictedPolicy {
    /// Resolves the wire name for one attachment, or fails the send.
    pub fn apply(self, name: &str) -> Result<String> {
        if !is_restricted(name) {
            return Ok(name.to_string());
        }
        match self {
            RestrictedPolicy::Reject => Err(Error::RestrictedAttachment(name.to_string())),
            RestrictedPolicy::RenameSafe => Ok(format!("{name}{SAFE_SUFFIX}")),
        }
    }
}

/// Normalizes each path into a single regular file suitable for attaching:
/// files pass through unchanged, directories are zipped into `<dir>.zip`.
/// The zip byproducts are left on disk for the caller to clean up.
pub fn package_attachments(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut packaged = Vec::with_capacity(paths.len());
    for path in paths {
        let meta = fs::metadata(path).map_err(|e| attachment_io(path, e))?;
        if meta.is_dir() {
            packaged.push(zip_directory(path)?);
        } else {
            packaged.push(path.clone());
        }
    }
    Ok(packaged)
}

/// Recursively zips `dir` into a sibling `<dir>.zip`, preserving the path
/// relative to the directory root as the entry name with forward-slash
/// separators. Subdirectories get trailing-slash entries with no content;
/// the root itself gets no entry. Any I/O error aborts the operation.
pub fn zip_directory(dir: &Path) -> Result<PathBuf> {
    let mut name = dir.as_os_str().to_os_string();
    name.push(".zip");
    let zip_path = PathBuf::from(name);

    let file = File::create(&zip_path).map_err(|e| attachment_io(&zip_path, e))?;
    let mut writer = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| dir.to_path_buf());
            Error::AttachmentIo {
                path,
                source: e.into(),
            }
        })?;
        let rel = match entry.path().strip_prefix(dir) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel,
            _ => continue,
        };
        let entry_name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer
                .add_directory(format!("{entry_name}/"), options)
                .map_err(|e| zip_io(entry.path(), e))?;
        } else if entry.file_type().is_file() {
            writer
                .start_file(entry_name, options)
                .map_err(|e| zip_io(entry.path(), e))?;
            let mut src = File::open(entry.path()).map_err(|e| attachment_io(entry.path(), e))?;
            io::copy(&mut src, &mut writer).map_err(|e| attachment_io(entry.path(), e))?;
        }
    }

    writer.finish().map_err(|e| zip_io(&zip_path, e))?;
    debug!(archive = %zip_path.display(), "zipped directory");
    Ok(zip_path)
}

/// Packs raw attachment files directly into one email-bound archive at
/// `zip_path`, applying `policy` to each entry name. Entries are flat
/// basenames, matching how the files would otherwise be attached.
pub fn bundle_attachments(
    paths: &[PathBuf],
    zip_path: &Path,
    policy: RestrictedPolicy,
) -> Result<PathBuf> {
    let file = File::create(zip_path).map_err(|e| attachment_io(zip_path, e))?;
    let mut writer = ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in paths {
        let entry_name = policy.apply(&file_name_of(path))?;
        writer
            .start_file(entry_name, options)
            .map_err(|e| zip_io(path, e))?;
        let mut src = File::open(path).map_err(|e| attachment_io(path, e))?;
        io::copy(&mut src, &mut writer).map_err(|e| attachment_io(path, e))?;
    }

    writer.finish().map_err(|e| zip_io(zip_path, e))?;
    Ok(zip_path.to_path_buf())
}

/// Extracts `<stem>.zip` into a `<stem>/` directory next to it, recreating
/// the archived directory structure and stripping the `.safe` suffix from
/// extracted filenames. Entry names that would escape the destination are
/// rejected.
pub fn unpack_archive(zip_path: &Path) -> Result<PathBuf> {
    let dest = if zip_path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
    {
        zip_path.with_extension("")
    } else {
        let mut name = zip_path.as_os_str().to_os_string();
        name.push(".extracted");
        PathBuf::from(name)
    };

    let file = File::open(zip_path).map_err(|e| attachment_io(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| zip_io(zip_path, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| zip_io(zip_path, e))?;
        let rel = entry.enclosed_name().ok_or_else(|| Error::AttachmentIo {
            path: zip_path.to_path_buf(),
            source: io::Error::other(format!("unsafe archive entry name: {}", entry.name())),
        })?;

        if entry.is_dir() {
            let out_dir = dest.join(&rel);
            fs::create_dir_all(&out_dir).map_err(|e| attachment_io(&out_dir, e))?;
            continue;
        }

        let rel = if rel.extension() == Some(OsStr::new("safe")) {
            rel.with_extension("")
        } else {
            rel
        };
        let out_path = dest.join(rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| attachment_io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| attachment_io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| attachment_io(&out_path, e))?;
    }

    debug!(dest = %dest.display(), "unpacked archive");
    Ok(dest)
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string())
}

pub(crate) fn attachment_io(path: &Path, source: io::Error) -> Error {
    Error::AttachmentIo {
        path: path.to_path_buf(),
        source,
    }
}

fn zip_io(path: &Path, err: zip::result::ZipError) -> Error {
    Error::AttachmentIo {
        path: path.to_path_buf(),
        source: io::Error::other(err),
    }
}
