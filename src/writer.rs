use crate::error::{Error, Result};
use crate::parser::{validate_relative_path, FileMap};
use std::fs;
use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Decides whether an existing file with different content is replaced.
pub trait Confirm {
    fn confirm(&mut self, path: &str, existing: &str, new: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str, &str, &str) -> bool,
{
    fn confirm(&mut self, path: &str, existing: &str, new: &str) -> bool {
        self(path, existing, new)
    }
}

/// Asks on stderr and reads the answer from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, path: &str, existing: &str, new: &str) -> bool {
        eprint!(
            "{} exists and differs ({} -> {} lines). Overwrite? [y/N] ",
            path,
            existing.lines().count(),
            new.lines().count()
        );
        let _ = io::stderr().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

/// Never overwrites. Used when there is no terminal to ask on.
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&mut self, path: &str, _existing: &str, _new: &str) -> bool {
        tracing::info!("not overwriting {} without --force", path);
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Created,
    Overwritten,
    /// Target already had exactly this content.
    Unchanged,
    /// Overwrite declined.
    Skipped,
}

#[derive(Debug)]
pub struct WriteOutcome {
    pub path: String,
    pub result: Result<WriteStatus>,
}

/// Write every file in `files` under `root`. Each file is independent: a
/// failure is recorded in its outcome and the rest are still written.
pub fn write_files(
    root: &Path,
    files: FileMap,
    force: bool,
    confirm: &mut dyn Confirm,
) -> Vec<WriteOutcome> {
    files
        .into_iter()
        .map(|(path, content)| {
            let result = write_file(root, &path, &content, force, confirm);
            WriteOutcome { path, result }
        })
        .collect()
}

fn write_file(
    root: &Path,
    path: &str,
    content: &str,
    force: bool,
    confirm: &mut dyn Confirm,
) -> Result<WriteStatus> {
    let relative = validate_relative_path(path).map_err(|reason| Error::malformed_path(path, reason))?;
    let target = root.join(&relative);
    let parent = target.parent().unwrap_or(root);
    // Nothing is read or created until the directory is known to be inside.
    ensure_inside(root, parent)?;

    let status = match fs::read(&target) {
        Ok(existing) if force => {
            tracing::debug!("overwriting {} ({} bytes)", relative, existing.len());
            WriteStatus::Overwritten
        }
        Ok(existing) if existing == content.as_bytes() => return Ok(WriteStatus::Unchanged),
        Ok(existing) => {
            let existing = String::from_utf8_lossy(&existing);
            if !confirm.confirm(&relative, &existing, content) {
                return Ok(WriteStatus::Skipped);
            }
            WriteStatus::Overwritten
        }
        Err(e) if e.kind() == ErrorKind::NotFound => WriteStatus::Created,
        Err(e) => return Err(Error::io(target, e)),
    };

    atomic_write(root, &target, content)?;
    Ok(status)
}

/// Write through a temporary file in the target directory and rename it into
/// place, so the target is either the old or the new content.
fn atomic_write(root: &Path, target: &Path, content: &str) -> Result<()> {
    let parent = target.parent().unwrap_or(root);
    fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    // Checked again now that the directories exist.
    ensure_inside(root, parent)?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    tmp.write_all(content.as_bytes())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| Error::io(tmp.path().to_path_buf(), e))?;

    // Temp files are created owner-only; keep the old mode or use a normal one.
    let permissions = match fs::metadata(target) {
        Ok(metadata) => Some(metadata.permissions()),
        Err(_) => new_file_permissions(),
    };
    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)
            .map_err(|e| Error::io(tmp.path().to_path_buf(), e))?;
    }

    tmp.persist(target)
        .map_err(|e| Error::io(target.to_path_buf(), e.error))?;
    Ok(())
}

#[cfg(unix)]
fn new_file_permissions() -> Option<fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn new_file_permissions() -> Option<fs::Permissions> {
    None
}

/// Reject writes whose directory resolves outside `root` through symlinks.
/// `dir` may not exist yet; its nearest existing ancestor is checked.
fn ensure_inside(root: &Path, dir: &Path) -> Result<()> {
    let canon_root = canonical(root)?;
    let existing = dir
        .ancestors()
        .find(|a| a.symlink_metadata().is_ok())
        .unwrap_or(root);
    let canon_dir = canonical(existing)?;
    if !canon_dir.starts_with(&canon_root) {
        return Err(Error::malformed_path(
            dir.display().to_string(),
            "resolves outside the repository",
        ));
    }
    Ok(())
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize().map_err(|e| Error::io(path, e))
}
