use git2::Repository;
use std::path::{Component, Path, PathBuf};

/// Working tree root of the git repository containing `start`, or `start`
/// itself outside a repository. The root is returned as an ancestor of
/// `start`, so paths under `start` strip against it even through symlinks.
pub fn find_repo_root(start: &Path) -> PathBuf {
    let workdir = match Repository::discover(start) {
        Ok(repo) => match repo.workdir() {
            Some(dir) => dir.to_path_buf(),
            None => return start.to_path_buf(),
        },
        Err(e) => {
            tracing::debug!("no git repository above {}: {}", start.display(), e.message());
            return start.to_path_buf();
        }
    };

    let Ok(canonical) = workdir.canonicalize() else {
        return workdir;
    };
    start
        .ancestors()
        .find(|dir| dir.canonicalize().is_ok_and(|c| c == canonical))
        .map(Path::to_path_buf)
        .unwrap_or(workdir)
}

/// Where the test for a source file lives: `src/pkg/mod.py` maps to
/// `tests/pkg/test_mod.py`. Paths already under `tests/` are returned as is.
pub fn source_to_test_path(src: &Path) -> PathBuf {
    let components: Vec<&str> = src
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let Some((file_name, dirs)) = components.split_last() else {
        return PathBuf::from("tests");
    };
    if dirs.first() == Some(&"tests") {
        return src.to_path_buf();
    }

    let dirs = match dirs.first() {
        Some(&"src") => &dirs[1..],
        _ => dirs,
    };

    let mut dest = PathBuf::from("tests");
    dest.extend(dirs);
    if file_name.starts_with("test_") {
        dest.push(file_name);
    } else {
        dest.push(format!("test_{}", file_name));
    }
    dest
}

/// `path` relative to `root`, accepting either absolute or root-relative
/// input. Both are normalised lexically first, so `./` is dropped and
/// `a/../b` becomes `b`. An absolute path outside `root` stays absolute; a
/// relative one that climbs above its start keeps its leading `..`.
pub fn relative_to(root: &Path, path: &Path) -> PathBuf {
    let path = normalize(path);
    match path.strip_prefix(normalize(root)) {
        Ok(relative) if path.is_absolute() => relative.to_path_buf(),
        _ => path,
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
