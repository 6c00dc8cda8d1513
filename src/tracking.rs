use crate::error::{Error, Result};
use crate::repo::relative_to;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

const STORE_DIR: &str = ".sasori";
const STORE_FILE: &str = "processing.json";

/// Files currently marked "in progress", kept under the repository root.
#[derive(Debug)]
pub struct TrackingStore {
    root: PathBuf,
    data: StoreData,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    files: Vec<String>,
}

impl TrackingStore {
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::store_path(root);
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Tracking(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreData::default(),
            Err(e) => return Err(Error::io(path, e)),
        };
        Ok(Self {
            root: root.to_path_buf(),
            data,
        })
    }

    pub fn store_path(root: &Path) -> PathBuf {
        root.join(STORE_DIR).join(STORE_FILE)
    }

    pub fn files(&self) -> &[String] {
        &self.data.files
    }

    /// Track `paths`, keeping insertion order and ignoring duplicates.
    /// Returns how many were new.
    pub fn add<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize> {
        let mut added = 0;
        for path in paths {
            let key = self.key(path.as_ref())?;
            if !self.data.files.contains(&key) {
                self.data.files.push(key);
                added += 1;
            }
        }
        Ok(added)
    }

    /// Stop tracking `paths`. Returns how many were removed.
    pub fn remove<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize> {
        let keys = paths
            .iter()
            .map(|p| self.key(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let before = self.data.files.len();
        self.data.files.retain(|f| !keys.contains(f));
        Ok(before - self.data.files.len())
    }

    pub fn clear(&mut self) {
        self.data.files.clear();
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::store_path(&self.root);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        }
        let json = serde_json::to_string_pretty(&self.data)
            .map_err(|e| Error::Tracking(e.to_string()))?;
        fs::write(&path, json + "\n").map_err(|e| Error::io(path, e))
    }

    fn key(&self, path: &Path) -> Result<String> {
        let relative = relative_to(&self.root, path);
        if relative.is_absolute() || relative.components().any(|c| c == Component::ParentDir) {
            return Err(Error::Tracking(format!(
                "{} is outside the repository",
                path.display()
            )));
        }
        let key = relative.to_string_lossy().replace('\\', "/");
        if key.is_empty() {
            return Err(Error::Tracking("empty path".to_string()));
        }
        Ok(key)
    }
}
