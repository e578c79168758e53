use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::foundation::error::{AudiogramError, AudiogramResult};

/// In-memory filesystem the engine stages inputs and outputs in.
///
/// Paths are `/`-separated and relative to the filesystem root; a leading `/` is accepted and
/// ignored. Directories are implicit: a directory exists while any file lives below it.
#[derive(Clone, Debug, Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_file(&mut self, path: &str, data: impl Into<Vec<u8>>) -> AudiogramResult<()> {
        let key = normalize_fs_path(path).map_err(|_| {
            AudiogramError::fs(format!("fs.write_file('{path}') error. Check if the path exists"))
        })?;
        let data = data.into();
        tracing::debug!(
            target: "audiogram::engine",
            "run FS.writeFile {key} <{} bytes binary file>",
            data.len()
        );
        self.files.insert(key, data);
        Ok(())
    }

    pub fn read_file(&self, path: &str) -> AudiogramResult<Vec<u8>> {
        tracing::debug!(target: "audiogram::engine", "run FS.readFile {path}");
        normalize_fs_path(path)
            .ok()
            .and_then(|key| self.files.get(&key).cloned())
            .ok_or_else(|| {
                AudiogramError::fs(format!(
                    "fs.read_file('{path}') error. Check if the path exists"
                ))
            })
    }

    pub fn unlink(&mut self, path: &str) -> AudiogramResult<()> {
        tracing::debug!(target: "audiogram::engine", "run FS.unlink {path}");
        normalize_fs_path(path)
            .ok()
            .and_then(|key| self.files.remove(&key))
            .map(|_| ())
            .ok_or_else(|| {
                AudiogramError::fs(format!("fs.unlink('{path}') error. Check if the path exists"))
            })
    }

    /// List the direct children (files and directories) of `dir`, sorted by name.
    pub fn readdir(&self, dir: &str) -> AudiogramResult<Vec<String>> {
        let not_found = || {
            AudiogramError::fs(format!(
                "fs.readdir('{dir}') error. Check if the path exists, ex: fs.readdir('/')"
            ))
        };
        let prefix = match dir.trim_matches('/') {
            "" | "." => String::new(),
            _ => format!("{}/", normalize_fs_path(dir).map_err(|_| not_found())?),
        };

        let mut children = BTreeSet::new();
        for key in self.files.keys() {
            if let Some(rest) = key.strip_prefix(&prefix) {
                let child = rest.split('/').next().unwrap_or(rest);
                children.insert(child.to_string());
            }
        }
        if children.is_empty() && !prefix.is_empty() {
            return Err(not_found());
        }
        Ok(children.into_iter().collect())
    }

    pub fn exists(&self, path: &str) -> bool {
        normalize_fs_path(path)
            .map(|key| self.files.contains_key(&key))
            .unwrap_or(false)
    }

    /// Number of files stored.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Copy every file into `root`, creating directories as needed.
    pub(crate) fn materialize(&self, root: &Path) -> AudiogramResult<()> {
        use anyhow::Context as _;
        for (key, data) in &self.files {
            let dst = root.join(key);
            if let Some(parent) = dst.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create staging dir '{}'", parent.display()))?;
            }
            std::fs::write(&dst, data)
                .with_context(|| format!("stage '{key}' into '{}'", dst.display()))?;
        }
        Ok(())
    }

    /// Pull every regular file below `root` into the filesystem, replacing changed entries.
    ///
    /// Returns the keys that were added or modified.
    pub(crate) fn absorb(&mut self, root: &Path) -> AudiogramResult<Vec<String>> {
        let mut changed = Vec::new();
        self.absorb_dir(root, root, &mut changed)?;
        changed.sort();
        Ok(changed)
    }

    fn absorb_dir(
        &mut self,
        root: &Path,
        dir: &Path,
        changed: &mut Vec<String>,
    ) -> AudiogramResult<()> {
        use anyhow::Context as _;
        let entries =
            std::fs::read_dir(dir).with_context(|| format!("read dir '{}'", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("read dir entry in '{}'", dir.display()))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat '{}'", path.display()))?;
            if file_type.is_dir() {
                self.absorb_dir(root, &path, changed)?;
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let Ok(rel) = path.strip_prefix(root) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let data =
                std::fs::read(&path).with_context(|| format!("read '{}'", path.display()))?;
            if self.files.get(&key) != Some(&data) {
                self.files.insert(key.clone(), data);
                changed.push(key);
            }
        }
        Ok(())
    }
}

/// Normalize a virtual filesystem path.
///
/// The result uses `/` separators without leading slash or `.` segments. Parent traversals
/// (`..`) and empty paths are rejected.
pub(crate) fn normalize_fs_path(path: &str) -> AudiogramResult<String> {
    let s = path.replace('\\', "/");
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(AudiogramError::validation(format!(
                "virtual path '{path}' must not contain '..'"
            )));
        }
        out.push(part);
    }
    if out.is_empty() {
        return Err(AudiogramError::validation(format!(
            "virtual path '{path}' must contain a file name"
        )));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_root_and_dots() {
        assert_eq!(normalize_fs_path("/tmp/font.ttf").unwrap(), "tmp/font.ttf");
        assert_eq!(normalize_fs_path("./a//b").unwrap(), "a/b");
        assert_eq!(normalize_fs_path("a\\b.png").unwrap(), "a/b.png");
        assert!(normalize_fs_path("../x").is_err());
        assert!(normalize_fs_path("/").is_err());
    }

    #[test]
    fn write_then_read_and_unlink() {
        let mut fs = MemFs::new();
        fs.write_file("bg.png", vec![1, 2, 3]).unwrap();
        assert_eq!(fs.read_file("/bg.png").unwrap(), vec![1, 2, 3]);
        fs.unlink("bg.png").unwrap();
        assert!(!fs.exists("bg.png"));
        assert!(fs.unlink("bg.png").is_err());
    }

    #[test]
    fn read_missing_mentions_path_check() {
        let fs = MemFs::new();
        let err = fs.read_file("audiogram.mp4").unwrap_err();
        assert_eq!(
            err.to_string(),
            "fs.read_file('audiogram.mp4') error. Check if the path exists"
        );
    }

    #[test]
    fn write_outside_root_mentions_path_check() {
        let mut fs = MemFs::new();
        let err = fs.write_file("../escape.txt", vec![1]).unwrap_err();
        assert!(matches!(err, AudiogramError::Fs(_)));
        assert_eq!(
            err.to_string(),
            "fs.write_file('../escape.txt') error. Check if the path exists"
        );
        assert!(fs.write_file("/", vec![1]).is_err());
        assert!(fs.is_empty());
    }

    #[test]
    fn readdir_lists_direct_children() {
        let mut fs = MemFs::new();
        fs.write_file("tmp/font.ttf", vec![0]).unwrap();
        fs.write_file("captions.vtt", vec![0]).unwrap();
        fs.write_file("bg.png", vec![0]).unwrap();
        assert_eq!(fs.readdir("/").unwrap(), vec!["bg.png", "captions.vtt", "tmp"]);
        assert_eq!(fs.readdir("tmp").unwrap(), vec!["font.ttf"]);
        let err = fs.readdir("missing").unwrap_err();
        assert!(err.to_string().contains("Check if the path exists"));
    }

    #[test]
    fn materialize_and_absorb_track_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = MemFs::new();
        fs.write_file("tmp/font.ttf", vec![7]).unwrap();
        fs.write_file("in.txt", b"a".to_vec()).unwrap();
        fs.materialize(dir.path()).unwrap();

        std::fs::write(dir.path().join("out.mp4"), b"video").unwrap();
        let changed = fs.absorb(dir.path()).unwrap();
        assert_eq!(changed, vec!["out.mp4".to_string()]);
        assert_eq!(fs.read_file("out.mp4").unwrap(), b"video".to_vec());
        assert_eq!(fs.len(), 3);
    }
}
