use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::foundation::error::{AudiogramError, AudiogramResult};

use super::{MediaItem, MediaKind, MediaUploader, UploadRequest, probe_image_dimensions};

/// Name of the manifest file kept in the library root.
pub const MANIFEST_NAME: &str = "library.json";

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Manifest {
    next_id: u64,
    #[serde(default)]
    items: Vec<MediaItem>,
}

/// Media library stored in a local directory.
///
/// Files are written as `<id>-<name>` next to a `library.json` manifest; URLs are reported as
/// `<base_url>/<file>`.
#[derive(Debug)]
pub struct DirectoryLibrary {
    root: PathBuf,
    base_url: String,
    manifest: Mutex<Manifest>,
}

impl DirectoryLibrary {
    /// Open (or create) a library rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, base_url: impl Into<String>) -> AudiogramResult<Self> {
        use anyhow::Context as _;

        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create media library '{}'", root.display()))?;

        let manifest_path = root.join(MANIFEST_NAME);
        let manifest = if manifest_path.exists() {
            let text = std::fs::read_to_string(&manifest_path)
                .with_context(|| format!("read '{}'", manifest_path.display()))?;
            serde_json::from_str(&text).map_err(|e| {
                AudiogramError::upload(format!(
                    "parse media manifest '{}': {e}",
                    manifest_path.display()
                ))
            })?
        } else {
            Manifest {
                next_id: 1,
                items: Vec::new(),
            }
        };

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            root,
            base_url,
            manifest: Mutex::new(manifest),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All items, in upload order.
    pub fn items(&self) -> Vec<MediaItem> {
        self.lock().items.clone()
    }

    pub fn get(&self, id: &str) -> Option<MediaItem> {
        self.lock().items.iter().find(|i| i.id == id).cloned()
    }

    /// Local path of a stored item, resolved from its URL.
    pub fn path_of(&self, item: &MediaItem) -> Option<PathBuf> {
        let file = item.url.strip_prefix(&self.base_url)?.trim_start_matches('/');
        (!file.is_empty()).then(|| self.root.join(file))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Manifest> {
        self.manifest.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn save(&self, manifest: &Manifest) -> AudiogramResult<()> {
        use anyhow::Context as _;

        let path = self.root.join(MANIFEST_NAME);
        let text = serde_json::to_string_pretty(manifest)
            .map_err(|e| AudiogramError::upload(format!("serialize media manifest: {e}")))?;
        std::fs::write(&path, text).with_context(|| format!("write '{}'", path.display()))?;
        Ok(())
    }
}

impl MediaUploader for DirectoryLibrary {
    fn upload(&self, request: UploadRequest<'_>) -> AudiogramResult<MediaItem> {
        let (mime, kind) = request.checked_mime()?;
        let name = sanitize_file_name(request.name);

        let dimensions = if kind == MediaKind::Image {
            Some(probe_image_dimensions(request.bytes)?)
        } else {
            None
        };

        let mut manifest = self.lock();
        let id = manifest.next_id.max(1);
        let file = format!("{id}-{name}");
        let path = self.root.join(&file);
        std::fs::write(&path, request.bytes).map_err(|e| {
            AudiogramError::upload(format!("store '{}': {e}", path.display()))
        })?;

        let item = MediaItem {
            id: id.to_string(),
            url: format!("{}/{file}", self.base_url),
            mime,
            kind,
            width: dimensions.map(|d| d.width),
            height: dimensions.map(|d| d.height),
        };
        manifest.next_id = id + 1;
        manifest.items.push(item.clone());
        if let Err(e) = self.save(&manifest) {
            let _ = std::fs::remove_file(&path);
            manifest.items.pop();
            manifest.next_id = id;
            return Err(e);
        }

        tracing::info!(
            "uploaded '{}' as media {} ({}, {} bytes)",
            request.name,
            item.id,
            item.mime,
            request.bytes.len()
        );
        Ok(item)
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}
