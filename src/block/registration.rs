use serde_json::{Value, json};

/// Registered block type name.
pub const BLOCK_NAME: &str = "audiogram-generator/audiogram";

/// Font the editor hands to captions unless configured otherwise, relative to the plugin root.
pub const DEFAULT_FONT_ASSET: &str = "assets/SourceSansPro-Bold.ttf";

/// Block type metadata in `block.json` form.
pub fn block_type_metadata() -> Value {
    json!({
        "apiVersion": 2,
        "name": BLOCK_NAME,
        "title": "Audiogram",
        "category": "media",
        "description": "Generate an audiogram video from audio, a background image and captions.",
        "keywords": [],
        "supports": { "align": true },
        "attributes": {
            "videoLocation": { "type": "string" },
            "src": { "type": "string" },
            "id": { "type": "string" },
            "imageID": { "type": "string" },
            "imageSrc": { "type": "string" },
            "imageHeight": { "type": "number" },
            "imageWidth": { "type": "number" },
            "captionsID": { "type": "string" },
            "captionsSrc": { "type": "string" },
            "fontSrc": { "type": "string" },
            "audiogramUrl": { "type": "string" },
            "audiogramId": { "type": "string" }
        }
    })
}

/// The admin page a request is rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminScreen {
    /// Page base, e.g. `post.php`.
    pub base: String,
    pub is_block_editor: bool,
}

impl AdminScreen {
    pub fn new(base: impl Into<String>, is_block_editor: bool) -> Self {
        Self {
            base: base.into(),
            is_block_editor,
        }
    }
}

/// When cross-origin isolation headers are sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Only on block-editor post screens.
    #[default]
    BlockEditorOnly,
    /// On every request.
    Always,
}

/// COOP/COEP headers that enable `SharedArrayBuffer` for the in-editor encoder.
pub fn cross_origin_headers(
    screen: &AdminScreen,
    policy: HeaderPolicy,
) -> Vec<(&'static str, &'static str)> {
    let send = match policy {
        HeaderPolicy::Always => true,
        HeaderPolicy::BlockEditorOnly => {
            screen.is_block_editor
                && matches!(
                    screen.base.trim_end_matches(".php"),
                    "post" | "post-new"
                )
        }
    };
    if !send {
        return Vec::new();
    }
    vec![
        ("Cross-Origin-Opener-Policy", "same-origin"),
        ("Cross-Origin-Embedder-Policy", "require-corp"),
    ]
}

/// Inline script attached to an enqueued script handle.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct InlineScript {
    pub handle: String,
    /// Always `before`: the data must exist when the handle's script runs.
    pub position: &'static str,
    pub code: String,
}

/// `jsData` carrying the caption font URL, injected before the editor script.
pub fn editor_inline_script(text_domain: &str, plugin_url: &str) -> InlineScript {
    let font_url = format!("{}/{DEFAULT_FONT_ASSET}", plugin_url.trim_end_matches('/'));
    let data = json!({ "font_url": font_url });
    InlineScript {
        handle: format!("{text_domain}-audiogram-editor-script"),
        position: "before",
        code: format!("var jsData = {data}"),
    }
}
