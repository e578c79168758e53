use crate::foundation::error::{AudiogramError, AudiogramResult};

/// Resolve the family name libass should use for the given font file.
///
/// The subtitles filter selects fonts by family (`force_style='Fontname=...'`), not by file, so
/// the family is read from the font itself.
pub fn resolve_font_family(font_bytes: &[u8]) -> AudiogramResult<String> {
    if font_bytes.is_empty() {
        return Err(AudiogramError::validation("font file is empty"));
    }

    let mut font_ctx = parley::FontContext::default();
    let families = font_ctx
        .collection
        .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
    let family_id = families
        .first()
        .map(|(id, _)| *id)
        .ok_or_else(|| AudiogramError::validation("no font families registered from font bytes"))?;

    let family = font_ctx
        .collection
        .family_name(family_id)
        .ok_or_else(|| AudiogramError::validation("registered font family has no name"))?
        .to_string();
    tracing::debug!("resolved caption font family '{family}'");
    Ok(family)
}
