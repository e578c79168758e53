use crate::foundation::core::Dimensions;
use crate::foundation::error::{AudiogramError, AudiogramResult};

/// Background sizes accepted for social-video output.
pub const ALLOWED_SIZES: [(u32, u32); 6] = [
    (1080, 1080),
    (1080, 1350),
    (1080, 1920),
    (1920, 1080),
    (1280, 720),
    (720, 1280),
];

pub fn is_allowed(width: u32, height: u32) -> bool {
    ALLOWED_SIZES.contains(&(width, height))
}

/// Check a background image against [`ALLOWED_SIZES`].
pub fn validate(width: u32, height: u32) -> AudiogramResult<Dimensions> {
    if is_allowed(width, height) {
        return Ok(Dimensions { width, height });
    }
    Err(AudiogramError::validation(size_message(width, height)))
}

/// Human-readable size requirement shown when an image is rejected.
pub fn size_message(width: u32, height: u32) -> String {
    let allowed = ALLOWED_SIZES
        .iter()
        .map(|(w, h)| format!("{w}x{h}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Background image must be one of: {allowed} (got {width}x{height})")
}
