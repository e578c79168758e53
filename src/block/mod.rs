//! The audiogram block: its attributes, saved markup and registration surface.

pub mod attributes;
pub mod image_size;
pub mod markup;
pub mod registration;

pub use attributes::BlockAttributes;
pub use markup::render_saved_markup;
pub use registration::{
    AdminScreen, BLOCK_NAME, HeaderPolicy, InlineScript, block_type_metadata,
    cross_origin_headers, editor_inline_script,
};
