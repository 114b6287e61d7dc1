//! Image I/O: background loading, the shared texture registry and
//! metadata-to-URL resolution.

pub mod image;
pub mod metadata;
pub mod texture;
