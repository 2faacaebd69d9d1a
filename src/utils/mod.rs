//! Shared helpers: subprocess execution, paths, MIME types, HTML escaping.

pub mod exec;
pub mod html;
pub mod mime;
pub mod path;
