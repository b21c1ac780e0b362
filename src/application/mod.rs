//! Application services sitting between the HTTP surface and the caches.

pub mod error;
pub mod render;
