//! Weblog entities and the lookups that resolve them.

pub mod entities;
pub mod error;
pub mod lookup;
