//! Weblog page-request classification, render cache keys and the expiring
//! render caches of a multi-user weblog host.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod request;
