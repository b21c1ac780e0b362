//! Request classification for the weblog rendering tier.
//!
//! Turns a mount point, path info and query string into typed request
//! descriptors. Everything here is pure per-call computation; parsers hold
//! no mutable state and can be shared freely between request tasks.

mod decode;
mod error;
mod page;
mod params;
mod planet;
mod preview;
mod resolve;
mod weblog;

pub use decode::{decode, is_valid_date_string, split_tags};
pub use error::InvalidRequestError;
pub use page::{
    DEFAULT_MAX_TAGS, PAGE_MOUNT_POINT, PREVIEW_MOUNT_POINT, PageContext, PageRequestParser,
    RequestProfile, WeblogPageRequest,
};
pub use params::{QueryParams, RESERVED_PARAMETERS};
pub use planet::{DEFAULT_PLANET_LANGUAGE, PLANET_CONTEXT, PlanetRequest};
pub use preview::{DEFAULT_PREVIEW_TYPE, PreviewOptions};
pub use resolve::Resolved;
pub use weblog::{RawRequest, WeblogEnvelope, is_locale};
