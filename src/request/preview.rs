use serde::Serialize;

use super::{decode::decode, params::QueryParams};

/// Page type previewed when the request does not name one.
pub const DEFAULT_PREVIEW_TYPE: &str = "standard";

/// Extra inputs understood by the authoring preview route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewOptions {
    /// Theme to render with instead of the weblog's own.
    pub theme_name: Option<String>,
    /// Kind of page being previewed.
    #[serde(rename = "type")]
    pub page_type: String,
    /// Anchor of a (possibly unpublished) entry to preview.
    pub preview_entry: Option<String>,
}

impl PreviewOptions {
    pub(crate) fn from_query(query: &QueryParams) -> Self {
        Self {
            theme_name: query.first("theme").map(str::to_string),
            page_type: query
                .first("type")
                .unwrap_or(DEFAULT_PREVIEW_TYPE)
                .to_string(),
            preview_entry: query.first("previewEntry").map(decode),
        }
    }
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            theme_name: None,
            page_type: DEFAULT_PREVIEW_TYPE.to_string(),
            preview_entry: None,
        }
    }
}
