//! Weblog-level request envelope: the handle, optional locale and the path
//! remaining for the view-specific parser.

use super::{error::InvalidRequestError, params::QueryParams};

/// A request as handed over by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// Mount point the request was routed through, e.g. `/roller-ui/rendering/page`.
    pub servlet_path: String,
    /// Path below the mount point, including its leading `/`.
    pub path_info: Option<String>,
    pub query: QueryParams,
    /// Authenticated principal supplied by the fronting layer.
    pub principal: Option<String>,
}

impl RawRequest {
    pub fn new(servlet_path: impl Into<String>, path_info: Option<&str>) -> Self {
        Self {
            servlet_path: servlet_path.into(),
            path_info: path_info.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Reconstructed request URL used in error messages.
    pub fn url(&self) -> String {
        let mut url = self.servlet_path.clone();
        if let Some(path) = self.path_info.as_deref() {
            url.push_str(path);
        }
        url
    }
}

/// Weblog handle, locale and the leftover page path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeblogEnvelope {
    pub handle: String,
    pub locale: Option<String>,
    /// Remaining path without leading or trailing `/`; `None` for the homepage.
    pub page_path: Option<String>,
}

impl WeblogEnvelope {
    /// Split `/<handle>[/<locale>][/<rest>]`.
    pub fn parse(raw: &RawRequest) -> Result<Self, InvalidRequestError> {
        let missing = || InvalidRequestError::MissingWeblog { url: raw.url() };

        let path = raw
            .path_info
            .as_deref()
            .filter(|path| path.trim().len() > 1)
            .ok_or_else(missing)?;

        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_suffix('/').unwrap_or(path);

        let mut elements = path.splitn(3, '/');
        let handle = elements
            .next()
            .filter(|handle| !handle.is_empty())
            .ok_or_else(missing)?
            .to_string();

        let (locale, page_path) = match (elements.next(), elements.next()) {
            (Some(second), Some(rest)) if is_locale(second) => {
                (Some(second.to_string()), Some(rest.to_string()))
            }
            (Some(second), Some(rest)) => (None, Some(format!("{second}/{rest}"))),
            (Some(second), None) if is_locale(second) => (Some(second.to_string()), None),
            (Some(second), None) => (None, Some(second.to_string())),
            (None, _) => (None, None),
        };

        Ok(Self {
            handle,
            locale,
            page_path,
        })
    }
}

/// `xx` or `xx_YY`; capitalisation is not checked.
pub fn is_locale(candidate: &str) -> bool {
    let mut parts = candidate.split('_');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), None, None) => lang.len() == 2,
        (Some(lang), Some(country), None) => lang.len() == 2 && country.len() == 2,
        _ => false,
    }
}
