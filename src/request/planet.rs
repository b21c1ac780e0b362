//! Planet (aggregated) view requests.

use serde::Serialize;

use super::params::QueryParams;

pub const PLANET_CONTEXT: &str = "planet";
pub const DEFAULT_PLANET_LANGUAGE: &str = "en";

/// Inputs that distinguish one rendering of a planet view from another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanetRequest {
    pub context: String,
    /// View type such as `page` or `feed`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Feed format, only present for syndication views.
    pub flavor: Option<String>,
    pub language: String,
    pub excerpts: bool,
    pub authentic_user: Option<String>,
    pub group: Option<String>,
}

impl PlanetRequest {
    pub fn new(kind: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            context: PLANET_CONTEXT.to_string(),
            kind: kind.into(),
            flavor: None,
            language: language.into(),
            excerpts: false,
            authentic_user: None,
            group: None,
        }
    }

    /// Build from `<type>[/<flavor>]` and the `group`, `excerpts` and `lang`
    /// query parameters.
    pub fn from_parts(path: &str, query: &QueryParams, principal: Option<&str>) -> Option<Self> {
        let path = path.trim_matches('/');
        let (kind, flavor) = match path.split_once('/') {
            Some((kind, flavor)) => (kind, Some(flavor)),
            None => (path, None),
        };
        if kind.is_empty() || flavor.is_some_and(|flavor| flavor.is_empty() || flavor.contains('/'))
        {
            return None;
        }

        let language = query
            .first("lang")
            .filter(|lang| !lang.is_empty())
            .unwrap_or(DEFAULT_PLANET_LANGUAGE);

        Some(Self {
            context: PLANET_CONTEXT.to_string(),
            kind: kind.to_string(),
            flavor: flavor.map(str::to_string),
            language: language.to_string(),
            excerpts: query
                .first("excerpts")
                .is_some_and(|value| value.eq_ignore_ascii_case("true")),
            authentic_user: principal.map(str::to_string),
            group: query
                .first("group")
                .filter(|group| !group.is_empty())
                .map(str::to_string),
        })
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn with_excerpts(mut self, excerpts: bool) -> Self {
        self.excerpts = excerpts;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.authentic_user = Some(user.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}
