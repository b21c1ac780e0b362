//! Read-side lookups the request descriptors resolve lazily.

use std::collections::HashMap;

use serde::Deserialize;

use super::entities::{CategoryRecord, EntryRecord, TemplateRecord, ThemeRecord, WeblogRecord};
use super::error::LookupError;

/// Resolves weblog entities by the names that appear in request URLs.
///
/// `Ok(None)` means the name is unknown; `Err` means the lookup itself could
/// not be answered.
pub trait WeblogLookup: Send + Sync {
    fn weblog(&self, handle: &str) -> Result<Option<WeblogRecord>, LookupError>;

    fn entry_by_anchor(
        &self,
        handle: &str,
        anchor: &str,
    ) -> Result<Option<EntryRecord>, LookupError>;

    fn category_by_name(
        &self,
        handle: &str,
        name: &str,
    ) -> Result<Option<CategoryRecord>, LookupError>;

    fn template_by_link(
        &self,
        handle: &str,
        link: &str,
    ) -> Result<Option<TemplateRecord>, LookupError>;

    fn theme_by_name(&self, name: &str) -> Result<Option<ThemeRecord>, LookupError>;
}

/// Site contents as written in a site file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SiteContents {
    pub themes: Vec<ThemeRecord>,
    pub weblogs: Vec<WeblogRecord>,
}

/// Lookup backed by an immutable in-memory snapshot of the site.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWeblogs {
    weblogs: HashMap<String, WeblogRecord>,
    themes: HashMap<String, ThemeRecord>,
}

impl InMemoryWeblogs {
    pub fn new(contents: SiteContents) -> Self {
        let weblogs = contents
            .weblogs
            .into_iter()
            .map(|weblog| (weblog.handle.clone(), weblog))
            .collect();
        let themes = contents
            .themes
            .into_iter()
            .map(|theme| (theme.name.clone(), theme))
            .collect();
        Self { weblogs, themes }
    }

    pub fn weblog_count(&self) -> usize {
        self.weblogs.len()
    }

    fn require(&self, handle: &str) -> Result<&WeblogRecord, LookupError> {
        self.weblogs
            .get(handle)
            .ok_or_else(|| LookupError::unknown_weblog(handle))
    }
}

impl WeblogLookup for InMemoryWeblogs {
    fn weblog(&self, handle: &str) -> Result<Option<WeblogRecord>, LookupError> {
        Ok(self.weblogs.get(handle).cloned())
    }

    fn entry_by_anchor(
        &self,
        handle: &str,
        anchor: &str,
    ) -> Result<Option<EntryRecord>, LookupError> {
        let weblog = self.require(handle)?;
        Ok(weblog
            .entries
            .iter()
            .find(|entry| entry.anchor == anchor)
            .cloned())
    }

    fn category_by_name(
        &self,
        handle: &str,
        name: &str,
    ) -> Result<Option<CategoryRecord>, LookupError> {
        let weblog = self.require(handle)?;
        Ok(weblog
            .categories
            .iter()
            .find(|category| category.name == name)
            .cloned())
    }

    fn template_by_link(
        &self,
        handle: &str,
        link: &str,
    ) -> Result<Option<TemplateRecord>, LookupError> {
        let weblog = self.require(handle)?;
        Ok(weblog
            .templates
            .iter()
            .find(|template| template.link == link)
            .cloned())
    }

    fn theme_by_name(&self, name: &str) -> Result<Option<ThemeRecord>, LookupError> {
        Ok(self.themes.get(name).cloned())
    }
}
