//! Classification of weblog page requests.
//!
//! Path info below a mount point has the shape
//! `/<handle>[/<locale>][/<context>[/<rest>]]` where context is one of
//!
//! - `entry/<anchor>`: permalink
//! - `date/<YYYYMM[DD]>`: date collection
//! - `category/<name>`: category collection
//! - `tags/<tag>+<tag>`: tag intersection
//! - `page/<link>`: custom template
//!
//! An absent context is the weblog homepage. Query parameters `entry`,
//! `anchor`, `date` and `cat` are only honoured on the homepage and on custom
//! pages, so path and query selectors never mix.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::domain::{
    entities::{CategoryRecord, EntryRecord, TemplateRecord, ThemeRecord},
    lookup::WeblogLookup,
};

use super::{
    decode::{decode, is_valid_date_string, split_tags},
    error::InvalidRequestError,
    params::QueryParams,
    preview::PreviewOptions,
    resolve::Resolved,
    weblog::{RawRequest, WeblogEnvelope},
};

pub const PAGE_MOUNT_POINT: &str = "/roller-ui/rendering/page";
pub const PREVIEW_MOUNT_POINT: &str = "/roller-ui/authoring/preview";

/// Default for `tags.queries.maxIntersectionSize`.
pub const DEFAULT_MAX_TAGS: usize = 3;

/// Which kind of weblog view a request selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageContext {
    Entry,
    Date,
    Category,
    Page,
    Tags,
    /// Weblog homepage.
    None,
}

impl PageContext {
    pub fn as_str(self) -> &'static str {
        match self {
            PageContext::Entry => "entry",
            PageContext::Date => "date",
            PageContext::Category => "category",
            PageContext::Page => "page",
            PageContext::Tags => "tags",
            PageContext::None => "none",
        }
    }
}

impl fmt::Display for PageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binds a parser to one mount point and decides what the resulting
/// requests may reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestProfile {
    pub mount_point: &'static str,
    /// When false the authenticated principal is never exposed.
    pub allow_identity: bool,
    /// Read the preview-only `theme`, `type` and `previewEntry` parameters.
    pub preview: bool,
}

impl RequestProfile {
    pub const fn page() -> Self {
        Self {
            mount_point: PAGE_MOUNT_POINT,
            allow_identity: true,
            preview: false,
        }
    }

    pub const fn preview() -> Self {
        Self {
            mount_point: PREVIEW_MOUNT_POINT,
            allow_identity: false,
            preview: true,
        }
    }

    pub fn is_valid_destination(&self, servlet_path: &str) -> bool {
        servlet_path == self.mount_point
    }
}

/// Stateless page-request classifier, safe to share across request tasks.
#[derive(Debug, Clone)]
pub struct PageRequestParser {
    profile: RequestProfile,
    max_tags: usize,
}

impl PageRequestParser {
    pub fn new(profile: RequestProfile, max_tags: usize) -> Self {
        Self { profile, max_tags }
    }

    pub fn page(max_tags: usize) -> Self {
        Self::new(RequestProfile::page(), max_tags)
    }

    pub fn preview(max_tags: usize) -> Self {
        Self::new(RequestProfile::preview(), max_tags)
    }

    pub fn profile(&self) -> RequestProfile {
        self.profile
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    pub fn classify(&self, raw: &RawRequest) -> Result<WeblogPageRequest, InvalidRequestError> {
        if !self.profile.is_valid_destination(&raw.servlet_path) {
            return Err(InvalidRequestError::Destination {
                servlet: raw.servlet_path.clone(),
                url: raw.url(),
            });
        }

        let envelope = WeblogEnvelope::parse(raw)?;
        let query = &raw.query;
        let mut request = WeblogPageRequest::new(envelope.handle, self.profile.allow_identity);
        request.locale = envelope.locale;
        if self.profile.allow_identity {
            request.authentic_user = raw.principal.clone();
        }

        let page_path = envelope
            .page_path
            .filter(|path| !path.trim().is_empty());
        debug!(path = page_path.as_deref().unwrap_or(""), "parsing path");

        match page_path.as_deref() {
            Some(path) => self.apply_path(&mut request, path, raw)?,
            None => request.homepage_hit = true,
        }

        if page_path.is_none() || request.custom_page_name.is_some() {
            apply_query_selectors(&mut request, query, raw)?;
        }

        if let Some(page) = query.first("page") {
            match page.parse::<u32>() {
                Ok(number) => request.page_number = number,
                Err(_) => debug!(page, "ignoring unparsable page number"),
            }
        }

        request.custom_parameters = query.without_reserved();

        if self.profile.preview {
            request.preview = Some(PreviewOptions::from_query(query));
        }

        debug!(
            weblog = %request.weblog_handle,
            context = %request.context,
            anchor = request.anchor.as_deref().unwrap_or(""),
            date = request.date_string.as_deref().unwrap_or(""),
            category = request.category_name.as_deref().unwrap_or(""),
            tags = ?request.tags,
            page = request.custom_page_name.as_deref().unwrap_or(""),
            page_number = request.page_number,
            "classified weblog page request"
        );

        Ok(request)
    }

    fn apply_path(
        &self,
        request: &mut WeblogPageRequest,
        path: &str,
        raw: &RawRequest,
    ) -> Result<(), InvalidRequestError> {
        let (context, rest) = match path.split_once('/') {
            Some((context, rest)) => (context, Some(rest)),
            None => (path, None),
        };

        let Some(rest) = rest else {
            // only the tags view has an index without a selector
            if context == "tags" {
                request.context = PageContext::Tags;
                return Ok(());
            }
            return Err(InvalidRequestError::BareContext {
                context: context.to_string(),
                url: raw.url(),
            });
        };

        match context {
            "entry" => {
                request.context = PageContext::Entry;
                request.anchor = Some(decode(rest));
                request.content_page_hit = true;
            }
            "date" => {
                if !is_valid_date_string(Some(rest)) {
                    return Err(InvalidRequestError::InvalidDate {
                        value: rest.to_string(),
                        url: raw.url(),
                    });
                }
                request.context = PageContext::Date;
                request.date_string = Some(rest.to_string());
                request.content_page_hit = true;
            }
            "category" => {
                request.context = PageContext::Category;
                request.category_name = Some(decode(rest));
                request.content_page_hit = true;
            }
            "page" => {
                request.context = PageContext::Page;
                // kept verbatim, the link may carry a file extension
                request.custom_page_name = Some(rest.to_string());
                if let Some(tags) = raw.query.first("tags") {
                    request.tags = Some(split_tags(&decode(tags)));
                }
                // in-theme assets such as `styles.css` are not page views
                request.content_page_hit = !rest.contains('.');
            }
            "tags" => {
                let tags = split_tags(&decode(&rest.replace('+', " ")));
                if tags.len() > self.max_tags {
                    return Err(InvalidRequestError::TooManyTags {
                        max: self.max_tags,
                        url: raw.url(),
                    });
                }
                request.context = PageContext::Tags;
                request.tags = Some(tags);
                request.content_page_hit = true;
            }
            other => {
                return Err(InvalidRequestError::UnsupportedContext {
                    context: other.to_string(),
                    url: raw.url(),
                });
            }
        }

        Ok(())
    }
}

/// Legacy query-string selectors.
fn apply_query_selectors(
    request: &mut WeblogPageRequest,
    query: &QueryParams,
    raw: &RawRequest,
) -> Result<(), InvalidRequestError> {
    let anchor = match query.first("entry") {
        Some(entry) => Some(entry),
        None => query.first("anchor"),
    };
    if let Some(anchor) = anchor.filter(|anchor| !anchor.is_empty()) {
        request.anchor = Some(anchor.to_string());
    }

    if request.anchor.is_some() || request.tags.is_some() {
        return Ok(());
    }

    if let Some(date) = query.first("date") {
        if !is_valid_date_string(Some(date)) {
            return Err(InvalidRequestError::InvalidDate {
                value: date.to_string(),
                url: raw.url(),
            });
        }
        request.date_string = Some(date.to_string());
    }

    if let Some(category) = query.first("cat") {
        request.category_name = Some(decode(category));
    }

    Ok(())
}

/// A classified weblog page request.
///
/// Built once per inbound request by [`PageRequestParser::classify`]. The
/// setters exist for overrides and tests; the heavyweight lookups are
/// memoised per instance.
#[derive(Debug, Clone)]
pub struct WeblogPageRequest {
    weblog_handle: String,
    locale: Option<String>,
    authentic_user: Option<String>,
    allow_identity: bool,
    context: PageContext,
    anchor: Option<String>,
    date_string: Option<String>,
    category_name: Option<String>,
    custom_page_name: Option<String>,
    tags: Option<Vec<String>>,
    page_number: u32,
    custom_parameters: QueryParams,
    homepage_hit: bool,
    content_page_hit: bool,
    preview: Option<PreviewOptions>,
    entry: Resolved<EntryRecord>,
    category: Resolved<CategoryRecord>,
    template: Resolved<TemplateRecord>,
    theme: Resolved<ThemeRecord>,
}

impl WeblogPageRequest {
    /// An unclassified homepage request for `weblog_handle`.
    pub fn new(weblog_handle: impl Into<String>, allow_identity: bool) -> Self {
        Self {
            weblog_handle: weblog_handle.into(),
            locale: None,
            authentic_user: None,
            allow_identity,
            context: PageContext::None,
            anchor: None,
            date_string: None,
            category_name: None,
            custom_page_name: None,
            tags: None,
            page_number: 0,
            custom_parameters: QueryParams::new(),
            homepage_hit: false,
            content_page_hit: false,
            preview: None,
            entry: Resolved::new(),
            category: Resolved::new(),
            template: Resolved::new(),
            theme: Resolved::new(),
        }
    }

    pub fn weblog_handle(&self) -> &str {
        &self.weblog_handle
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn context(&self) -> PageContext {
        self.context
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn date_string(&self) -> Option<&str> {
        self.date_string.as_deref()
    }

    pub fn category_name(&self) -> Option<&str> {
        self.category_name.as_deref()
    }

    pub fn custom_page_name(&self) -> Option<&str> {
        self.custom_page_name.as_deref()
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn custom_parameters(&self) -> &QueryParams {
        &self.custom_parameters
    }

    pub fn is_homepage_hit(&self) -> bool {
        self.homepage_hit
    }

    pub fn is_content_page_hit(&self) -> bool {
        self.content_page_hit
    }

    /// Authenticated user; always `None` for profiles that hide identity.
    pub fn authentic_user(&self) -> Option<&str> {
        if !self.allow_identity {
            return None;
        }
        self.authentic_user.as_deref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.authentic_user().is_some()
    }

    pub fn preview(&self) -> Option<&PreviewOptions> {
        self.preview.as_ref()
    }

    pub fn is_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn set_anchor(&mut self, anchor: Option<String>) {
        self.anchor = anchor;
        self.entry = Resolved::new();
    }

    pub fn set_date_string(&mut self, date: Option<String>) {
        self.date_string = date;
    }

    pub fn set_category_name(&mut self, name: Option<String>) {
        self.category_name = name;
        self.category = Resolved::new();
    }

    pub fn set_custom_page_name(&mut self, name: Option<String>) {
        self.custom_page_name = name;
        self.template = Resolved::new();
    }

    pub fn set_tags(&mut self, tags: Option<Vec<String>>) {
        self.tags = tags;
    }

    pub fn set_page_number(&mut self, page_number: u32) {
        self.page_number = page_number;
    }

    pub fn set_custom_parameters(&mut self, params: QueryParams) {
        self.custom_parameters = params;
    }

    pub fn set_entry(&mut self, entry: EntryRecord) {
        self.entry = Resolved::with_value(entry);
    }

    /// Anchor used to resolve the entry; a preview entry wins over the path.
    pub fn entry_anchor(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .and_then(|preview| preview.preview_entry.as_deref())
            .or(self.anchor.as_deref())
    }

    pub fn entry(&self, lookup: &dyn WeblogLookup) -> Option<&EntryRecord> {
        if let Some(entry) = self.entry.get() {
            return Some(entry);
        }
        let anchor = self.entry_anchor()?;
        self.entry.get_or_resolve("entry", anchor, || {
            lookup.entry_by_anchor(&self.weblog_handle, anchor)
        })
    }

    pub fn category(&self, lookup: &dyn WeblogLookup) -> Option<&CategoryRecord> {
        let name = self.category_name.as_deref()?;
        self.category.get_or_resolve("category", name, || {
            lookup.category_by_name(&self.weblog_handle, name)
        })
    }

    pub fn template(&self, lookup: &dyn WeblogLookup) -> Option<&TemplateRecord> {
        let link = self.custom_page_name.as_deref()?;
        self.template.get_or_resolve("template", link, || {
            lookup.template_by_link(&self.weblog_handle, link)
        })
    }

    /// Theme named by a preview request. Unknown themes read as absent.
    pub fn theme(&self, lookup: &dyn WeblogLookup) -> Option<&ThemeRecord> {
        let name = self.preview.as_ref()?.theme_name.as_deref()?;
        self.theme
            .get_or_resolve("theme", name, || lookup.theme_by_name(name))
    }
}
