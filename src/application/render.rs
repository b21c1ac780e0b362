//! Page and planet views served by the rendering routes.
//!
//! A view is the JSON document a template engine would be handed: the
//! classified request plus the entities it resolved to.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, instrument};

use crate::{
    application::error::AppError,
    cache::{CachedPage, PlanetCache, WeblogPageCache},
    domain::{
        entities::{CategoryRecord, EntryRecord, TemplateRecord, ThemeRecord},
        lookup::WeblogLookup,
    },
    request::{PageContext, PlanetRequest, PreviewOptions, QueryParams, WeblogPageRequest},
};

pub const VIEW_CONTENT_TYPE: &str = "application/json";

/// Output of a render call.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub page: CachedPage,
    /// Key the output is cached under; `None` for uncached renders.
    pub cache_key: Option<String>,
    pub cache_hit: bool,
}

#[derive(Debug, Serialize)]
struct PageView<'a> {
    weblog: WeblogView<'a>,
    context: PageContext,
    locale: Option<&'a str>,
    anchor: Option<&'a str>,
    date: Option<&'a str>,
    category_name: Option<&'a str>,
    page_name: Option<&'a str>,
    tags: Option<&'a [String]>,
    page_number: u32,
    user: Option<&'a str>,
    parameters: &'a QueryParams,
    preview: Option<&'a PreviewOptions>,
    entry: Option<&'a EntryRecord>,
    category: Option<&'a CategoryRecord>,
    template: Option<&'a TemplateRecord>,
    theme: Option<&'a ThemeRecord>,
}

#[derive(Debug, Serialize)]
struct WeblogView<'a> {
    handle: &'a str,
    name: &'a str,
    theme: &'a str,
}

#[derive(Debug, Serialize)]
struct PlanetView<'a> {
    #[serde(flatten)]
    request: &'a PlanetRequest,
    last_modified: String,
}

pub struct RenderService {
    lookup: Arc<dyn WeblogLookup>,
    pages: Arc<WeblogPageCache>,
    planet: Arc<PlanetCache>,
}

impl RenderService {
    pub fn new(
        lookup: Arc<dyn WeblogLookup>,
        pages: Arc<WeblogPageCache>,
        planet: Arc<PlanetCache>,
    ) -> Self {
        Self {
            lookup,
            pages,
            planet,
        }
    }

    /// Render a weblog page, consulting the page cache unless previewing.
    #[instrument(skip_all, fields(weblog = request.weblog_handle(), context = %request.context()))]
    pub fn render_page(&self, request: &WeblogPageRequest) -> Result<Rendered, AppError> {
        record_hit(request);

        if request.is_preview() {
            let page = self.build_page(request)?;
            return Ok(Rendered {
                page,
                cache_key: None,
                cache_hit: false,
            });
        }

        let key = WeblogPageCache::key(request);
        if let Some(page) = self.pages.get(&key) {
            return Ok(Rendered {
                page,
                cache_key: Some(key),
                cache_hit: true,
            });
        }

        let page = self.build_page(request)?;
        self.pages.put(key.clone(), page.clone());
        Ok(Rendered {
            page,
            cache_key: Some(key),
            cache_hit: false,
        })
    }

    #[instrument(skip_all, fields(kind = %request.kind))]
    pub fn render_planet(&self, request: &PlanetRequest) -> Result<Rendered, AppError> {
        let key = PlanetCache::key(request);
        if let Some(page) = self.planet.get(&key) {
            return Ok(Rendered {
                page,
                cache_key: Some(key),
                cache_hit: true,
            });
        }

        let last_modified = self
            .planet
            .last_modified()
            .format(&Rfc3339)
            .map_err(|err| AppError::unexpected(format!("failed to format timestamp: {err}")))?;
        let view = PlanetView {
            request,
            last_modified,
        };
        let page = to_page(&view)?;

        self.planet.put(key.clone(), page.clone());
        Ok(Rendered {
            page,
            cache_key: Some(key),
            cache_hit: false,
        })
    }

    fn build_page(&self, request: &WeblogPageRequest) -> Result<CachedPage, AppError> {
        let started = Instant::now();
        let lookup = self.lookup.as_ref();

        let weblog = lookup
            .weblog(request.weblog_handle())?
            .ok_or_else(|| AppError::not_found("weblog", request.weblog_handle()))?;

        let entry = request.entry(lookup);
        if request.context() == PageContext::Entry && entry.is_none() {
            return Err(AppError::not_found(
                "entry",
                request.entry_anchor().unwrap_or_default(),
            ));
        }

        let template = request.template(lookup);
        if let (Some(name), None) = (request.custom_page_name(), template) {
            return Err(AppError::not_found("page", name));
        }

        let view = PageView {
            weblog: WeblogView {
                handle: &weblog.handle,
                name: &weblog.name,
                theme: &weblog.theme,
            },
            context: request.context(),
            locale: request.locale(),
            anchor: request.anchor(),
            date: request.date_string(),
            category_name: request.category_name(),
            page_name: request.custom_page_name(),
            tags: request.tags(),
            page_number: request.page_number(),
            user: request.authentic_user(),
            parameters: request.custom_parameters(),
            preview: request.preview(),
            entry,
            category: request.category(lookup),
            template,
            theme: request.theme(lookup),
        };
        let page = to_page(&view)?;

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        histogram!("roller_render_ms").record(elapsed_ms);
        debug!(elapsed_ms, bytes = page.body.len(), "page view rendered");
        Ok(page)
    }
}

fn record_hit(request: &WeblogPageRequest) {
    if request.is_homepage_hit() {
        counter!("roller_page_hits_total", "kind" => "homepage").increment(1);
    } else if request.is_content_page_hit() {
        counter!("roller_page_hits_total", "kind" => "content").increment(1);
    }
}

fn to_page<T: Serialize>(view: &T) -> Result<CachedPage, AppError> {
    let body = serde_json::to_vec(view)
        .map_err(|err| AppError::unexpected(format!("failed to serialise view: {err}")))?;
    Ok(CachedPage::new(VIEW_CONTENT_TYPE, body))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::cache::CacheConfig;
    use crate::domain::lookup::tests::sample_site;
    use crate::request::{
        PAGE_MOUNT_POINT, PREVIEW_MOUNT_POINT, PageRequestParser, RawRequest,
    };

    fn service() -> RenderService {
        RenderService::new(
            Arc::new(sample_site()),
            Arc::new(WeblogPageCache::new(&CacheConfig::weblog_page())),
            Arc::new(PlanetCache::new(&CacheConfig::planet())),
        )
    }

    fn page(path: &str) -> WeblogPageRequest {
        PageRequestParser::page(3)
            .classify(&RawRequest::new(PAGE_MOUNT_POINT, Some(path)))
            .expect("valid request")
    }

    fn json(rendered: &Rendered) -> Value {
        serde_json::from_slice(&rendered.page.body).expect("json body")
    }

    #[test]
    fn entry_view_resolves_entry_and_is_cached() {
        let service = service();
        let request = page("/alice/entry/hello%20world");

        let first = service.render_page(&request).expect("rendered");
        assert!(!first.cache_hit);
        let body = json(&first);
        assert_eq!(body["context"], "entry");
        assert_eq!(body["entry"]["title"], "Hello World");
        assert_eq!(body["weblog"]["name"], "Alice Writes");

        let second = service.render_page(&page("/alice/entry/hello%20world")).expect("rendered");
        assert!(second.cache_hit);
        assert_eq!(second.cache_key, first.cache_key);
        assert_eq!(second.page, first.page);
    }

    #[test]
    fn tag_index_and_homepage_are_cached_apart() {
        let service = service();

        let index = service.render_page(&page("/alice/tags/")).expect("rendered");
        assert_eq!(json(&index)["context"], "tags");

        let homepage = service.render_page(&page("/alice")).expect("rendered");
        assert!(!homepage.cache_hit);
        assert_ne!(homepage.cache_key, index.cache_key);
        assert_eq!(json(&homepage)["context"], "none");
    }

    #[test]
    fn missing_entities_are_not_found() {
        let service = service();
        assert!(matches!(
            service.render_page(&page("/alice/entry/nope")),
            Err(AppError::NotFound { what: "entry", .. })
        ));
        assert!(matches!(
            service.render_page(&page("/alice/page/missing")),
            Err(AppError::NotFound { what: "page", .. })
        ));
        assert!(matches!(
            service.render_page(&page("/bob")),
            Err(AppError::NotFound { what: "weblog", .. })
        ));
    }

    #[test]
    fn preview_renders_are_never_cached() {
        let service = service();
        let request = PageRequestParser::preview(3)
            .classify(
                &RawRequest::new(PREVIEW_MOUNT_POINT, Some("/alice"))
                    .with_query(QueryParams::parse("theme=basic&previewEntry=hello%20world"))
                    .with_principal("alice"),
            )
            .expect("valid");

        let rendered = service.render_page(&request).expect("rendered");
        assert!(rendered.cache_key.is_none());
        let body = json(&rendered);
        assert_eq!(body["theme"]["name"], "basic");
        assert_eq!(body["entry"]["anchor"], "hello world");
        assert_eq!(body["preview"]["type"], "standard");
        assert_eq!(body["user"], Value::Null);

        assert!(!service.render_page(&request).expect("rendered").cache_hit);
    }

    #[test]
    fn planet_view_is_cached_with_last_modified() {
        let service = service();
        let request = PlanetRequest::new("feed", "en")
            .with_flavor("rss")
            .with_excerpts(true);

        let first = service.render_planet(&request).expect("rendered");
        assert_eq!(
            first.cache_key.as_deref(),
            Some("cache.planet:planet/feed/rss/en/excerpts")
        );
        let body = json(&first);
        assert_eq!(body["type"], "feed");
        assert!(body["last_modified"].as_str().is_some());

        assert!(service.render_planet(&request).expect("rendered").cache_hit);
    }
}
