//! Cache key derivation.
//!
//! Keys are pure functions of the request descriptor: two descriptors that
//! would render the same output produce the same key.

use sha2::{Digest, Sha256};

use crate::request::{PlanetRequest, QueryParams, WeblogPageRequest};

pub const PLANET_CACHE_ID: &str = "cache.planet";
pub const WEBLOG_PAGE_CACHE_ID: &str = "cache.weblogpage";
pub const SALT_CACHE_ID: &str = "cache.salt";

/// Hex digits of the custom-parameter digest kept in page keys.
const PARAMS_DIGEST_LEN: usize = 16;

/// Key for a planet view.
///
/// `cache.planet:<context>/<type>[/<flavor>]/<language>` followed by
/// `/excerpts` (feeds only), `/user=<user>` (pages only) and `/group=<group>`.
pub fn planet_key(request: &PlanetRequest) -> String {
    let mut key = format!("{PLANET_CACHE_ID}:{}/{}", request.context, request.kind);

    if let Some(flavor) = &request.flavor {
        key.push('/');
        key.push_str(flavor);
    }

    key.push('/');
    key.push_str(&request.language);

    if request.flavor.is_some() {
        if request.excerpts {
            key.push_str("/excerpts");
        }
    } else if let Some(user) = &request.authentic_user {
        key.push_str("/user=");
        key.push_str(user);
    }

    if let Some(group) = &request.group {
        key.push_str("/group=");
        key.push_str(group);
    }

    key
}

/// Key for a rendered weblog page.
///
/// `cache.weblogpage:<handle>/ctx=<context>` followed by every selector that
/// is set: `/page/<link>`, `/entry/<anchor>`, `/date/<date>`,
/// `/category/<name>`, `/tags/<a>+<b>`, then `/locale=`, `/user=`, `/page=`,
/// `/preview=<theme>/<type>` and `/params=<digest>`. Values are
/// percent-encoded so they cannot forge a separator or a label.
pub fn weblog_page_key(request: &WeblogPageRequest) -> String {
    let mut key = format!(
        "{WEBLOG_PAGE_CACHE_ID}:{}/ctx={}",
        segment(request.weblog_handle()),
        request.context()
    );

    let selectors = [
        ("/page/", request.custom_page_name()),
        ("/entry/", request.entry_anchor()),
        ("/date/", request.date_string()),
        ("/category/", request.category_name()),
    ];
    for (label, value) in selectors {
        if let Some(value) = value {
            key.push_str(label);
            key.push_str(&segment(value));
        }
    }

    if let Some(tags) = request.tags().filter(|tags| !tags.is_empty()) {
        key.push_str("/tags/");
        key.push_str(&canonical_tags(tags));
    }

    if let Some(locale) = request.locale() {
        key.push_str("/locale=");
        key.push_str(&segment(locale));
    }

    if let Some(user) = request.authentic_user() {
        key.push_str("/user=");
        key.push_str(&segment(user));
    }

    if request.page_number() > 0 {
        key.push_str(&format!("/page={}", request.page_number()));
    }

    if let Some(preview) = request.preview() {
        key.push_str("/preview=");
        key.push_str(&segment(preview.theme_name.as_deref().unwrap_or("")));
        key.push('/');
        key.push_str(&segment(&preview.page_type));
    }

    if !request.custom_parameters().is_empty() {
        key.push_str("/params=");
        key.push_str(&params_digest(request.custom_parameters()));
    }

    key
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn canonical_tags(tags: &[String]) -> String {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted
        .into_iter()
        .map(segment)
        .collect::<Vec<_>>()
        .join("+")
}

/// Digest of the custom parameters in name order, values in request order.
fn params_digest(params: &QueryParams) -> String {
    let mut hasher = Sha256::new();
    for (name, values) in params.iter() {
        for value in values {
            hasher.update(segment(name).as_bytes());
            hasher.update(b"=");
            hasher.update(segment(value).as_bytes());
            hasher.update(b"&");
        }
    }

    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(PARAMS_DIGEST_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{PAGE_MOUNT_POINT, PREVIEW_MOUNT_POINT, PageRequestParser, RawRequest};

    fn classify(path: &str, query: &str) -> WeblogPageRequest {
        PageRequestParser::page(3)
            .classify(
                &RawRequest::new(PAGE_MOUNT_POINT, Some(path)).with_query(QueryParams::parse(query)),
            )
            .expect("valid request")
    }

    #[test]
    fn planet_feed_with_excerpts() {
        let request = PlanetRequest::new("feed", "en")
            .with_flavor("rss")
            .with_excerpts(true);
        assert_eq!(planet_key(&request), "cache.planet:planet/feed/rss/en/excerpts");
    }

    #[test]
    fn planet_page_with_user() {
        let request = PlanetRequest::new("page", "en").with_user("alice");
        assert_eq!(planet_key(&request), "cache.planet:planet/page/en/user=alice");
    }

    #[test]
    fn planet_user_ignored_for_feeds_and_excerpts_ignored_for_pages() {
        let feed = PlanetRequest::new("feed", "en")
            .with_flavor("atom")
            .with_user("alice");
        assert_eq!(planet_key(&feed), "cache.planet:planet/feed/atom/en");

        let page = PlanetRequest::new("page", "fr").with_excerpts(true);
        assert_eq!(planet_key(&page), "cache.planet:planet/page/fr");
    }

    #[test]
    fn planet_group_is_always_appended() {
        let feed = PlanetRequest::new("feed", "en")
            .with_flavor("rss")
            .with_excerpts(true)
            .with_group("rust");
        assert_eq!(
            planet_key(&feed),
            "cache.planet:planet/feed/rss/en/excerpts/group=rust"
        );

        let page = PlanetRequest::new("page", "en")
            .with_user("bob")
            .with_group("rust");
        assert_eq!(
            planet_key(&page),
            "cache.planet:planet/page/en/user=bob/group=rust"
        );
    }

    #[test]
    fn page_key_for_entry() {
        let request = classify("alice/entry/hello%20world", "");
        assert_eq!(
            weblog_page_key(&request),
            "cache.weblogpage:alice/ctx=entry/entry/hello%20world"
        );
    }

    #[test]
    fn page_key_for_homepage_with_locale_and_page_number() {
        let request = classify("alice/de_DE", "page=2");
        assert_eq!(weblog_page_key(&request), "cache.weblogpage:alice/ctx=none/locale=de_DE/page=2");
    }

    #[test]
    fn page_key_for_custom_page_with_date_and_category() {
        let request = classify("alice/page/archive", "date=200607&cat=Tech");
        assert_eq!(
            weblog_page_key(&request),
            "cache.weblogpage:alice/ctx=page/page/archive/date/200607/category/Tech"
        );
    }

    #[test]
    fn tags_are_canonicalised() {
        let a = classify("alice/tags/rust+java", "");
        let b = classify("alice/tags/java+rust+java", "");
        assert_eq!(weblog_page_key(&a), weblog_page_key(&b));
        assert_eq!(weblog_page_key(&a), "cache.weblogpage:alice/ctx=tags/tags/java+rust");
    }

    #[test]
    fn separators_inside_values_are_encoded() {
        let request = classify("alice/category/a%2Fb", "");
        assert_eq!(
            weblog_page_key(&request),
            "cache.weblogpage:alice/ctx=category/category/a%2Fb"
        );
    }

    #[test]
    fn custom_parameters_are_digested_in_canonical_order() {
        let a = classify("alice", "z=1&a=2");
        let b = classify("alice", "a=2&z=1");
        let c = classify("alice", "a=3&z=1");
        let key = weblog_page_key(&a);

        assert_eq!(key, weblog_page_key(&b));
        assert_ne!(key, weblog_page_key(&c));
        let digest = key
            .strip_prefix("cache.weblogpage:alice/ctx=none/params=")
            .expect("params suffix");
        assert_eq!(digest.len(), PARAMS_DIGEST_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn user_segment_only_for_identity_profiles() {
        let page = PageRequestParser::page(3)
            .classify(&RawRequest::new(PAGE_MOUNT_POINT, Some("alice")).with_principal("bob"))
            .expect("valid");
        assert_eq!(weblog_page_key(&page), "cache.weblogpage:alice/ctx=none/user=bob");

        let preview = PageRequestParser::preview(3)
            .classify(
                &RawRequest::new(PREVIEW_MOUNT_POINT, Some("alice"))
                    .with_principal("bob")
                    .with_query(QueryParams::parse("theme=basic")),
            )
            .expect("valid");
        let key = weblog_page_key(&preview);
        assert!(
            key.starts_with("cache.weblogpage:alice/ctx=none/preview=basic/standard/params="),
            "{key}"
        );
        assert!(!key.contains("user="));
    }

    #[test]
    fn selectors_with_equal_values_do_not_collide() {
        let date = classify("alice/date/200607", "");
        let category = classify("alice/category/200607", "");
        let locale = classify("alice/de", "");
        let category_de = classify("alice/category/de", "");

        assert_ne!(weblog_page_key(&date), weblog_page_key(&category));
        assert_ne!(weblog_page_key(&locale), weblog_page_key(&category_de));
    }

    #[test]
    fn context_is_part_of_the_key() {
        let keys = [
            weblog_page_key(&classify("alice", "")),
            weblog_page_key(&classify("alice/tags/", "")),
            weblog_page_key(&classify("alice/category/Tech", "")),
            weblog_page_key(&classify("alice", "cat=Tech")),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn tags_are_kept_next_to_an_entry_anchor() {
        let a = classify("alice/page/x", "entry=e&tags=a");
        let b = classify("alice/page/x", "entry=e&tags=b");
        assert_ne!(weblog_page_key(&a), weblog_page_key(&b));
        assert_eq!(
            weblog_page_key(&a),
            "cache.weblogpage:alice/ctx=page/page/x/entry/e/tags/a"
        );
    }

    #[test]
    fn keys_are_deterministic() {
        let request = classify("alice/date/20060712", "page=1&x=y");
        assert_eq!(weblog_page_key(&request), weblog_page_key(&request.clone()));
    }
}
