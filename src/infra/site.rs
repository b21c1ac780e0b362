//! Site file loading for the in-memory weblog lookup.

use std::path::Path;

use tracing::info;

use crate::domain::lookup::{InMemoryWeblogs, SiteContents};

use super::error::InfraError;

/// Read and parse a TOML site file.
pub async fn load_site(path: &Path) -> Result<InMemoryWeblogs, InfraError> {
    let shown = path.display().to_string();
    let raw = tokio::fs::read_to_string(path).await?;
    let weblogs = parse_site(&raw).map_err(|message| InfraError::site(&shown, message))?;

    info!(
        path = %shown,
        weblogs = weblogs.weblog_count(),
        "site file loaded"
    );
    Ok(weblogs)
}

pub fn parse_site(raw: &str) -> Result<InMemoryWeblogs, String> {
    let contents: SiteContents = toml::from_str(raw).map_err(|err| err.to_string())?;
    Ok(InMemoryWeblogs::new(contents))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::lookup::WeblogLookup;

    const SITE: &str = r#"
[[weblogs]]
handle = "carol"
name = "Carol's Notes"
theme = "plain"

[[weblogs.entries]]
anchor = "first"
title = "First"
"#;

    #[tokio::test]
    async fn loads_site_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SITE.as_bytes()).expect("write site");

        let site = load_site(file.path()).await.expect("site loads");
        assert_eq!(site.weblog_count(), 1);
        assert!(
            site.entry_by_anchor("carol", "first")
                .expect("lookup succeeds")
                .is_some()
        );
    }

    #[tokio::test]
    async fn reports_missing_and_malformed_files() {
        let missing = load_site(Path::new("/nonexistent/site.toml")).await;
        assert!(matches!(missing, Err(InfraError::Io(_))));

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"[[weblogs]]\nhandle = 3\n").expect("write site");
        let malformed = load_site(file.path()).await;
        assert!(matches!(malformed, Err(InfraError::Site { .. })));
    }
}
