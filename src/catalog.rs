//! Remote directory listing client.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, instrument};

use crate::error::{CatalogError, Error};
use crate::timestamp::Timestamp;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("href pattern is valid")
});

/// Where new images come from.
pub trait RemoteSource {
    /// Absolute URLs of every listed image matching the configured suffix.
    fn candidates(&self) -> impl Future<Output = Result<Vec<String>, CatalogError>> + Send;

    /// Fetch `url` and store it at `dest`, replacing any existing file.
    fn download(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// Timestamp embedded in a candidate URL.
    fn timestamp_of(&self, url: &str) -> Result<Timestamp, Error>;
}

/// HTTP implementation of [`RemoteSource`] over an HTML directory listing.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    match_suffix: String,
}

impl HttpCatalog {
    pub fn new(
        base_url: impl Into<String>,
        match_suffix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            match_suffix: match_suffix.into(),
        })
    }
}

impl RemoteSource for HttpCatalog {
    async fn candidates(&self) -> Result<Vec<String>, CatalogError> {
        fetch_candidates(&self.client, &self.base_url, &self.match_suffix).await
    }

    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    async fn download(&self, url: &str, dest: &Path) -> Result<(), CatalogError> {
        let failed = |source| CatalogError::Download {
            url: url.to_string(),
            source,
        };
        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?
            .bytes()
            .await
            .map_err(failed)?;

        // Write beside the target and rename so a reader never sees a partial file
        // and a second image for the same minute overwrites the first.
        let part = dest.with_extension("part");
        if let Err(err) = fs::write(&part, &bytes).and_then(|()| fs::rename(&part, dest)) {
            if let Err(cleanup) = fs::remove_file(&part) {
                debug!(part = %part.display(), "no partial file to remove: {cleanup}");
            }
            return Err(err.into());
        }
        debug!(bytes = bytes.len(), "download complete");
        Ok(())
    }

    fn timestamp_of(&self, url: &str) -> Result<Timestamp, Error> {
        timestamp_of(url, &self.base_url, &self.match_suffix)
    }
}

/// Read the listing at `base_url` once and return matching absolute URLs.
///
/// # Errors
/// Returns [`CatalogError`] on connection failures and non-success status codes.
/// Callers treat an error the same as an empty listing.
#[instrument(skip(client))]
pub async fn fetch_candidates(
    client: &reqwest::Client,
    base_url: &str,
    match_suffix: &str,
) -> Result<Vec<String>, CatalogError> {
    let response = client.get(base_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CatalogError::Status {
            status: status.as_u16(),
            url: base_url.to_string(),
        });
    }
    let page = response.text().await?;
    let urls = extract_links(&page, base_url, match_suffix);
    debug!(count = urls.len(), "images available for download");
    Ok(urls)
}

/// Hyperlink targets in `html` ending with `match_suffix`, resolved against `base_url`.
#[must_use]
pub fn extract_links(html: &str, base_url: &str, match_suffix: &str) -> Vec<String> {
    HREF.captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| m.as_str().trim())
        .filter(|href| href.ends_with(match_suffix))
        .map(|href| {
            if href.starts_with("http://") || href.starts_with("https://") {
                href.to_string()
            } else {
                format!("{base_url}{href}")
            }
        })
        .collect()
}

/// Timestamp encoded in a listing URL such as `<base>20232851230_<suffix>`.
///
/// # Errors
/// Returns [`Error::MalformedName`] if the name between `base_url` and
/// `match_suffix` is not a timestamp.
pub fn timestamp_of(url: &str, base_url: &str, match_suffix: &str) -> Result<Timestamp, Error> {
    let name = url
        .strip_prefix(base_url)
        .or_else(|| url.rsplit('/').next())
        .unwrap_or(url);
    let stem = name
        .strip_suffix(match_suffix)
        .ok_or_else(|| Error::MalformedName(url.to_string()))?;
    let stem = stem.strip_suffix('_').unwrap_or(stem);
    stem.parse()
        .map_err(|_| Error::MalformedName(url.to_string()))
}
