//! Photo catalog: list photos, optionally filtered by a search term.
//!
//! An empty successful listing means "no match" and is distinct from a fetch failure.

use async_trait::async_trait;
use serde::Deserialize;

/// One photo as returned by the listing API. Only `path` is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoRecord {
    pub path: String,
}

impl PhotoRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Why a listing call failed. Drives the user-facing error text on the tag path.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("photo api did not respond: {0}")]
    NoResponse(String),
    #[error("photo api returned status {0}")]
    ErrorStatus(u16),
    #[error("photo api request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Message shown to the user when a tag search fails.
    pub fn user_message(&self, tag: &str) -> String {
        match self {
            FetchError::NoResponse(_) => {
                format!("搜尋「{}」時相簿沒有回應，請稍後再試。", tag)
            }
            FetchError::ErrorStatus(status) => {
                format!("搜尋「{}」時相簿回傳錯誤（{}），請稍後再試。", tag, status)
            }
            FetchError::Other(_) => {
                format!("搜尋「{}」時發生未知錯誤，請稍後再試。", tag)
            }
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            FetchError::ErrorStatus(status.as_u16())
        } else if e.is_connect() || e.is_timeout() || e.is_request() {
            FetchError::NoResponse(e.to_string())
        } else {
            FetchError::Other(e.to_string())
        }
    }
}

/// "List photos matching an optional search term."
#[async_trait]
pub trait PhotoCatalog: Send + Sync {
    async fn search(&self, term: Option<&str>) -> Result<Vec<PhotoRecord>, FetchError>;
}

/// Photo catalog backed by the HTTP listing API.
#[derive(Clone)]
pub struct HttpPhotoCatalog {
    api_url: String,
    client: reqwest::Client,
}

impl HttpPhotoCatalog {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PhotoCatalog for HttpPhotoCatalog {
    /// GET api_url[?search=term]. Response is a JSON array of `{ "path": ... }`.
    async fn search(&self, term: Option<&str>) -> Result<Vec<PhotoRecord>, FetchError> {
        let mut req = self.client.get(&self.api_url);
        if let Some(term) = term {
            req = req.query(&[("search", term)]);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            return Err(FetchError::ErrorStatus(res.status().as_u16()));
        }
        let body = res.text().await?;
        let photos: Vec<PhotoRecord> =
            serde_json::from_str(&body).map_err(|e| FetchError::Other(e.to_string()))?;
        log::debug!(
            "photos: search {:?} returned {} record(s)",
            term,
            photos.len()
        );
        Ok(photos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_records_and_ignores_extra_fields() {
        let json = r#"[{"path": "/Photos/a.jpg", "size": 10}, {"path": "/Photos/b.jpg"}]"#;
        let photos: Vec<PhotoRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(
            photos,
            vec![PhotoRecord::new("/Photos/a.jpg"), PhotoRecord::new("/Photos/b.jpg")]
        );
    }

    #[test]
    fn user_message_is_categorized() {
        let tag = "颱風";
        let no_response = FetchError::NoResponse("refused".into()).user_message(tag);
        let status = FetchError::ErrorStatus(502).user_message(tag);
        let other = FetchError::Other("bad json".into()).user_message(tag);
        assert!(no_response.contains("沒有回應"));
        assert!(status.contains("502"));
        assert!(other.contains("未知錯誤"));
        assert!([no_response, status, other].iter().all(|m| m.contains(tag)));
    }

    #[tokio::test]
    async fn unreachable_api_is_no_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let catalog = HttpPhotoCatalog::new(format!("http://127.0.0.1:{}/list", port));
        let err = catalog.search(Some("x")).await.unwrap_err();
        assert!(matches!(err, FetchError::NoResponse(_)), "got {:?}", err);
    }
}
