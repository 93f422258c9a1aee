use super::ObjectUrlStore;
use base64::Engine as _;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

/// Turns a URL produced by the resolver into bytes.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Arc<[u8]>, FetchError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to fetch {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: &str, kind: FetchErrorKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchErrorKind {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("http request failed: {0}")]
    Http(Box<ureq::Error>),
    #[error("malformed data URI")]
    InvalidDataUri,
    #[error("object URL is not live")]
    RevokedHandle,
    #[error("no such resource")]
    NotFound,
}

/// Fetches `blob:` handles, `data:` URIs, http(s) URLs and local files.
pub struct DefaultFetcher {
    handles: ObjectUrlStore,
    agent: ureq::Agent,
}

impl DefaultFetcher {
    pub fn new(handles: ObjectUrlStore) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        Self { handles, agent }
    }

    fn fetch_http(&self, url: &str) -> Result<Arc<[u8]>, FetchError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| FetchError::new(url, FetchErrorKind::Http(Box::new(err))))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| FetchError::new(url, err.into()))?;
        log::debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(Arc::from(bytes))
    }
}

impl Fetcher for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Arc<[u8]>, FetchError> {
        if ObjectUrlStore::is_object_url(url) {
            return self
                .handles
                .get(url)
                .ok_or_else(|| FetchError::new(url, FetchErrorKind::RevokedHandle));
        }
        if url.starts_with("data:") {
            return decode_data_uri(url)
                .map(Arc::from)
                .ok_or_else(|| FetchError::new(url, FetchErrorKind::InvalidDataUri));
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.fetch_http(url);
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        match std::fs::read(path) {
            Ok(bytes) => Ok(Arc::from(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(FetchError::new(url, FetchErrorKind::NotFound))
            }
            Err(err) => Err(FetchError::new(url, err.into())),
        }
    }
}

/// Payload of a `data:` URI, base64 or percent-encoded.
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let (meta, payload) = uri.strip_prefix("data:")?.split_once(',')?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .ok()
    } else {
        Some(urlencoding::decode_binary(payload.as_bytes()).into_owned())
    }
}
