use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, StatusCode};
use sync_logging::{sync_debug, sync_trace};

use crate::decode::{decode_markup, decode_utf8};
use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput};

/// How a response body becomes text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyDecoding {
    /// Always UTF-8, as fragments are inserted verbatim.
    #[default]
    Utf8,
    /// BOM, then the `Content-Type` charset, then detection. For whole pages.
    Sniff,
}

/// Limits applied to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub decoding: BodyDecoding,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            decoding: BodyDecoding::Utf8,
        }
    }
}

/// Retrieves markup over HTTP. Only a final status of exactly 200 counts as success.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self { settings }
    }

    /// One client per request so the redirect policy can report its hop count.
    fn client_counting(&self, hops: Arc<AtomicUsize>) -> Result<reqwest::Client, FetchError> {
        let limit = self.settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            let seen = attempt.previous().len();
            hops.store(seen, Ordering::Relaxed);
            if seen < limit {
                attempt.follow()
            } else {
                attempt.error("redirect limit exceeded")
            }
        });

        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    /// Collects the body, giving up as soon as it passes `max_bytes`.
    async fn read_capped(&self, response: Response) -> Result<Vec<u8>, FetchError> {
        let max = self.settings.max_bytes;
        let declared = response.content_length();
        if let Some(declared) = declared.filter(|len| *len > max) {
            return Err(too_large(max, declared));
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0).min(max) as usize);
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(classify)?;
            let total = (body.len() + chunk.len()) as u64;
            if total > max {
                return Err(too_large(max, total));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let target = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let hops = Arc::new(AtomicUsize::new(0));
        let response = self
            .client_counting(hops.clone())?
            .get(target)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = self.read_capped(response).await?;
        sync_trace!("GET {} -> {} bytes", final_url, body.len());

        let decoded = match self.settings.decoding {
            BodyDecoding::Utf8 => decode_utf8(&body),
            BodyDecoding::Sniff => decode_markup(&body, content_type.as_deref()),
        };
        if decoded.had_errors {
            sync_debug!(
                "Replaced malformed {} sequences in body of {}",
                decoded.encoding_label,
                url
            );
        }

        Ok(FetchOutput {
            markup: decoded.text,
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url,
                redirect_count: hops.load(Ordering::Relaxed),
                content_type,
                encoding_label: decoded.encoding_label,
                byte_len: body.len() as u64,
            },
        })
    }
}

fn too_large(max_bytes: u64, actual: u64) -> FetchError {
    FetchError::new(
        FailureKind::TooLarge {
            max_bytes,
            actual: Some(actual),
        },
        "response too large",
    )
}

fn classify(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
