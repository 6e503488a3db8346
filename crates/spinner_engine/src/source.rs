use std::path::PathBuf;

use url::Url;

use crate::decode::decode_markup;
use crate::engine::SyncError;
use crate::fetch::Fetcher;

/// Where the page markup comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSource {
    Url(Url),
    File(PathBuf),
}

/// Page markup plus the location it should resolve links against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPage {
    pub markup: String,
    pub location: Option<Url>,
}

impl PageSource {
    /// `http(s)` URLs are fetched; anything else is a file path.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => PageSource::Url(url),
            _ => PageSource::File(PathBuf::from(raw)),
        }
    }

    pub async fn load(&self, fetcher: &dyn Fetcher) -> Result<LoadedPage, SyncError> {
        match self {
            PageSource::Url(url) => {
                let output = fetcher.fetch(url.as_str()).await?;
                // Links resolve against where redirects ended up.
                let location = Url::parse(&output.metadata.final_url)
                    .ok()
                    .or_else(|| Some(url.clone()));
                Ok(LoadedPage {
                    markup: output.markup,
                    location,
                })
            }
            PageSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| SyncError::ReadPage {
                        path: path.clone(),
                        source,
                    })?;
                Ok(LoadedPage {
                    markup: decode_markup(&bytes, None).text,
                    location: None,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_sources_are_urls_everything_else_is_a_file() {
        assert!(matches!(
            PageSource::parse("https://example.com/report"),
            PageSource::Url(_)
        ));
        assert_eq!(
            PageSource::parse("report.html"),
            PageSource::File(PathBuf::from("report.html"))
        );
        assert_eq!(
            PageSource::parse("file:///tmp/report.html"),
            PageSource::File(PathBuf::from("file:///tmp/report.html"))
        );
    }

    #[tokio::test]
    async fn file_sources_are_read_and_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.html");
        std::fs::write(&file, b"<meta charset=\"utf-8\"><p>caf\xC3\xA9</p>").unwrap();
        let fetcher = crate::ReqwestFetcher::new(crate::FetchSettings::default());

        let loaded = PageSource::File(file).load(&fetcher).await.unwrap();
        assert_eq!(loaded.markup, "<meta charset=\"utf-8\"><p>café</p>");
        assert_eq!(loaded.location, None);

        let missing = PageSource::File(dir.path().join("gone.html"));
        assert!(matches!(
            missing.load(&fetcher).await,
            Err(SyncError::ReadPage { .. })
        ));
    }
}
