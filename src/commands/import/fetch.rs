use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

const USER_AGENT: &str = concat!("cms-image-import/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub(crate) struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Where image bytes come from. Errors are transport failures and abort the run.
pub(crate) trait ImageSource {
    fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

pub(crate) struct HttpImageSource {
    client: Client,
}

impl HttpImageSource {
    pub(crate) fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, url: &str) -> Result<FetchedImage> {
        // Status is not checked; an error page fails to decode downstream.
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to fetch {url}"))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body from {url}"))?
            .to_vec();

        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}
