//! HTTP transport abstraction.
//!
//! The engine only needs two requests: a metadata-only `HEAD` and a streamed
//! `GET` with an optional byte range. [`HttpTransport`] implements them on top
//! of `reqwest`; tests plug in their own [`Transport`].

use crate::error::FetchError;
use crate::types::ByteRange;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, RANGE};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Status and headers of a `HEAD` request.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// Status and streamed body of a `GET` request.
pub struct BodyResponse {
    pub status: StatusCode,
    pub body: ByteStream,
}

/// The network operations the download engine depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a metadata-only request.
    async fn head(&self, url: &str) -> Result<HeadResponse, FetchError>;

    /// Issues a `GET`, restricted to `range` when one is given.
    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<BodyResponse, FetchError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a client with an optional per-request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn head(&self, url: &str) -> Result<HeadResponse, FetchError> {
        let response = self.client.head(url).send().await?;
        Ok(HeadResponse {
            status: response.status(),
            headers: response.headers().clone(),
        })
    }

    async fn get(&self, url: &str, range: Option<ByteRange>) -> Result<BodyResponse, FetchError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            debug!("GET {} with Range {}", url, range.header_value());
            request = request.header(RANGE, range.header_value());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response
            .bytes_stream()
            .map(|piece| piece.map_err(FetchError::from))
            .boxed();

        Ok(BodyResponse { status, body })
    }
}
