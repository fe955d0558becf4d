//! The boundary between the engine and the network

use std::{error, fmt};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header::HeaderMap, Method, StatusCode, Url};

/// An error raised by a transport before a response was received
pub type TransportError = Box<dyn error::Error + Send + Sync + 'static>;

/// A fully formed request, ready to be sent
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// The request method
    pub method: Method,
    /// The target URL
    pub url: Url,
    /// Every header to be sent
    pub headers: HeaderMap,
    /// The encoded body, if any
    pub body: Option<Bytes>,
}

/// A response received from the backend
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// The response status
    pub status: StatusCode,
    /// The response headers
    pub headers: HeaderMap,
    /// The full response body
    pub body: Bytes,
}

/// Sends requests over the network
///
/// Implementations report connectivity failures and timeouts as errors and
/// every received response, whatever its status, as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends the request and reads the full response
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// A transport backed by a [`reqwest::Client`]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Constructs a transport from a configured client
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
