//! Descriptions of outbound requests

use bytes::Bytes;
use druid_tokens::AuthError;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};
use serde::Serialize;

/// Request content type
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    /// json content type
    Json,
    /// form content type
    Form,
}

impl ContentType {
    /// The media type sent in the `Content-Type` header
    pub const fn as_str(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Form => "application/x-www-form-urlencoded",
        }
    }

    pub(crate) fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

/// A manner of encoding a serializable payload into a request body
pub trait RequestType {
    /// The content type of the encoded body
    const CONTENT_TYPE: ContentType;

    /// Encodes the payload
    fn encode<S: Serialize + ?Sized>(payload: &S) -> Result<Bytes, AuthError>;
}

/// Encodes the payload as JSON
#[derive(Clone, Copy, Debug)]
pub struct JsonBody;

/// Encodes the payload as URL-encoded form data
#[derive(Clone, Copy, Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    const CONTENT_TYPE: ContentType = ContentType::Json;

    fn encode<S: Serialize + ?Sized>(payload: &S) -> Result<Bytes, AuthError> {
        serde_json::to_vec(payload)
            .map(Bytes::from)
            .map_err(AuthError::encoding)
    }
}

impl RequestType for FormBody {
    const CONTENT_TYPE: ContentType = ContentType::Form;

    fn encode<S: Serialize + ?Sized>(payload: &S) -> Result<Bytes, AuthError> {
        serde_urlencoded::to_string(payload)
            .map(Bytes::from)
            .map_err(AuthError::encoding)
    }
}

/// An encoded request body
#[derive(Clone, Debug)]
pub struct Body {
    content_type: ContentType,
    bytes: Bytes,
}

impl Body {
    /// The content type of the body
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// The encoded bytes
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

/// Describes an outbound request: method, URL, extra headers and an optional body
///
/// Payloads are encoded as soon as they are attached, so an unencodable
/// payload is reported before any request is sent.
///
/// Extra headers follow a first-set-wins rule: setting a header that is
/// already present leaves the existing value in place.
#[derive(Clone, Debug)]
pub struct RequestSpec {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
}

impl RequestSpec {
    /// Constructs a request with no extra headers and no body
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Constructs a `GET` request
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Constructs a `POST` request
    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    /// Adds a header unless one with the same name was already set
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.entry(name).or_insert(value);
        self
    }

    /// Adds a header from a string value unless one with the same name was already set
    ///
    /// Fails with [`AuthError::Encoding`] if `value` is not a valid header value.
    pub fn try_header(self, name: HeaderName, value: &str) -> Result<Self, AuthError> {
        let value = HeaderValue::from_str(value).map_err(AuthError::encoding)?;
        Ok(self.header(name, value))
    }

    /// Attaches a JSON-encoded body
    pub fn json<S: Serialize + ?Sized>(self, payload: &S) -> Result<Self, AuthError> {
        self.payload::<JsonBody, S>(payload)
    }

    /// Attaches a form-encoded body
    pub fn form<S: Serialize + ?Sized>(self, payload: &S) -> Result<Self, AuthError> {
        self.payload::<FormBody, S>(payload)
    }

    /// Attaches a body encoded according to `T`
    pub fn payload<T: RequestType, S: Serialize + ?Sized>(
        mut self,
        payload: &S,
    ) -> Result<Self, AuthError> {
        self.body = Some(Body {
            content_type: T::CONTENT_TYPE,
            bytes: T::encode(payload)?,
        });
        Ok(self)
    }

    /// The request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Extra headers supplied by the caller
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The encoded body, if any
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }
}
