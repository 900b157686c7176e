use std::collections::HashSet;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, Request, Uri};
use http_body_util::Full;

use crate::error::HttpError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Endpoint and request shape shared by every attempt of a run.
#[derive(Debug, Clone)]
pub struct Target {
    uri: Uri,
    host: String,
    port: u16,
    method: Method,
    headers: HeaderMap,
}

impl Target {
    /// Parse `url` and merge `headers` over the defaults
    /// (`Content-Type: application/json`).
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid, not `http`, has no host, or
    /// a header name/value is invalid.
    pub fn parse(url: &str, method: Method, headers: &[(String, String)]) -> Result<Self, HttpError> {
        let parsed = url::Url::parse(url).map_err(|err| HttpError::InvalidUrl {
            url: url.to_owned(),
            source: err,
        })?;
        if parsed.scheme() != "http" {
            return Err(HttpError::UnsupportedScheme {
                scheme: parsed.scheme().to_owned(),
            });
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::UrlMissingHost {
                url: url.to_owned(),
            })?
            .to_owned();
        let port = parsed.port_or_known_default().unwrap_or(80);
        let uri: Uri = parsed
            .as_str()
            .parse()
            .map_err(|err| HttpError::InvalidUri {
                url: url.to_owned(),
                source: err,
            })?;

        Ok(Self {
            uri,
            host,
            port,
            method,
            headers: merge_headers(headers)?,
        })
    }

    #[must_use]
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Build one request carrying `body`.
    ///
    /// # Errors
    ///
    /// Returns an error when the request cannot be assembled.
    pub fn build_request(&self, body: Bytes) -> Result<Request<Full<Bytes>>, HttpError> {
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(self.uri.clone())
            .body(Full::new(body))
            .map_err(|err| HttpError::BuildRequest { source: err })?;
        request.headers_mut().clone_from(&self.headers);
        Ok(request)
    }
}

/// Defaults first; a user header replaces the default of the same name, and
/// repeated user headers are all kept.
fn merge_headers(headers: &[(String, String)]) -> Result<HeaderMap, HttpError> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    let mut overridden: HashSet<HeaderName> = HashSet::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.trim().as_bytes()).map_err(|err| HttpError::InvalidHeaderName {
                name: name.clone(),
                source: err,
            })?;
        let header_value =
            HeaderValue::from_str(value.trim()).map_err(|err| HttpError::InvalidHeaderValue {
                name: name.clone(),
                source: err,
            })?;
        if overridden.insert(header_name.clone()) {
            map.insert(header_name, header_value);
        } else {
            map.append(header_name, header_value);
        }
    }
    Ok(map)
}
