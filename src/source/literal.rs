use bytes::Bytes;

use crate::error::SourceError;

use super::RequestSource;

/// Sends the same body on every attempt. An empty body is allowed.
#[derive(Debug, Clone, Default)]
pub struct LiteralSource {
    body: Bytes,
}

impl LiteralSource {
    #[must_use]
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }
}

impl RequestSource for LiteralSource {
    fn generate(&self) -> Result<Bytes, SourceError> {
        Ok(self.body.clone())
    }
}
