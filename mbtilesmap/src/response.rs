//! Values handed over to an HTTP layer: payloads, content types and request validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{MbtError, MbtResult};

pub const PNG_CONTENT_TYPE: &str = "image/png";
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";

/// JSONP callback used for `TileJSON` when the caller asks for one without naming it
pub const DEFAULT_TILEJSON_CALLBACK: &str = "grid";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.\-_0-9A-Za-z]+$").expect("valid identifier regex"));

static CALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][0-9A-Za-z_$]*(\.[A-Za-z_$][0-9A-Za-z_$]*)*$")
        .expect("valid callback regex")
});

/// Response body together with its declared media type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TilePayload {
    pub data: Vec<u8>,
    pub content_type: &'static str,
}

impl TilePayload {
    #[must_use]
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            data,
            content_type: PNG_CONTENT_TYPE,
        }
    }

    #[must_use]
    pub fn javascript(data: String) -> Self {
        Self {
            data: data.into_bytes(),
            content_type: JAVASCRIPT_CONTENT_TYPE,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Store and catalog identifiers may only use `[.\-_0-9A-Za-z]`.
pub fn validate_identifier(value: &str) -> MbtResult<&str> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(value)
    } else {
        Err(MbtError::InvalidIdentifier(value.to_string()))
    }
}

/// JSONP callbacks must be a plain or dotted JavaScript identifier, e.g. `L.callbacks._0`.
pub fn validate_callback(value: &str) -> MbtResult<&str> {
    if CALLBACK_RE.is_match(value) {
        Ok(value)
    } else {
        Err(MbtError::InvalidCallback(value.to_string()))
    }
}

/// Wrap `json` as `callback(json);`, or return it unchanged without a callback.
pub fn wrap_jsonp(callback: Option<&str>, json: &str) -> MbtResult<String> {
    match callback {
        None => Ok(json.to_string()),
        Some(cb) => Ok(format!("{}({json});", validate_callback(cb)?)),
    }
}
