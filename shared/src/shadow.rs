//! Device shadow documents
//!
//! Documents fetched with `SHADOW GET DOC` / `SHADOW GET DELTA` arrive as:
//! ```text
//! 1 {"state":{...}}      accepted
//! 0 {reason}             rejected
//! ```
//!
//! Updates are published as `{"state":{"desired":{..},"reported":{..}}}`.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// Ordered property mapping (insertion order is preserved)
pub type PropertyMap = Map<String, Value>;

/// Errors decoding a shadow document
#[derive(Error, Debug)]
pub enum ShadowError {
    #[error("Invalid shadow JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Shadow state is not an object")]
    NotAnObject,
}

/// Which part of a document drives the apply step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Desired,
    Reported,
    Flat,
}

/// A received shadow document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShadowDocument {
    pub desired: Option<PropertyMap>,
    pub reported: Option<PropertyMap>,
    /// The whole state object, used when neither branch is present
    pub flat: PropertyMap,
}

/// Outcome of a document fetch
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedDocument {
    Accepted(ShadowDocument),
    Rejected(String),
}

impl ShadowDocument {
    /// Build from a JSON value; a top-level `state` object is the document root
    pub fn from_value(value: Value) -> Result<Self, ShadowError> {
        let mut root = match value {
            Value::Object(map) => map,
            _ => return Err(ShadowError::NotAnObject),
        };

        let state = match root.remove("state") {
            Some(Value::Object(state)) => state,
            Some(_) => return Err(ShadowError::NotAnObject),
            None => root,
        };

        let branch = |name: &str| match state.get(name) {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => None,
        };
        let desired = branch("desired");
        let reported = branch("reported");

        Ok(Self {
            desired,
            reported,
            flat: state,
        })
    }

    /// Parse document JSON text
    pub fn parse(text: &str) -> Result<Self, ShadowError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Select the operative branch: `desired`, else `reported`, else the flat state
    pub fn operative(self) -> (Branch, PropertyMap) {
        if let Some(desired) = self.desired {
            (Branch::Desired, desired)
        } else if let Some(reported) = self.reported {
            (Branch::Reported, reported)
        } else {
            (Branch::Flat, self.flat)
        }
    }
}

impl FetchedDocument {
    /// Parse a `SHADOW GET DOC` / `GET DELTA` payload
    pub fn parse(payload: &str) -> Result<Self, ShadowError> {
        if let Some(body) = payload.strip_prefix("1 ") {
            return Ok(FetchedDocument::Accepted(ShadowDocument::parse(body)?));
        }
        if let Some(reason) = payload.strip_prefix("0 ") {
            return Ok(FetchedDocument::Rejected(reason.trim().to_string()));
        }
        Ok(FetchedDocument::Accepted(ShadowDocument::parse(payload)?))
    }
}

/// Acknowledge applied desired values: desired nulled, reported echoed
pub fn acknowledgement_payload(desired: PropertyMap, reported: PropertyMap) -> Value {
    json!({ "state": { "desired": desired, "reported": reported } })
}

/// Reported-only update
pub fn report_payload(reported: PropertyMap) -> Value {
    json!({ "state": { "reported": reported } })
}
