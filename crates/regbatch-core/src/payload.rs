//! Registration payload construction and wire encoding
//!
//! Construction ([`build_payload`]) and serialization ([`Payload::encode`])
//! are separate steps: the field list is built once from the
//! [`FieldMapping`], then rendered as JSON or form-urlencoded.

use crate::config::{ContentType, FieldMapping};
use crate::credential::Credential;

/// Value of the `Accept` header on every request.
pub const ACCEPT: &str = "application/json, text/plain, */*";

/// Ordered `(key, value)` pairs sent to the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    fields: Vec<(String, String)>,
}

/// Encoded request body plus the headers that describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub content_type: &'static str,
    pub body: String,
}

impl EncodedBody {
    /// `Content-Type` and `Accept` headers for this body.
    #[must_use]
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Content-Type".to_string(), self.content_type.to_string()),
            ("Accept".to_string(), ACCEPT.to_string()),
        ]
    }
}

/// Map a credential and optional invite code onto the endpoint's field names.
///
/// The password is written twice (password + confirmation). An empty
/// `invite_code` leaves the invite key out entirely.
#[must_use]
pub fn build_payload(credential: &Credential, invite_code: &str, mapping: &FieldMapping) -> Payload {
    let mut fields = vec![
        (mapping.email.clone(), credential.email.clone()),
        (mapping.password.clone(), credential.password.clone()),
        (mapping.confirm_password.clone(), credential.password.clone()),
    ];
    if !invite_code.is_empty() {
        fields.push((mapping.invite_code.clone(), invite_code.to_string()));
    }
    Payload { fields }
}

impl Payload {
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Serialize the payload for the given content type.
    #[must_use]
    pub fn encode(&self, content_type: ContentType) -> EncodedBody {
        let body = match content_type {
            ContentType::Json => self.to_json(),
            ContentType::Form => self.to_form(),
        };
        EncodedBody {
            content_type: content_type.mime(),
            body,
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(&OrderedFields(&self.fields)).unwrap_or_default()
    }

    fn to_form(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish()
    }
}

/// Serializes pairs as a JSON object in insertion order.
struct OrderedFields<'a>(&'a [(String, String)]);

impl serde::Serialize for OrderedFields<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}
