//! Defines the core data structures used in the lead-harvester application.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A validated, deduplicated contact record. The only entity that leaves the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub(crate) struct Lead {
    /// The page the contact was found on (may be empty).
    pub url: String,
    pub name: Option<String>,
    pub title: Option<String>,
    /// Always the normalized form produced by the email validator.
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    /// Provenance of the record. Not populated by the current extraction logic.
    pub source_page: Option<String>,
    /// Ranking score. Not computed yet, always 0.0.
    pub confidence: f64,
}

/// An untrusted contact candidate extracted from a single page.
///
/// Records coming from the markdown fallback scan only carry `url` and `email`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub(crate) struct RawContact {
    pub url: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub linkedin: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
}

impl RawContact {
    /// Creates an email-only record, as produced by the markdown scan.
    pub(crate) fn email_only(url: &str, email: &str) -> Self {
        Self {
            url: url.to_string(),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }

    /// Builds a record from one element of a structured `contacts` array.
    /// Missing, null, boolean, object and array fields stay absent.
    pub(crate) fn from_structured(url: &str, contact: &Map<String, Value>) -> Self {
        let field = |key: &str| -> Option<String> {
            match contact.get(key)? {
                Value::String(s) => Some(s.clone()),
                // Phone numbers occasionally come back as bare numbers.
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        };

        Self {
            url: url.to_string(),
            name: field("name"),
            title: field("title"),
            email: field("email"),
            linkedin: field("linkedin"),
            company: field("company"),
            phone: field("phone"),
        }
    }
}

/// A scraped page, resolved once from whatever wire shape the service returned.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct PageResult {
    /// Source URL of the page, when the service reported one.
    pub url: Option<String>,
    /// Markdown rendering of the page body.
    pub markdown: Option<String>,
    /// Elements of the structured `contacts` array, if structured data was returned.
    pub contacts: Option<Vec<Value>>,
}

#[derive(Deserialize, Debug, Default)]
struct WireMetadata {
    #[serde(rename = "sourceURL", default)]
    source_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// The page shapes the scraping service is known to return.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum WirePage {
    /// `url` reported at the top level of the record.
    Flat {
        url: String,
        #[serde(default)]
        markdown: Option<String>,
        #[serde(default)]
        json: Option<Value>,
    },
    /// A full document where the URL lives under `metadata`.
    Document {
        #[serde(default)]
        metadata: Option<WireMetadata>,
        #[serde(default)]
        markdown: Option<String>,
        #[serde(default)]
        json: Option<Value>,
    },
}

impl PageResult {
    /// Resolves a raw page record into a `PageResult`.
    ///
    /// # Returns
    /// * `None` if the record is not a recognizable page (e.g. not a JSON object).
    pub(crate) fn from_wire(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let page: WirePage = serde_json::from_value(value).ok()?;

        let (url, markdown, json) = match page {
            WirePage::Flat {
                url,
                markdown,
                json,
            } => (Some(url), markdown, json),
            WirePage::Document {
                metadata,
                markdown,
                json,
            } => {
                let url = metadata.and_then(|m| m.source_url.or(m.url));
                (url, markdown, json)
            }
        };

        Some(Self {
            url,
            markdown,
            contacts: json.and_then(structured_contacts),
        })
    }
}

/// Pulls the `contacts` array out of a structured payload. Some service versions
/// return the payload as a JSON-encoded string instead of an object.
fn structured_contacts(json: Value) -> Option<Vec<Value>> {
    let object = match json {
        Value::Object(map) => map,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => return None,
        },
        _ => return None,
    };

    match object.get("contacts") {
        Some(Value::Array(items)) => Some(items.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_wire_flat_shape() {
        let page = PageResult::from_wire(json!({
            "url": "https://x.com/team",
            "markdown": "hello",
            "json": {"contacts": [{"name": "Ann"}]}
        }))
        .unwrap();
        assert_eq!(page.url.as_deref(), Some("https://x.com/team"));
        assert_eq!(page.markdown.as_deref(), Some("hello"));
        assert_eq!(page.contacts.unwrap().len(), 1);
    }

    #[test]
    fn test_from_wire_document_shape() {
        let page = PageResult::from_wire(json!({
            "markdown": "body",
            "metadata": {"sourceURL": "https://x.com/about", "statusCode": 200}
        }))
        .unwrap();
        assert_eq!(page.url.as_deref(), Some("https://x.com/about"));
        assert!(page.contacts.is_none());
    }

    #[test]
    fn test_from_wire_json_as_string() {
        let page = PageResult::from_wire(json!({
            "url": "https://x.com/",
            "json": "{\"contacts\": [{\"email\": \"a@x.com\"}, {\"email\": \"b@x.com\"}]}"
        }))
        .unwrap();
        assert_eq!(page.contacts.unwrap().len(), 2);
    }

    #[test]
    fn test_from_wire_rejects_non_objects() {
        assert!(PageResult::from_wire(json!("https://x.com")).is_none());
        assert!(PageResult::from_wire(json!(42)).is_none());
    }

    #[test]
    fn test_raw_contact_from_structured_keeps_missing_fields_absent() {
        let element = json!({"name": "Ann Lee", "email": "ann@x.com", "phone": null});
        let contact = RawContact::from_structured("https://x.com/team", element.as_object().unwrap());
        assert_eq!(contact.url, "https://x.com/team");
        assert_eq!(contact.name.as_deref(), Some("Ann Lee"));
        assert_eq!(contact.email.as_deref(), Some("ann@x.com"));
        assert!(contact.phone.is_none());
        assert!(contact.title.is_none());
    }

    #[test]
    fn test_raw_contact_from_structured_drops_nested_values() {
        let element = json!({
            "name": {"first": "Ann", "last": "Lee"},
            "title": ["CEO", "Founder"],
            "email": "ann@x.com",
            "phone": 5551234,
            "linkedin": true
        });
        let contact = RawContact::from_structured("https://x.com/team", element.as_object().unwrap());
        assert!(contact.name.is_none());
        assert!(contact.title.is_none());
        assert!(contact.linkedin.is_none());
        assert_eq!(contact.phone.as_deref(), Some("5551234"));
        assert_eq!(contact.email.as_deref(), Some("ann@x.com"));
    }
}
