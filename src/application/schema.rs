//! Denylist-driven JSON Schema sanitization.
//!
//! Models running in strict mode enforce a limit on the number of declared
//! properties, and the Graph mail payload schema blows well past it. `trim`
//! removes a fixed set of property names from a schema tree so the remainder
//! fits within that limit. The transform is pure and recursive: it returns a
//! new tree and leaves the input untouched.

use serde_json::{Map, Value};
use std::collections::HashSet;

const REQUIRED_KEY: &str = "required";
const PROPERTIES_KEY: &str = "properties";

/// Property names excluded from any schema exposed to the model.
///
/// Matching is case-insensitive. Built once at startup and shared read-only
/// across requests.
#[derive(Debug, Clone)]
pub struct SchemaDenylist {
    entries: HashSet<String>,
}

impl SchemaDenylist {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: names
                .into_iter()
                .map(|name| name.into().to_lowercase())
                .collect(),
        }
    }

    /// The metadata-heavy Graph mail properties dropped in the original
    /// deployment.
    pub fn graph_mail_defaults() -> Self {
        Self::new([
            "@odata.type",
            "attachments",
            "bccRecipients",
            "bodyPreview",
            "categories",
            "ccRecipients",
            "conversationId",
            "conversationIndex",
            "extensions",
            "flag",
            "from",
            "hasAttachments",
            "id",
            "inferenceClassification",
            "internetMessageHeaders",
            "isDeliveryReceiptRequested",
            "isDraft",
            "isRead",
            "isReadReceiptRequested",
            "multiValueExtendedProperties",
            "parentFolderId",
            "receivedDateTime",
            "replyTo",
            "sender",
            "sentDateTime",
            "singleValueExtendedProperties",
            "uniqueBody",
            "webLink",
        ])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remove denylisted entries from every `required` array and `properties`
/// map of the schema, recursing into all remaining sub-schemas.
///
/// Survivor order is preserved, nothing outside the denylist is altered,
/// and the transform is idempotent.
pub fn trim(schema: &Value, denylist: &SchemaDenylist) -> Value {
    match schema {
        Value::Object(object) => Value::Object(trim_object(object, denylist)),
        Value::Array(items) => Value::Array(items.iter().map(|item| trim(item, denylist)).collect()),
        other => other.clone(),
    }
}

fn trim_object(object: &Map<String, Value>, denylist: &SchemaDenylist) -> Map<String, Value> {
    let mut trimmed = Map::new();
    for (key, value) in object {
        match key.as_str() {
            REQUIRED_KEY if value.is_array() => {
                trimmed.insert(key.clone(), trim_required(value, denylist));
            }
            PROPERTIES_KEY if value.is_object() => {
                trimmed.insert(key.clone(), trim_properties(value, denylist));
            }
            _ => {
                trimmed.insert(key.clone(), trim(value, denylist));
            }
        }
    }
    trimmed
}

fn trim_required(required: &Value, denylist: &SchemaDenylist) -> Value {
    let entries = required
        .as_array()
        .map(|array| {
            array
                .iter()
                .filter_map(Value::as_str)
                .filter(|name| !denylist.contains(name))
                .map(|name| Value::String(name.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Value::Array(entries)
}

fn trim_properties(properties: &Value, denylist: &SchemaDenylist) -> Value {
    let mut survivors = Map::new();
    if let Some(map) = properties.as_object() {
        for (name, sub_schema) in map {
            if !denylist.contains(name) {
                survivors.insert(name.clone(), trim(sub_schema, denylist));
            }
        }
    }
    Value::Object(survivors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mail_payload_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "object",
                    "required": ["subject", "attachments", "toRecipients"],
                    "properties": {
                        "subject": { "type": "string" },
                        "attachments": { "type": "array", "items": { "type": "object" } },
                        "toRecipients": { "type": "array", "items": { "type": "object" } },
                        "from": { "type": "object" }
                    }
                },
                "saveToSentItems": { "type": "boolean" }
            },
            "required": ["message"]
        })
    }

    #[test]
    fn removes_denylisted_required_entries_and_properties() {
        let denylist = SchemaDenylist::graph_mail_defaults();
        let trimmed = trim(&mail_payload_schema(), &denylist);

        let message = &trimmed["properties"]["message"];
        assert_eq!(
            message["required"],
            json!(["subject", "toRecipients"]),
            "subject must survive, attachments must not"
        );
        assert!(message["properties"].get("attachments").is_none());
        assert!(message["properties"].get("from").is_none());
        assert!(message["properties"].get("subject").is_some());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let denylist = SchemaDenylist::new(["Attachments"]);
        let schema = json!({
            "required": ["ATTACHMENTS", "subject"],
            "properties": { "attachments": {}, "subject": {} }
        });
        let trimmed = trim(&schema, &denylist);
        assert_eq!(trimmed["required"], json!(["subject"]));
        assert!(trimmed["properties"].get("attachments").is_none());
    }

    #[test]
    fn trim_is_idempotent() {
        let denylist = SchemaDenylist::graph_mail_defaults();
        let once = trim(&mail_payload_schema(), &denylist);
        let twice = trim(&once, &denylist);
        assert_eq!(once, twice);
    }

    #[test]
    fn untouched_schema_survives_intact() {
        let denylist = SchemaDenylist::graph_mail_defaults();
        let schema = json!({
            "type": "object",
            "required": ["start", "end"],
            "properties": {
                "start": { "type": "string", "format": "date-time" },
                "end": { "type": "string", "format": "date-time" }
            }
        });
        assert_eq!(trim(&schema, &denylist), schema);
    }

    #[test]
    fn survivor_order_is_preserved() {
        let denylist = SchemaDenylist::new(["b", "d"]);
        let schema = json!({
            "required": ["a", "b", "c", "d", "e"],
            "properties": { "a": {}, "b": {}, "c": {}, "d": {}, "e": {} }
        });
        let trimmed = trim(&schema, &denylist);
        assert_eq!(trimmed["required"], json!(["a", "c", "e"]));
        let keys: Vec<&String> = trimmed["properties"]
            .as_object()
            .expect("properties object")
            .keys()
            .collect();
        assert_eq!(keys, ["a", "c", "e"]);
    }

    #[test]
    fn recurses_into_array_item_schemas() {
        let denylist = SchemaDenylist::new(["id"]);
        let schema = json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "id": {}, "name": {} }
            }
        });
        let trimmed = trim(&schema, &denylist);
        assert!(trimmed["items"]["properties"].get("id").is_none());
        assert!(trimmed["items"]["properties"].get("name").is_some());
    }

    #[test]
    fn non_string_required_entries_are_dropped() {
        let denylist = SchemaDenylist::new(["x"]);
        let schema = json!({ "required": ["a", 7, null, "x"] });
        let trimmed = trim(&schema, &denylist);
        assert_eq!(trimmed["required"], json!(["a"]));
    }
}
