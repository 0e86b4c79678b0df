//! Message id extraction from platform send responses

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of a sent message, used to edit it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Response paths tried in order. Adapters disagree on where the id lives.
const ID_PATHS: [&[&str]; 3] = [
    &["message_id"],
    &["data", "message_id"],
    &["data", "messageInfo", "msgId"],
];

/// Extract the message id from a send response.
///
/// Tries, in order: a top-level `message_id`, `data.message_id`, and
/// `data.messageInfo.msgId`. String and integer ids are accepted; empty
/// strings, nulls and other shapes are skipped.
pub fn extract_message_id(response: &Value) -> Option<MessageId> {
    ID_PATHS.iter().find_map(|path| {
        let value = path.iter().try_fold(response, |node, key| node.get(key))?;
        id_from_value(value)
    })
}

fn id_from_value(value: &Value) -> Option<MessageId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(MessageId::new(s.trim())),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(MessageId::new(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn top_level_id() {
        let id = extract_message_id(&json!({"status": "ok", "message_id": "m-1"}));
        assert_eq!(id, Some(MessageId::new("m-1")));
    }

    #[test]
    fn data_wrapped_id() {
        let id = extract_message_id(&json!({"data": {"message_id": 4242}}));
        assert_eq!(id, Some(MessageId::new("4242")));
    }

    #[test]
    fn provider_wrapped_id() {
        let id = extract_message_id(&json!({"data": {"messageInfo": {"msgId": "abc"}}}));
        assert_eq!(id, Some(MessageId::new("abc")));
    }

    #[test]
    fn top_level_wins_over_nested() {
        let id = extract_message_id(&json!({
            "message_id": "outer",
            "data": {"message_id": "inner", "messageInfo": {"msgId": "deep"}}
        }));
        assert_eq!(id, Some(MessageId::new("outer")));
    }

    #[test]
    fn unusable_values_fall_through() {
        let id = extract_message_id(&json!({
            "message_id": "",
            "data": {"message_id": null, "messageInfo": {"msgId": "deep"}}
        }));
        assert_eq!(id, Some(MessageId::new("deep")));
    }

    #[test]
    fn missing_ids() {
        assert_eq!(extract_message_id(&json!({})), None);
        assert_eq!(extract_message_id(&json!(null)), None);
        assert_eq!(extract_message_id(&json!("m-1")), None);
        assert_eq!(extract_message_id(&json!({"data": {"message_id": 1.5}})), None);
        assert_eq!(extract_message_id(&json!({"data": ["message_id"]})), None);
    }
}
