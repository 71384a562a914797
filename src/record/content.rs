//! Payload content items

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One typed item of a record payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
    /// Any other item type, kept opaque for forward compatibility
    #[serde(other)]
    Unknown,
}

/// Decode a payload leniently: a bare string becomes one text item, and
/// items that fail to decode become [`ContentItem::Unknown`].
pub(crate) fn decode_payload(payload: Option<Value>) -> Vec<ContentItem> {
    match payload {
        None | Some(Value::Null) => vec![],
        Some(Value::String(text)) => vec![ContentItem::Text { text }],
        Some(Value::Array(items)) => items.into_iter().map(decode_item).collect(),
        Some(_) => vec![ContentItem::Unknown],
    }
}

fn decode_item(item: Value) -> ContentItem {
    match serde_json::from_value::<ContentItem>(item) {
        Ok(content) => content,
        Err(e) => {
            debug!("Keeping undecodable content item as opaque: {}", e);
            ContentItem::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_and_broken_items_are_opaque() {
        let items = decode_payload(Some(json!([
            {"type": "image", "source": {}},
            {"type": "tool_use", "name": "Read"},
            {"type": "tool_result", "tool_use_id": "t1", "is_error": true}
        ])));

        assert_eq!(items[0], ContentItem::Unknown);
        assert_eq!(items[1], ContentItem::Unknown);
        assert_eq!(
            items[2],
            ContentItem::ToolResult {
                tool_use_id: "t1".to_string(),
                content: Value::Null,
                is_error: true,
            }
        );
    }

    #[test]
    fn test_empty_payload() {
        assert!(decode_payload(None).is_empty());
        assert!(decode_payload(Some(Value::Null)).is_empty());
    }
}
