//! Notion block JSON → [`Block`] conversion.
//!
//! Pure functions over the REST payloads, so the mapping can be tested
//! without a server.

use serde::Deserialize;
use serde_json::{Map, Value};

use pagetree_core::error::ExtractionFailure;
use pagetree_core::models::{Block, BlockType};

/// The envelope shared by every Notion block object. The type-specific
/// payload sits under the key named by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct NotionBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl NotionBlock {
    fn payload(&self) -> Option<&Value> {
        self.fields.get(&self.kind)
    }
}

/// How a Notion block type participates in the flattened sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    /// Emits a block of this type; children are spliced after it.
    Content(BlockType),
    /// A child page: emits a `subnode_reference`, never recursed into here.
    ChildPage,
    /// Emits nothing itself; children are spliced in its place.
    Container,
    /// Dropped along with its children.
    Unsupported,
}

impl Mapping {
    pub fn recurses(&self) -> bool {
        matches!(self, Mapping::Content(_) | Mapping::Container)
    }
}

pub fn map_type(kind: &str) -> Mapping {
    match kind {
        "paragraph" => Mapping::Content(BlockType::Paragraph),
        "bulleted_list_item" => Mapping::Content(BlockType::BulletedItem),
        "numbered_list_item" => Mapping::Content(BlockType::NumberedItem),
        "code" => Mapping::Content(BlockType::Code),
        "quote" => Mapping::Content(BlockType::Quote),
        "to_do" => Mapping::Content(BlockType::Todo),
        "toggle" => Mapping::Content(BlockType::Toggle),
        "link_preview" | "embed" | "bookmark" => Mapping::Content(BlockType::Link),
        "heading_1" => Mapping::Content(BlockType::Heading1),
        "heading_2" => Mapping::Content(BlockType::Heading2),
        "heading_3" => Mapping::Content(BlockType::Heading3),
        "child_page" => Mapping::ChildPage,
        "column_list" | "column" | "synced_block" => Mapping::Container,
        _ => Mapping::Unsupported,
    }
}

fn failure(block: &NotionBlock, reason: impl Into<String>) -> ExtractionFailure {
    ExtractionFailure {
        block_id: block.id.clone(),
        block_type: block.kind.clone(),
        reason: reason.into(),
    }
}

/// Concatenate the `plain_text` of every span in a rich text array.
pub fn plain_text(spans: &[Value]) -> Option<String> {
    spans
        .iter()
        .map(|s| s.get("plain_text").and_then(Value::as_str))
        .collect::<Option<Vec<&str>>>()
        .map(|parts| parts.concat())
}

/// Text content for a block of `block_type`.
///
/// Link types read the payload's `url`; every other type reads its
/// `rich_text` spans.
pub fn extract_text(
    block: &NotionBlock,
    block_type: BlockType,
) -> Result<String, ExtractionFailure> {
    let payload = block
        .payload()
        .ok_or_else(|| failure(block, "missing type payload"))?;

    if block_type == BlockType::Link {
        return payload
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| failure(block, "missing url"));
    }

    let spans = payload
        .get("rich_text")
        .and_then(Value::as_array)
        .ok_or_else(|| failure(block, "missing rich_text"))?;
    plain_text(spans).ok_or_else(|| failure(block, "rich_text span without plain_text"))
}

/// Convert one Notion block. Returns `None` for containers and
/// unsupported types.
///
/// Extraction failures are logged and yield empty content.
pub fn to_block(block: &NotionBlock) -> Option<Block> {
    match map_type(&block.kind) {
        Mapping::ChildPage => {
            Some(Block::subnode(block.id.clone()).modified_at(block.last_edited_time.clone()))
        }
        Mapping::Content(block_type) => {
            let content = extract_text(block, block_type).unwrap_or_else(|e| {
                tracing::warn!(block_id = %block.id, "{}", e);
                String::new()
            });
            Some(Block {
                id: Some(block.id.clone()),
                block_type,
                content,
                last_modified: block.last_edited_time.clone(),
                has_children: block.has_children,
            })
        }
        Mapping::Container | Mapping::Unsupported => None,
    }
}

/// Title of a page object: the `title` property, or else the first
/// property whose `type` is `"title"`. `None` if neither exists.
pub fn extract_title(page: &Value) -> Option<String> {
    let properties = page.get("properties")?.as_object()?;
    let prop = properties
        .get("title")
        .filter(|p| p.get("title").is_some())
        .or_else(|| {
            properties
                .values()
                .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
        })?;
    let spans = prop.get("title")?.as_array()?;
    plain_text(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nb(value: Value) -> NotionBlock {
        serde_json::from_value(value).unwrap()
    }

    fn rich(kind: &str, texts: &[&str]) -> NotionBlock {
        let spans: Vec<Value> = texts.iter().map(|t| json!({ "plain_text": t })).collect();
        nb(json!({
            "id": "b1",
            "type": kind,
            "has_children": false,
            "last_edited_time": "2024-03-01T10:00:00.000Z",
            kind: { "rich_text": spans }
        }))
    }

    #[test]
    fn test_type_mapping() {
        assert_eq!(map_type("to_do"), Mapping::Content(BlockType::Todo));
        assert_eq!(map_type("bulleted_list_item"), Mapping::Content(BlockType::BulletedItem));
        assert_eq!(map_type("embed"), Mapping::Content(BlockType::Link));
        assert_eq!(map_type("child_page"), Mapping::ChildPage);
        assert_eq!(map_type("column"), Mapping::Container);
        assert_eq!(map_type("image"), Mapping::Unsupported);
        assert!(!Mapping::ChildPage.recurses());
        assert!(Mapping::Container.recurses());
    }

    #[test]
    fn test_all_spans_concatenated() {
        let b = to_block(&rich("paragraph", &["Hello, ", "world"])).unwrap();
        assert_eq!(b.content, "Hello, world");
        assert_eq!(b.block_type, BlockType::Paragraph);
        assert_eq!(b.last_modified, "2024-03-01T10:00:00.000Z");
        assert_eq!(b.id.as_deref(), Some("b1"));
    }

    #[test]
    fn test_empty_rich_text_is_empty_content() {
        let b = to_block(&rich("heading_2", &[])).unwrap();
        assert_eq!(b.content, "");
        assert_eq!(b.block_type, BlockType::Heading2);
    }

    #[test]
    fn test_link_preview_uses_url() {
        let b = to_block(&nb(json!({
            "id": "l1",
            "type": "link_preview",
            "link_preview": { "url": "https://example.com" }
        })))
        .unwrap();
        assert_eq!(b.block_type, BlockType::Link);
        assert_eq!(b.content, "https://example.com");
    }

    #[test]
    fn test_malformed_payload_recovers_with_empty_content() {
        let raw = nb(json!({ "id": "q1", "type": "quote", "has_children": true, "quote": {} }));
        assert!(extract_text(&raw, BlockType::Quote).is_err());
        let b = to_block(&raw).unwrap();
        assert_eq!(b.content, "");
        assert!(b.has_children);
    }

    #[test]
    fn test_child_page_becomes_subnode_reference() {
        let b = to_block(&nb(json!({
            "id": "page-2",
            "type": "child_page",
            "child_page": { "title": "Sub" }
        })))
        .unwrap();
        assert_eq!(b.block_type, BlockType::SubnodeReference);
        assert_eq!(b.id.as_deref(), Some("page-2"));
    }

    #[test]
    fn test_containers_and_unsupported_emit_nothing() {
        assert!(to_block(&nb(json!({ "id": "c", "type": "column_list", "column_list": {} }))).is_none());
        assert!(to_block(&nb(json!({ "id": "d", "type": "divider", "divider": {} }))).is_none());
    }

    #[test]
    fn test_title_from_title_property() {
        let page = json!({
            "properties": {
                "title": { "type": "title", "title": [{ "plain_text": "Road" }, { "plain_text": "map" }] }
            }
        });
        assert_eq!(extract_title(&page).as_deref(), Some("Roadmap"));
    }

    #[test]
    fn test_title_from_database_page_property() {
        let page = json!({
            "properties": {
                "Status": { "type": "select", "select": null },
                "Name": { "type": "title", "title": [{ "plain_text": "Row title" }] }
            }
        });
        assert_eq!(extract_title(&page).as_deref(), Some("Row title"));
    }

    #[test]
    fn test_title_missing() {
        assert_eq!(extract_title(&json!({ "properties": {} })), None);
        assert_eq!(extract_title(&json!({})), None);
    }
}
