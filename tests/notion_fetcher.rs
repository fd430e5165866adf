//! Notion fetcher tests against a mock Notion API.

use std::time::Duration;

use pagetree::config::parse_config;
use pagetree::ingest::ingest_with;
use pagetree::notion::NotionFetcher;
use pagetree::sqlite_sink::SqliteSink;
use pagetree_core::chunk::OversizeGuard;
use pagetree_core::fetch::TreeFetcher;
use pagetree_core::models::BlockType;
use pagetree_core::sink::IndexSink;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "secret_test";

fn fetcher(server: &MockServer) -> NotionFetcher {
    NotionFetcher::new(
        server.uri(),
        SECRET,
        "2022-06-28",
        Duration::from_secs(2),
        100,
    )
    .unwrap()
}

fn rich_block(id: &str, kind: &str, text: &str, has_children: bool) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": kind,
        "has_children": has_children,
        "last_edited_time": "2024-03-01T10:00:00.000Z",
        kind: { "rich_text": [{ "type": "text", "plain_text": text }] }
    })
}

fn child_page(id: &str, title: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "child_page",
        "has_children": true,
        "last_edited_time": "2024-03-01T10:00:00.000Z",
        "child_page": { "title": title }
    })
}

fn container(id: &str, kind: &str) -> Value {
    json!({ "object": "block", "id": id, "type": kind, "has_children": true, kind: {} })
}

fn page(title: &str) -> Value {
    json!({
        "object": "page",
        "properties": {
            "title": { "id": "title", "type": "title", "title": [{ "plain_text": title }] }
        }
    })
}

fn list(results: Vec<Value>) -> Value {
    json!({ "object": "list", "results": results, "has_more": false, "next_cursor": null })
}

async fn mount_page(server: &MockServer, id: &str, title: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/pages/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(title)))
        .mount(server)
        .await;
}

async fn mount_children(server: &MockServer, id: &str, results: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{}/children", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(results)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_title_sends_auth_and_version_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pages/p1"))
        .and(header("Authorization", format!("Bearer {}", SECRET).as_str()))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page("Handbook")))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(fetcher(&server).fetch_title("p1").await.unwrap(), "Handbook");
}

#[tokio::test]
async fn test_title_missing_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pages/p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "properties": {} })))
        .mount(&server)
        .await;

    assert_eq!(fetcher(&server).fetch_title("p1").await.unwrap(), "");
}

#[tokio::test]
async fn test_unauthorized_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/pages/p1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"code\":\"unauthorized\"}"))
        .mount(&server)
        .await;

    let err = fetcher(&server).fetch_title("p1").await.unwrap_err();
    assert_eq!(err.node_id, "p1");
    assert!(err.to_string().contains("401"), "{}", err);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/p1/children"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list(vec![]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let f = NotionFetcher::new(server.uri(), SECRET, "2022-06-28", Duration::from_millis(200), 100)
        .unwrap();
    let err = f.fetch_children("p1").await.unwrap_err();
    assert_eq!(err.node_id, "p1");
}

#[tokio::test]
async fn test_children_follow_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/p1/children"))
        .and(query_param("page_size", "100"))
        .and(query_param_is_missing("start_cursor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [rich_block("b1", "paragraph", "first", false)],
            "has_more": true,
            "next_cursor": "cursor-2"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/p1/children"))
        .and(query_param("start_cursor", "cursor-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![rich_block(
            "b2",
            "bulleted_list_item",
            "second",
            false,
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let children = fetcher(&server).fetch_children("p1").await.unwrap();
    let texts: Vec<&str> = children.blocks.iter().map(|b| b.content.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert_eq!(children.blocks[1].block_type, BlockType::BulletedItem);
}

#[tokio::test]
async fn test_nested_blocks_spliced_after_parent() {
    let server = MockServer::start().await;
    mount_children(
        &server,
        "p1",
        vec![
            rich_block("t1", "toggle", "More", true),
            rich_block("b3", "paragraph", "after", false),
        ],
    )
    .await;
    mount_children(
        &server,
        "t1",
        vec![
            rich_block("n1", "to_do", "inside", true),
            child_page("sub-1", "Nested page"),
        ],
    )
    .await;
    mount_children(&server, "n1", vec![rich_block("n2", "code", "deepest", false)]).await;

    let children = fetcher(&server).fetch_children("p1").await.unwrap();
    let seq: Vec<(BlockType, &str)> = children
        .blocks
        .iter()
        .map(|b| (b.block_type, b.content.as_str()))
        .collect();
    assert_eq!(
        seq,
        vec![
            (BlockType::Toggle, "More"),
            (BlockType::Todo, "inside"),
            (BlockType::Code, "deepest"),
            (BlockType::SubnodeReference, ""),
            (BlockType::Paragraph, "after"),
        ]
    );
    assert_eq!(children.subnode_ids, vec!["sub-1"]);
    assert_eq!(children.blocks[3].id.as_deref(), Some("sub-1"));
}

#[tokio::test]
async fn test_columns_are_transparent_and_unsupported_skipped() {
    let server = MockServer::start().await;
    mount_children(
        &server,
        "p1",
        vec![
            container("cl", "column_list"),
            json!({ "id": "img", "type": "image", "has_children": false, "image": {} }),
            json!({ "id": "tbl", "type": "table", "has_children": true, "table": {} }),
        ],
    )
    .await;
    mount_children(&server, "cl", vec![container("c1", "column"), container("c2", "column")]).await;
    mount_children(&server, "c1", vec![rich_block("l", "paragraph", "left", false)]).await;
    mount_children(&server, "c2", vec![rich_block("r", "quote", "right", false)]).await;

    let children = fetcher(&server).fetch_children("p1").await.unwrap();
    let texts: Vec<&str> = children.blocks.iter().map(|b| b.content.as_str()).collect();
    assert_eq!(texts, vec!["left", "right"]);
}

#[tokio::test]
async fn test_link_preview_and_missing_rich_text() {
    let server = MockServer::start().await;
    mount_children(
        &server,
        "p1",
        vec![
            json!({
                "id": "lp", "type": "link_preview", "has_children": false,
                "link_preview": { "url": "https://example.com/doc" }
            }),
            json!({ "id": "bad", "type": "paragraph", "has_children": false, "paragraph": {} }),
        ],
    )
    .await;

    let children = fetcher(&server).fetch_children("p1").await.unwrap();
    assert_eq!(children.blocks.len(), 2);
    assert_eq!(children.blocks[0].block_type, BlockType::Link);
    assert_eq!(children.blocks[0].content, "https://example.com/doc");
    assert_eq!(children.blocks[1].content, "");
}

#[tokio::test]
async fn test_nested_fetch_failure_fails_the_node() {
    let server = MockServer::start().await;
    mount_children(&server, "p1", vec![rich_block("t1", "toggle", "More", true)]).await;
    Mock::given(method("GET"))
        .and(path("/v1/blocks/t1/children"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetcher(&server).fetch_children("p1").await.unwrap_err();
    assert_eq!(err.node_id, "p1");
    assert!(err.to_string().contains("500"));
}

#[tokio::test]
async fn test_ingest_tree_into_sqlite() {
    let server = MockServer::start().await;
    mount_page(&server, "root", "Handbook").await;
    mount_page(&server, "sub", "Onboarding").await;
    mount_children(
        &server,
        "root",
        vec![
            rich_block("h", "heading_1", "Welcome", false),
            rich_block("p", "paragraph", "Read this first.", false),
            child_page("sub", "Onboarding"),
        ],
    )
    .await;
    mount_children(
        &server,
        "sub",
        vec![rich_block("s1", "numbered_list_item", "Get a laptop", false)],
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let cfg = parse_config(&format!(
        "[db]\npath = \"{}/pagetree.sqlite\"\n",
        tmp.path().display()
    ))
    .unwrap();
    let sink = SqliteSink::connect(&cfg).await.unwrap();

    let report = ingest_with(&fetcher(&server), &sink, "root", OversizeGuard::default()).await;
    assert!(report.success, "{}", report.message);
    assert_eq!(report.nodes_visited, 2);
    assert_eq!(report.chunks_inserted, 3);

    let sub = sink.chunks_for_node("sub").await.unwrap();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].id, "sub-0");
    assert_eq!(sub[0].page_title_path, vec!["Handbook", "Onboarding"]);
    assert_eq!(sub[0].text, "# Handbook\n\n# Onboarding\n\n1. Get a laptop");

    let hits = sink.query("laptop", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk_id, "sub-0");

    let root = sink.get("root-1").await.unwrap().unwrap();
    assert_eq!(root.active_headings, vec!["Welcome"]);
    assert_eq!(root.last_updated, "2024-03-01T10:00:00.000Z");

    // Re-ingesting an unchanged tree leaves the same chunk set.
    let again = ingest_with(&fetcher(&server), &sink, "root", OversizeGuard::default()).await;
    assert_eq!(again.chunks_deleted, 3);
    assert_eq!(sink.count().await.unwrap(), 3);
}
