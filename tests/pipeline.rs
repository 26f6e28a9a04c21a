use serde_json::json;
use tokio::sync::mpsc;

use mas_stream::blocks::{chart_block_from_table, ContentBlock};
use mas_stream::config::ChartConfig;
use mas_stream::citation::{ConversationCitations, FileType, StructuredSource};
use mas_stream::stream::{
    abort_signal, hydrate_chart, run_session, ChartSpec, EventResult, MapChartResolver,
    SessionState, StreamAssembler, StreamEvent, StreamingMessage, ToolStatus,
};
use mas_stream::{detect_chart_type, ChartType};

fn decode(line: &str) -> StreamEvent {
    serde_json::from_str(line).unwrap()
}

#[tokio::test]
async fn test_streamed_answer_becomes_blocks_charts_and_citations() {
    let lines = [
        r#"{"type": "tool_call", "name": "query_genie", "args": {"q": "revenue by quarter"}}"#,
        r#"{"type": "text_delta", "delta": "Quarterly revenue "}"#,
        r#"{"type": "tool_output", "name": "query_genie", "output": "4 rows"}"#,
        r#"{"type": "text_delta", "delta": "(Source: /Volumes/finance/fy24.xlsx, page 2):\n\n"}"#,
        r#"{"type": "text_delta", "delta": "| Quarter | Revenue |\n|---|---|\n| Q1 | $1,000 |\n| Q2 | $1,250 |\n\n"}"#,
        r#"{"type": "chart.reference", "dataRef": "genie://stmt/42", "title": "Revenue"}"#,
        r#"{"type": "text_delta", "delta": "See [the deck](decks/q2.pptx#page=4)."}"#,
        r#"{"type": "reasoning.delta", "delta": "ignored"}"#,
    ];

    let (tx, rx) = mpsc::channel::<EventResult>(16);
    for line in lines {
        tx.send(Ok(decode(line))).await.unwrap();
    }
    drop(tx);

    let mut assembler = StreamAssembler::new(StreamingMessage::new("msg", mas_stream::stream::Role::Assistant));
    assembler.set_structured_sources(vec![StructuredSource::from(json!({
        "url": "https://wiki.example.com/revenue",
        "title": "Revenue wiki",
        "score": 0.42
    }))]);

    let (_abort, abort_rx) = abort_signal();
    let state = run_session(&mut assembler, rx, abort_rx).await;
    assert_eq!(state, SessionState::Finalized);

    let message = assembler.into_message();
    assert_eq!(message.tool_calls.len(), 1);
    assert_eq!(message.tool_calls[0].status, ToolStatus::Complete);

    let kinds: Vec<&str> = message.blocks.iter().map(|b| b.kind()).collect();
    assert_eq!(kinds, vec!["text", "table", "text"]);
    let table = message.blocks[1].as_table().unwrap();
    assert_eq!(table.id, "msg-table-1");
    assert_eq!(table.columns, vec!["Quarter", "Revenue"]);
    assert_eq!(detect_chart_type(table), ChartType::Line);

    let chart = chart_block_from_table(table, "msg-chart-table", &ChartConfig::default());
    let spec = chart.spec.unwrap();
    assert_eq!(spec["type"], "line");
    assert_eq!(spec["data"][1], json!({"name": "Q2", "Revenue": 1250.0}));

    let citations = message.citations.unwrap();
    let paths: Vec<&str> = citations.iter().map(|c| c.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/Volumes/finance/fy24.xlsx",
            "decks/q2.pptx",
            "https://wiki.example.com/revenue"
        ]
    );
    assert_eq!(citations[0].file_type, FileType::Excel);
    assert_eq!(citations[0].page, Some(2));
    assert_eq!(citations[1].label, "the deck");
    assert_eq!(citations[1].page, Some(4));
    assert_eq!(citations[2].file_type, FileType::Web);
    assert_eq!(citations[2].id, "cite-2");

    let mut conversation = ConversationCitations::new();
    assert_eq!(conversation.merge(&citations), 3);
    assert_eq!(conversation.merge(&citations[..1]), 0);
}

#[tokio::test]
async fn test_chart_reference_in_textless_answer_hydrates() {
    let (tx, rx) = mpsc::channel::<EventResult>(4);
    tx.send(Ok(decode(
        r#"{"type": "chart_reference", "ref": "genie://stmt/7", "spec_type": "bar"}"#,
    )))
    .await
    .unwrap();
    tx.send(Ok(StreamEvent::Done)).await.unwrap();
    drop(tx);

    let mut assembler = StreamAssembler::new(StreamingMessage::assistant());
    let (_abort, abort_rx) = abort_signal();
    run_session(&mut assembler, rx, abort_rx).await;

    let mut message = assembler.into_message();
    let block_id = match &message.blocks[..] {
        [ContentBlock::Chart(chart)] => {
            assert!(!chart.is_hydrated());
            assert_eq!(chart.spec_type, "bar");
            chart.id.clone()
        }
        other => panic!("expected one chart block, got {:?}", other),
    };

    let mut resolver = MapChartResolver::new();
    resolver.insert(
        "genie://stmt/7",
        ChartSpec {
            spec_type: None,
            spec: json!({"type": "bar", "data": [], "dataKeys": []}),
        },
    );
    assert_eq!(hydrate_chart(&mut message, &block_id, &resolver).await, Ok(true));
    let chart = message.block(&block_id).and_then(|b| b.as_chart()).unwrap();
    assert!(chart.is_hydrated());
    assert_eq!(chart.spec_type, "bar");
}

#[tokio::test]
async fn test_finalization_replaces_chart_reference_when_text_present() {
    let (tx, rx) = mpsc::channel::<EventResult>(4);
    tx.send(Ok(decode(
        r#"{"type": "chart.reference", "dataRef": "genie://stmt/7"}"#,
    )))
    .await
    .unwrap();
    tx.send(Ok(StreamEvent::text("Revenue is up."))).await.unwrap();
    drop(tx);

    let mut assembler = StreamAssembler::new(StreamingMessage::new("c", mas_stream::stream::Role::Assistant));
    let (_abort, abort_rx) = abort_signal();
    run_session(&mut assembler, rx, abort_rx).await;

    let kinds: Vec<&str> = assembler.message().blocks.iter().map(|b| b.kind()).collect();
    assert_eq!(kinds, vec!["text"]);
}

#[tokio::test]
async fn test_backend_error_mid_stream() {
    let (tx, rx) = mpsc::channel::<EventResult>(8);
    for line in [
        r#"{"type": "tool.call", "name": "search"}"#,
        r#"{"type": "text.delta", "delta": "Looking that up"}"#,
        r#"{"type": "error", "message": "Rate limited"}"#,
    ] {
        tx.send(Ok(decode(line))).await.unwrap();
    }
    drop(tx);

    let mut assembler = StreamAssembler::new(StreamingMessage::new("e", mas_stream::stream::Role::Assistant));
    let (_abort, abort_rx) = abort_signal();
    let state = run_session(&mut assembler, rx, abort_rx).await;

    assert_eq!(state, SessionState::Errored);
    let message = assembler.message();
    assert!(message.content.ends_with("Rate limited"));
    assert_eq!(message.tool_calls[0].status, ToolStatus::Error);
    assert_eq!(message.blocks.len(), 1);
}
