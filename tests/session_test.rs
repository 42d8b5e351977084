use std::sync::Arc;
use std::time::Duration;

use databoard::autosave::DEFAULT_QUIET_INTERVAL;
use databoard::chat::ChatEvent;
use databoard::codec;
use databoard::document::GraphDocument;
use databoard::error::NoticeLevel;
use databoard::export::ExportFormat;
use databoard::node::{ChartKind, ElementKind, Node, Position, Viewport};
use databoard::session::CanvasSession;
use databoard::store::MemoryCanvasStore;
use databoard::sync::SyncState;
use tokio::time::sleep;

async fn open_new(store: &Arc<MemoryCanvasStore>, script: &str) -> CanvasSession<MemoryCanvasStore> {
    let record = store.insert("alice", "Board", script);
    CanvasSession::open(Arc::clone(store), "alice", &record.id, DEFAULT_QUIET_INTERVAL)
        .await
        .expect("canvas exists")
}

#[tokio::test(start_paused = true)]
async fn test_open_malformed_script_shows_empty_canvas() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, "{ \"nodes\": [").await;

    assert_eq!(session.document(), &GraphDocument::empty());
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert!(!session.has_unsaved_changes(), "loading never counts as an edit");

    sleep(Duration::from_secs(5)).await;
    assert!(store.saved_scripts().is_empty(), "a load must not write back");
    println!("✓ A broken stored canvas opens empty with a notice");
}

#[tokio::test(start_paused = true)]
async fn test_open_restores_stored_viewport() {
    let store = Arc::new(MemoryCanvasStore::new());
    let doc = GraphDocument::empty().set_viewport(Viewport {
        x: 10.0,
        y: 20.0,
        zoom: 0.5,
    });
    let session = open_new(&store, &codec::encode(&doc)).await;
    assert_eq!(session.camera().zoom, 0.5);
    assert_eq!(session.name(), "Board");
    println!("✓ The stored viewport becomes the camera");
}

#[tokio::test(start_paused = true)]
async fn test_structured_edits_are_autosaved() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;
    assert_eq!(session.state(), SyncState::Clean, "nothing to save after a load");

    let node = Node::chart(ChartKind::Radar, Position::new(0.0, 0.0));
    let id = node.id().to_string();
    session.edit(|g| g.add_node(node)).unwrap();
    sleep(Duration::from_millis(800)).await;
    session
        .edit(|g| g.move_node(&id, Position::new(90.0, 0.0)))
        .unwrap();
    assert_eq!(session.state(), SyncState::StructuredEdit);
    assert!(session.has_unsaved_changes());

    sleep(Duration::from_millis(2100)).await;
    let saved = store.saved_scripts();
    assert_eq!(saved.len(), 1, "edits inside the quiet interval coalesce");
    assert_eq!(codec::decode(&saved[0]).unwrap(), *session.document());
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.state(), SyncState::Clean);
    println!("✓ Edits reach the store once the canvas goes quiet");
}

#[tokio::test(start_paused = true)]
async fn test_bad_text_apply_keeps_document() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;
    let before = session.document().clone();

    session.edit_text("{ broken");
    assert!(session.apply_text().is_err());
    assert_eq!(session.document(), &before);
    assert!(session.last_parse_error().is_some());
    assert_eq!(session.text(), "{ broken");

    sleep(Duration::from_secs(5)).await;
    assert!(store.saved_scripts().is_empty(), "rejected text is never saved");
    println!("✓ Rejected text leaves the canvas and the store alone");
}

#[tokio::test(start_paused = true)]
async fn test_failed_autosave_raises_notice() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;
    store.set_failing(true);

    let node = Node::element(ElementKind::Text, Position::new(0.0, 0.0));
    session.edit(|g| g.add_node(node)).unwrap();
    sleep(Duration::from_millis(2100)).await;

    assert!(session.has_unsaved_changes());
    assert_eq!(session.state(), SyncState::StructuredEdit);
    let notices = session.take_notices();
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Error));

    store.set_failing(false);
    session.save_now().await.unwrap();
    assert!(!session.has_unsaved_changes());
    assert_eq!(session.state(), SyncState::Clean);
    println!("✓ Save failures are visible and an explicit save recovers");
}

#[tokio::test(start_paused = true)]
async fn test_chat_canvas_update_is_a_structured_edit() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;

    let proposal = GraphDocument::empty()
        .add_node(Node::chart(ChartKind::Funnel, Position::new(0.0, 0.0)))
        .unwrap();
    let event = ChatEvent::CanvasUpdate {
        canvas: serde_json::to_string(&proposal).unwrap(),
        explanation: "Added a funnel".to_string(),
    };
    session.apply_chat_event(&event).unwrap();

    assert_eq!(session.document(), &proposal);
    assert_eq!(session.text(), codec::encode(&proposal));
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, "Added a funnel");

    sleep(Duration::from_millis(2100)).await;
    assert_eq!(store.saved_scripts().len(), 1);
    println!("✓ Assistant updates replace the canvas and get saved");
}

#[tokio::test(start_paused = true)]
async fn test_invalid_chat_canvas_is_rejected() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;
    let before = session.document().clone();

    let event = ChatEvent::CanvasUpdate {
        canvas: "{\"nodes\": [{\"id\": 1".to_string(),
        explanation: String::new(),
    };
    assert!(session.apply_chat_event(&event).is_err());
    assert_eq!(session.document(), &before);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);

    let other = ChatEvent::TextDelta {
        text: "hi".to_string(),
    };
    assert!(session.apply_chat_event(&other).is_ok());

    sleep(Duration::from_secs(5)).await;
    assert!(store.saved_scripts().is_empty());
    println!("✓ Invalid assistant canvases are reported and ignored");
}

#[tokio::test(start_paused = true)]
async fn test_selection_and_export_keep_camera() {
    let store = Arc::new(MemoryCanvasStore::new());
    let mut session = open_new(&store, codec::EMPTY_DOCUMENT).await;

    let node = Node::chart(ChartKind::Pie, Position::new(0.0, 0.0));
    let id = node.id().to_string();
    session.edit(|g| g.add_node(node)).unwrap();
    session.select(Some(&id));
    assert_eq!(session.selected(), Some(id.as_str()));
    session.select(Some("ghost"));
    assert_eq!(session.selected(), None);

    let camera = Viewport {
        x: -300.0,
        y: 40.0,
        zoom: 2.0,
    };
    session.set_camera(camera);
    let file = session.export(ExportFormat::Json).unwrap();
    assert!(file.file_name.starts_with("Board-"));
    assert_eq!(session.camera(), camera);

    session.edit(|g| g.delete_node(&id)).unwrap();
    assert!(session.export(ExportFormat::Png).is_err());
    assert_eq!(session.camera(), camera, "camera unchanged after failure");
    assert!(!session.take_notices().is_empty());
    println!("✓ Exports never move the user's camera");
}
