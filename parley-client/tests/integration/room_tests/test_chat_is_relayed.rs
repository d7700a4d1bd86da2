use parley_client::EventType;
use serde_json::json;

use crate::integration::{init_tracing, join_room};
use crate::utils::MockServer;

#[tokio::test]
async fn test_chat_is_relayed() {
    init_tracing();

    let server = MockServer::start().await;
    let alice = join_room(&server, "alice").await;
    let carol = join_room(&server, "carol").await;

    carol.room.send_chat(json!({ "text": "hello" }), None);
    let event = alice.events.wait_for(EventType::Chat).await;
    let message = event.message().expect("chat carries its message");
    assert!(message.is_from("carol"));
    assert_eq!(message.payload["text"], "hello");

    alice.room.send_chat(json!("just you"), Some("carol"));
    let event = carol.events.wait_for(EventType::Chat).await;
    let message = event.message().expect("chat carries its message");
    assert_eq!(message.target.as_deref(), Some("carol"));
    assert_eq!(message.payload, json!("just you"));
}
