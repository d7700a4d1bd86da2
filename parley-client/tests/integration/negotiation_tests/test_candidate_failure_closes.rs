use parley_client::{NegotiationState, PeerKind};
use parley_core::{IceCandidate, MessageType, ProtocolMessage};
use serde_json::json;

use crate::integration::{init_tracing, join_room};
use crate::utils::MockServer;

#[tokio::test]
async fn test_candidate_failure_closes() {
    init_tracing();

    let server = MockServer::start().await;
    server.add_virtual_member("bob");
    let alice = join_room(&server, "alice").await;

    let session = alice.room.new_video_offer("bob").await.unwrap().unwrap();
    let transport = alice.transports.transport(0).await;
    transport.fail_candidates();

    let candidate = IceCandidate {
        candidate: "candidate:garbage".into(),
        sdp_mid: None,
        sdp_m_line_index: None,
        username_fragment: None,
    };
    server.send_to(
        "alice",
        &ProtocolMessage::directed(MessageType::NewIceCandidate, "bob", "alice", json!(candidate)),
    );

    session
        .wait_for_state(NegotiationState::Closed)
        .await
        .expect("closing counts as reaching Closed");

    let ops = transport.ops();
    assert!(ops.contains(&"stop_transceivers".to_owned()));
    assert_eq!(transport.op_count("close"), 1);
    assert!(alice.room.session("bob", PeerKind::Video).is_none());
}
