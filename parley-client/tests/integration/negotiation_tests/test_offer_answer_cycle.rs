use parley_client::{NegotiationState, PeerKind, Role, TransportEvent};
use parley_core::{IceCandidate, MessageType, ProtocolMessage, SessionDescription};
use serde_json::json;

use crate::integration::{init_tracing, join_room};
use crate::utils::{MockServer, eventually};

fn candidate(n: u16) -> IceCandidate {
    IceCandidate {
        candidate: format!("candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000 typ host"),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    }
}

#[tokio::test]
async fn test_offer_answer_cycle() {
    init_tracing();

    let server = MockServer::start().await;
    server.add_virtual_member("bob");
    let alice = join_room(&server, "alice").await;

    let session = alice
        .room
        .new_video_offer("bob")
        .await
        .expect("Failed to create session")
        .expect("bob is in the room");
    assert_eq!(session.kind(), PeerKind::Video);
    assert_eq!(session.role(), Role::Offer);
    assert_eq!(session.state(), NegotiationState::New);

    let transport = alice.transports.transport(0).await;
    assert_eq!(transport.target, "bob");

    // Adding media asks for negotiation; the session offers
    transport.emit(TransportEvent::NegotiationNeeded).await;
    let offer = server.wait_for_frame(MessageType::VideoOffer, 1).await;
    assert_eq!(offer.name.as_deref(), Some("alice"));
    assert_eq!(offer.target.as_deref(), Some("bob"));
    assert_eq!(offer.payload["type"], "offer");
    session
        .wait_for_state(NegotiationState::Negotiating)
        .await
        .expect("session closed");

    // Local candidates are trickled to the peer
    transport
        .emit(TransportEvent::CandidateGenerated(candidate(1)))
        .await;
    let trickled = server.wait_for_frame(MessageType::NewIceCandidate, 1).await;
    assert_eq!(trickled.target.as_deref(), Some("bob"));
    assert_eq!(trickled.payload["sdpMLineIndex"], 0);

    server.send_to(
        "alice",
        &ProtocolMessage::directed(
            MessageType::VideoAnswer,
            "bob",
            "alice",
            json!(SessionDescription::answer("v=0\r\n")),
        ),
    );
    session
        .wait_for_state(NegotiationState::Stable)
        .await
        .expect("session closed");
    assert!(transport.ops().contains(&"remote:answer".to_owned()));

    // Candidates from other members are not ours
    for from in ["mallory", "bob"] {
        server.send_to(
            "alice",
            &ProtocolMessage::directed(
                MessageType::NewIceCandidate,
                from,
                "alice",
                json!(candidate(2)),
            ),
        );
    }
    eventually("bob's candidate", || transport.candidates().len() == 1).await;
    assert_eq!(transport.candidates()[0], candidate(2));

    // A second negotiation-needed while stable offers again
    transport.emit(TransportEvent::NegotiationNeeded).await;
    server.wait_for_frame(MessageType::VideoOffer, 2).await;
    assert_eq!(transport.op_count("local:offer"), 2);
}

#[tokio::test]
async fn test_negotiation_needed_outside_stable_is_skipped() {
    init_tracing();

    let server = MockServer::start().await;
    server.add_virtual_member("bob");
    let alice = join_room(&server, "alice").await;

    let _session = alice.room.new_data_offer("bob").await.unwrap().unwrap();
    let transport = alice.transports.transport(0).await;

    transport.emit(TransportEvent::NegotiationNeeded).await;
    server.wait_for_frame(MessageType::DataOffer, 1).await;

    // Still waiting for the answer: a second request must not offer
    transport.emit(TransportEvent::NegotiationNeeded).await;
    eventually("second request to be seen", || {
        transport.op_count("create_offer") == 1
    })
    .await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(server.frames_of(MessageType::DataOffer).len(), 1);
    assert_eq!(transport.op_count("local:offer"), 1);
}
