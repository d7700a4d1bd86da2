use bytes::Bytes;
use parley_client::{Error, EventType, MemoryMediaSink, RoomOptions, TransportEvent};
use parley_core::{MessageType, ProtocolMessage, SessionDescription};
use serde_json::json;
use std::sync::Arc;

use crate::integration::{init_tracing, join_room, join_room_with};
use crate::utils::{FAKE_OFFER_SDP, MockServer, eventually};

#[tokio::test]
async fn test_data_relay() {
    init_tracing();

    let server = MockServer::start().await;
    server.add_virtual_member("bob");
    let sink = MemoryMediaSink::new();
    let alice = join_room_with(
        &server,
        "alice",
        RoomOptions::new("test-room").with_media_sink(Arc::new(sink.clone())),
    )
    .await;

    server.send_to(
        "alice",
        &ProtocolMessage::directed(
            MessageType::DataOffer,
            "bob",
            "alice",
            json!(SessionDescription::offer(FAKE_OFFER_SDP)),
        ),
    );
    let session = alice.events.wait_for_session(EventType::DataOffer).await;
    assert!(session.capabilities().media_relay);
    session.answer().await.expect("Failed to answer");
    assert!(session.media_handle().is_none());

    let transport = alice.transports.transport(0).await;
    transport
        .emit(TransportEvent::DataChannelOpened("media".into()))
        .await;
    transport
        .emit(TransportEvent::DataChannelMessage(Bytes::from_static(b"\x00abc")))
        .await;
    transport
        .emit(TransportEvent::DataChannelMessage(Bytes::from_static(b"def\xff")))
        .await;

    eventually("relayed chunks", || {
        session
            .media_handle()
            .and_then(|h| sink.contents(&h))
            .is_some_and(|c| c.as_ref() == b"\x00abcdef\xff")
    })
    .await;
    let first = session.media_handle().unwrap();

    // A new channel starts a new buffer and releases the old one
    transport
        .emit(TransportEvent::DataChannelOpened("media".into()))
        .await;
    eventually("a fresh buffer", || {
        session.media_handle().is_some_and(|h| h != first)
    })
    .await;
    assert!(!sink.is_live(&first));
    assert_eq!(sink.live_buffers(), 1);

    session.close().await;
    assert!(session.media_handle().is_none());
    assert_eq!(sink.live_buffers(), 0);
}

#[tokio::test]
async fn test_outbound_frames_need_a_data_session() {
    init_tracing();

    let server = MockServer::start().await;
    server.add_virtual_member("bob");
    let alice = join_room(&server, "alice").await;

    let data = alice.room.new_data_offer("bob").await.unwrap().unwrap();
    data.open_channel("media").await.expect("Failed to open channel");
    data.send_frame(Bytes::from_static(b"frame"))
        .await
        .expect("Failed to send");

    let transport = alice.transports.transport(0).await;
    assert_eq!(transport.channels(), vec!["media"]);
    assert_eq!(transport.sent(), vec![Bytes::from_static(b"frame")]);

    let video = alice.room.new_video_offer("bob").await.unwrap().unwrap();
    assert!(matches!(
        video.open_channel("media").await,
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        video.send_frame(Bytes::from_static(b"x")).await,
        Err(Error::Unsupported(_))
    ));
}
