use parley_client::{PeerTransport, SignalingState};
use parley_core::sdp::{self, Direction, media_directions};
use parley_core::{SdpType, SessionDescription};

use crate::integration::init_tracing;
use crate::utils::RtcPeer;

#[tokio::test]
async fn test_rtc_pre_answer_then_confirm() {
    init_tracing();

    let alice = RtcPeer::with_video("bob").await;
    let bob = RtcPeer::new("alice").await;

    let offer = alice.offer().await;
    bob.transport.set_remote_description(offer).await.unwrap();

    bob.transport.withhold_receive().await.unwrap();
    let provisional = bob.transport.create_answer().await.unwrap();
    let directions = media_directions(&provisional.sdp);
    assert!(!directions.is_empty());
    assert!(directions.iter().all(|d| !d.receives()));
    // Nothing left for a textual rewrite to withhold
    assert!(sdp::withhold_receive(&provisional.sdp).1.is_empty());

    let pranswer = SessionDescription::pranswer(provisional.sdp);
    bob.transport
        .set_local_description(pranswer.clone())
        .await
        .expect("engine accepts the provisional answer it created");
    assert_eq!(bob.state(), SignalingState::HaveLocalPranswer);
    alice.transport.set_remote_description(pranswer).await.unwrap();
    assert_eq!(alice.state(), SignalingState::HaveRemotePranswer);

    bob.transport.restore_receive().await.unwrap();
    let answer = bob.transport.create_answer().await.unwrap();
    assert_eq!(answer.sdp_type, SdpType::Answer);
    assert!(media_directions(&answer.sdp).contains(&Direction::RecvOnly));

    bob.transport.set_local_description(answer.clone()).await.unwrap();
    alice.transport.set_remote_description(answer).await.unwrap();
    assert_eq!(bob.state(), SignalingState::Stable);
    assert_eq!(alice.state(), SignalingState::Stable);
}
