use parley_client::{PeerTransport, SignalingState};
use parley_core::sdp::{Direction, media_directions};

use crate::integration::init_tracing;
use crate::utils::{RtcPeer, host_candidate};

#[tokio::test]
async fn test_rtc_offer_answer_reaches_stable() {
    init_tracing();

    let alice = RtcPeer::with_video("bob").await;
    let bob = RtcPeer::with_video("alice").await;

    let offer = alice.offer().await;
    assert_eq!(alice.state(), SignalingState::HaveLocalOffer);

    bob.transport.set_remote_description(offer).await.unwrap();
    assert_eq!(bob.state(), SignalingState::HaveRemoteOffer);
    let answer = bob.transport.create_answer().await.unwrap();
    bob.transport
        .set_local_description(answer.clone())
        .await
        .unwrap();
    alice.transport.set_remote_description(answer.clone()).await.unwrap();

    assert_eq!(alice.state(), SignalingState::Stable);
    assert_eq!(bob.state(), SignalingState::Stable);
    assert!(media_directions(&answer.sdp).contains(&Direction::SendRecv));
    assert!(alice.transport.local_description().await.is_some());
}

#[tokio::test]
async fn test_rtc_candidate_before_remote_description_is_held() {
    init_tracing();

    let alice = RtcPeer::with_video("bob").await;
    let bob = RtcPeer::new("alice").await;

    // Trickled ahead of the offer it belongs to
    bob.transport
        .add_ice_candidate(host_candidate())
        .await
        .expect("an early candidate is held, not rejected");

    let offer = alice.offer().await;
    bob.transport
        .set_remote_description(offer)
        .await
        .expect("held candidates never fail the description commit");
    let answer = bob.transport.create_answer().await.unwrap();
    bob.transport.set_local_description(answer.clone()).await.unwrap();
    alice.transport.set_remote_description(answer).await.unwrap();

    assert_eq!(alice.state(), SignalingState::Stable);
    assert_eq!(bob.state(), SignalingState::Stable);
}
