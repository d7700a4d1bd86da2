use parley_client::{PeerTransport, SignalingState};
use parley_core::SessionDescription;
use parley_core::sdp::{Direction, media_directions};

use crate::integration::init_tracing;
use crate::utils::RtcPeer;

#[tokio::test]
async fn test_rtc_rollback_discards_local_offer() {
    init_tracing();

    let alice = RtcPeer::with_video("bob").await;
    alice.transport.create_data_channel("frames").await.unwrap();

    alice.offer().await;
    assert_eq!(alice.state(), SignalingState::HaveLocalOffer);

    alice
        .transport
        .set_local_description(SessionDescription::rollback())
        .await
        .expect("rollback from have-local-offer");
    assert_eq!(alice.state(), SignalingState::Stable);

    // Local media survives and the next offer carries it again
    let offer = alice.offer().await;
    assert_eq!(alice.state(), SignalingState::HaveLocalOffer);
    assert!(media_directions(&offer.sdp).contains(&Direction::SendRecv));
    assert!(offer.sdp.contains("m=application"));
}

#[tokio::test]
async fn test_rtc_rollback_without_offer_fails() {
    init_tracing();

    let alice = RtcPeer::with_video("bob").await;
    let result = alice
        .transport
        .set_local_description(SessionDescription::rollback())
        .await;

    assert!(result.is_err());
    assert_eq!(alice.state(), SignalingState::Stable);
}
