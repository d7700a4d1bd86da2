use parley_client::{EventType, RoomEvent};

use crate::integration::{init_tracing, join_room};
use crate::utils::{MockServer, eventually};

#[tokio::test]
async fn test_membership_follows_server() {
    init_tracing();

    let server = MockServer::start().await;
    let alice = join_room(&server, "alice").await;

    let carol = join_room(&server, "carol").await;
    let RoomEvent::UserJoin(name) = alice.events.wait_for(EventType::UserJoin).await else {
        panic!("expected a join");
    };
    assert_eq!(name, "carol");
    assert_eq!(alice.room.user_list(), vec!["alice", "carol"]);
    assert_eq!(carol.room.user_list(), vec!["alice", "carol"]);

    carol.room.disconnect();
    let RoomEvent::UserLeave(name) = alice.events.wait_for(EventType::UserLeave).await else {
        panic!("expected a leave");
    };
    assert_eq!(name, "carol");
    eventually("carol to leave the list", || {
        alice.room.user_list() == vec!["alice"]
    })
    .await;
}
