//! End-to-end tests driving the full runtime loop with scripted
//! collaborators.
//!
//! # Oracle Pattern
//!
//! Tests end with oracle checks over the driver's recordings: which
//! feeds opened and closed, which sends and presence updates went out,
//! and what the UI saw in its final snapshot.

use chatdeck_core::{Credential, MemoryStore, UserIdentity};
use chatdeck_harness::{SimDriver, SimEnv};
use chatdeck_session::{
    ChatPayload, ChatSession, FeedEvent, FeedKind, FeedPayload, InboundMessage, MessageState,
    ResolvedProfile, Runtime, SendOutcome, SessionConfig, SessionEvent,
};

type SimRuntime = Runtime<SimDriver, SimEnv, MemoryStore>;

fn profile(chatroom_id: u64, username: &str) -> ResolvedProfile {
    ResolvedProfile {
        chatroom_id,
        user_id: chatroom_id + 1000,
        username: username.into(),
        metadata: serde_json::Value::Null,
    }
}

fn me() -> UserIdentity {
    UserIdentity::new(42, "me")
}

fn runtime_with(env: &SimEnv, driver: &SimDriver) -> SimRuntime {
    let session = ChatSession::new(env.clone(), SessionConfig::default(), MemoryStore::new());
    Runtime::new(driver.clone(), session)
}

/// Subscribe a chatroom through the runtime's action executor.
async fn subscribe(runtime: &mut SimRuntime, driver: &SimDriver, chatroom_id: u64, handle: &str) {
    driver.script_profile(handle, Ok(profile(chatroom_id, handle)));
    let actions = runtime.session_mut().add_chatroom(handle).expect("add accepted");
    runtime.dispatch(actions).await;
}

async fn login(runtime: &mut SimRuntime) {
    let actions =
        runtime.session_mut().handle(SessionEvent::SelfFetched { result: Ok(me()) });
    runtime.dispatch(actions).await;
}

#[tokio::test]
async fn full_lifecycle_opens_and_closes_both_feeds() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));

    let mut runtime = runtime_with(&env, &driver);
    subscribe(&mut runtime, &driver, 123, "alice").await;

    // Drain: bootstrap, the queued Connected statuses, then shutdown.
    runtime.run().await.expect("runtime runs to completion");

    assert_eq!(driver.opened(), vec![(123, FeedKind::Primary), (123, FeedKind::Cosmetic)]);

    let closed = driver.closed();
    assert!(closed.contains(&(123, FeedKind::Primary)), "shutdown closes the primary feed");
    assert!(closed.contains(&(123, FeedKind::Cosmetic)), "shutdown closes the cosmetic feed");
    assert!(driver.is_stopped());

    let last = driver.snapshots().last().cloned().expect("UI was notified");
    assert_eq!(last.chatrooms.len(), 1);
    assert_eq!(last.chatrooms[0].username, "alice");
}

#[tokio::test]
async fn send_then_echo_confirms_through_the_loop() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));

    let mut runtime = runtime_with(&env, &driver);
    subscribe(&mut runtime, &driver, 123, "alice").await;
    login(&mut runtime).await;

    let actions =
        runtime.session_mut().send_message(123, "hello", None).expect("send accepted");
    runtime.dispatch(actions).await;
    assert_eq!(driver.chat_sends(), vec![(123, "hello".to_string())]);

    // The server echoes our message back on the primary feed.
    driver.push_event(SessionEvent::Feed {
        chatroom_id: 123,
        feed: FeedKind::Primary,
        event: FeedEvent::Payload(FeedPayload::Chat(ChatPayload::Message(InboundMessage {
            id: "srv-1".into(),
            content: "hello".into(),
            sender: me(),
            reply: None,
            created_at: 7,
        }))),
    });

    let echoed = runtime.session_mut().handle(
        driver_poll(&driver).await.expect("echo event queued"),
    );
    runtime.dispatch(echoed).await;

    let history = runtime.session().history(123);
    assert_eq!(history.len(), 1, "echo confirms, never duplicates");
    assert_eq!(history[0].state, MessageState::Confirmed);
}

/// Pop one scripted event off the driver queue.
async fn driver_poll(driver: &SimDriver) -> Option<SessionEvent<std::time::Instant>> {
    use chatdeck_session::Driver as _;
    let mut d = driver.clone();
    d.poll_event().await.expect("sim driver never errors")
}

#[tokio::test]
async fn auth_rejection_reaches_the_ui() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));

    let mut runtime = runtime_with(&env, &driver);
    subscribe(&mut runtime, &driver, 123, "alice").await;
    login(&mut runtime).await;

    driver.push_send_outcome(SendOutcome::AuthRejected);
    let actions = runtime.session_mut().send_message(123, "hi", None).expect("send accepted");
    runtime.dispatch(actions).await;

    let history = runtime.session().history(123);
    assert_eq!(history[0].state, MessageState::Failed);
    assert_eq!(history.len(), 2, "system notice follows the failed entry");

    let last = driver.snapshots().last().cloned().expect("UI notified");
    assert_eq!(last.chatrooms[0].history_len, 2);
}

#[tokio::test]
async fn failed_handshake_reports_through_status() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));
    driver.fail_open(123, FeedKind::Primary);

    let mut runtime = runtime_with(&env, &driver);
    subscribe(&mut runtime, &driver, 123, "alice").await;

    // Process the queued status events (Failed primary, Connected
    // cosmetic).
    for _ in 0..2 {
        if let Some(event) = driver_poll(&driver).await {
            let actions = runtime.session_mut().handle(event);
            runtime.dispatch(actions).await;
        }
    }

    let status = runtime.session().status();
    assert_eq!(status.failed, 1, "the failed handshake shows in aggregate status");
    assert_eq!(status.healthy, 0);
}

#[tokio::test]
async fn presence_goes_out_once_per_interval() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));

    let mut runtime = runtime_with(&env, &driver);
    subscribe(&mut runtime, &driver, 123, "alice").await;
    login(&mut runtime).await;
    let actions = runtime.session_mut().handle(SessionEvent::CredentialUpdated {
        credential: Some(Credential { token: "tok".into(), session_tag: "s".into() }),
    });
    runtime.dispatch(actions).await;

    let first = runtime.session_mut().touch_presence(123);
    runtime.dispatch(first).await;
    let second = runtime.session_mut().touch_presence(123);
    runtime.dispatch(second).await;

    // Two touches inside the interval, exactly one external call.
    assert_eq!(driver.presence_calls(), vec![(1123, 42)]);
}

#[tokio::test]
async fn lookup_failure_surfaces_in_snapshot() {
    let env = SimEnv::with_seed(42);
    let driver = SimDriver::new(env.clone());
    driver.script_self(Ok(me()));
    driver.script_profile("ghost", Err("channel not found".into()));

    let mut runtime = runtime_with(&env, &driver);
    let actions = runtime.session_mut().add_chatroom("ghost").expect("add accepted");
    runtime.dispatch(actions).await;

    assert!(runtime.session().chatrooms().is_empty(), "no partial state");
    let last = driver.snapshots().last().cloned().expect("UI notified");
    assert!(
        last.status_message.unwrap_or_default().contains("ghost"),
        "failure names the handle"
    );
    assert!(driver.opened().is_empty(), "no feeds opened for a failed add");
}
