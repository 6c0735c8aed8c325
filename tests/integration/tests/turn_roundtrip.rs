//! End-to-end turns over durable sessions, the real token-bucket gate, and
//! the per-session coordinator.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use wren_agent_core::{
    AgentLoop, LoopConfig, PipelineStage, RateLimitConfig, SessionRunCoordinator,
    StaticMessageCatalog, TokenBucketRateLimiter,
};
use wren_channel::{ChannelMessage, TransportRegistry};
use wren_integration_tests::{
    init_tracing, EchoStage, RecordingTransport, RestlessStage, ScriptedBackend,
};
use wren_session::{JsonSessionStore, SessionStore};

const CHANNEL: &str = "telegram";

fn build_loop(
    store: Arc<JsonSessionStore>,
    transport: Arc<RecordingTransport>,
    stages: Vec<Arc<dyn PipelineStage>>,
    config: LoopConfig,
) -> AgentLoop {
    let mut transports = TransportRegistry::new();
    transports.register(transport);

    AgentLoop::new(
        store,
        Arc::new(TokenBucketRateLimiter::new(&config.rate_limit)),
        stages,
        transports,
        ScriptedBackend::new("A subsystem failed briefly."),
        Arc::new(StaticMessageCatalog::new()),
        config,
    )
}

fn quiet_config() -> LoopConfig {
    LoopConfig {
        typing_interval_secs: 0,
        ..LoopConfig::default()
    }
}

#[tokio::test]
async fn conversation_history_survives_process_restarts() {
    init_tracing();
    let dir = tempdir().expect("tempdir");

    {
        let store = Arc::new(JsonSessionStore::new(dir.path()).expect("store"));
        let transport = RecordingTransport::new(CHANNEL);
        let agent_loop = build_loop(
            store,
            transport.clone(),
            vec![Arc::new(EchoStage)],
            quiet_config(),
        );

        agent_loop
            .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "hello"))
            .await;
        agent_loop
            .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "again"))
            .await;

        assert_eq!(
            transport.delivered(),
            vec![
                ("42".to_string(), "echo: hello".to_string()),
                ("42".to_string(), "echo: again".to_string()),
            ]
        );
    }

    // A fresh store instance sees the full four-message history.
    let store = JsonSessionStore::new(dir.path()).expect("store");
    let session = store.get_or_create(CHANNEL, "42").expect("session");
    assert_eq!(session.messages.len(), 4);
    assert_eq!(session.assistant_message_count(), 2);
    assert_eq!(session.messages[1].text(), "echo: hello");
}

#[tokio::test]
async fn token_bucket_gate_drops_excess_turns_without_touching_the_session() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonSessionStore::new(dir.path()).expect("store"));
    let transport = RecordingTransport::new(CHANNEL);

    let config = LoopConfig {
        rate_limit: RateLimitConfig {
            enabled: true,
            requests_per_minute: 1,
        },
        ..quiet_config()
    };
    let agent_loop = build_loop(
        store.clone(),
        transport.clone(),
        vec![Arc::new(EchoStage)],
        config,
    );

    agent_loop
        .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "first"))
        .await;
    agent_loop
        .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "second"))
        .await;

    // Only the first turn was processed and persisted.
    assert_eq!(transport.delivered_count(), 1);
    let session = store.get_or_create(CHANNEL, "42").expect("session");
    assert_eq!(session.messages.len(), 2);
    assert_eq!(session.messages[0].text(), "first");
}

#[tokio::test]
async fn iteration_cap_from_config_yields_limit_notice_only() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonSessionStore::new(dir.path()).expect("store"));
    let transport = RecordingTransport::new(CHANNEL);

    let config = LoopConfig::from_toml_str(
        r#"
        max_iterations = 2
        typing_interval_secs = 0
        "#,
    )
    .expect("config");
    let agent_loop = build_loop(
        store.clone(),
        transport.clone(),
        vec![Arc::new(RestlessStage)],
        config,
    );

    agent_loop
        .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "spin"))
        .await;

    let delivered = transport.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].1.contains("2 processing rounds"));

    // The notice is transport-only; durable history keeps the user turn.
    let session = store.get_or_create(CHANNEL, "42").expect("session");
    assert_eq!(session.assistant_message_count(), 0);
    assert_eq!(session.messages.len(), 1);
}

#[tokio::test]
async fn coordinator_drives_parallel_sessions_over_durable_store() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonSessionStore::new(dir.path()).expect("store"));
    let transport = RecordingTransport::new(CHANNEL);
    let agent_loop = Arc::new(build_loop(
        store.clone(),
        transport.clone(),
        vec![Arc::new(EchoStage)],
        quiet_config(),
    ));

    let coordinator = SessionRunCoordinator::new(agent_loop);
    coordinator.dispatch(ChannelMessage::user(CHANNEL, "42", "alice", "hi"));
    coordinator.dispatch(ChannelMessage::user(CHANNEL, "43", "bob", "yo"));
    coordinator.dispatch(ChannelMessage::user(CHANNEL, "42", "alice", "more"));

    let started = std::time::Instant::now();
    while transport.delivered_count() < 3 {
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "turns did not complete in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let session_a = store.get_or_create(CHANNEL, "42").expect("session 42");
    let session_b = store.get_or_create(CHANNEL, "43").expect("session 43");
    assert_eq!(session_a.messages.len(), 4);
    assert_eq!(session_b.messages.len(), 2);

    // Same-session turns completed in arrival order.
    let texts_42: Vec<&str> = session_a
        .messages
        .iter()
        .map(|message| message.text())
        .collect();
    assert_eq!(texts_42, vec!["hi", "echo: hi", "more", "echo: more"]);

    coordinator.shutdown();
    coordinator.shutdown();
}

#[tokio::test]
async fn typing_indicator_refreshes_while_a_turn_is_in_flight() {
    init_tracing();
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(JsonSessionStore::new(dir.path()).expect("store"));
    let transport = RecordingTransport::new(CHANNEL);

    struct SlowEcho;

    #[async_trait::async_trait]
    impl PipelineStage for SlowEcho {
        fn name(&self) -> &str {
            "slow_echo"
        }

        fn order(&self) -> i32 {
            20
        }

        async fn process(
            &self,
            context: &mut wren_agent_core::TurnContext,
        ) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            context.outgoing = Some(wren_agent_core::OutgoingResponse::text_only("done"));
            context.final_answer_ready = true;
            Ok(())
        }
    }

    let config = LoopConfig {
        typing_interval_secs: 1,
        ..LoopConfig::default()
    };
    let agent_loop = build_loop(store, transport.clone(), vec![Arc::new(SlowEcho)], config);

    agent_loop
        .process_message(ChannelMessage::user(CHANNEL, "42", "alice", "think hard"))
        .await;

    // The interval fires immediately on spawn, so a 150ms turn sees at
    // least one refresh.
    assert!(transport.typing_count() >= 1);
    assert_eq!(transport.delivered_count(), 1);
}
