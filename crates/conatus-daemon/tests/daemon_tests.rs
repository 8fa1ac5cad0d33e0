//! Tests for conatus-daemon: lifecycle, the conversation path, trigger
//! generation, config loading, output audit, and the in-memory stores.

use chrono::{Duration as ChronoDuration, Utc};
use conatus_core::config::{Config, DaemonConfig};
use conatus_core::tensor::{l2_norm, StateTensor, CHANNEL_COUNT, CHANNEL_DIM};
use conatus_core::traits::{Embedder, ImpactStore, ThoughtStore};
use conatus_core::types::{
    DissonanceReport, Impact, Thought, Trigger, VerbalizeReason, VigilanceLevel,
};
use conatus_daemon::audit::audit_markers;
use conatus_daemon::stores::{
    HashEmbedder, LogNotifier, MemoryCorpus, MemoryImpactStore, MemoryStateStore,
    MemoryThoughtStore, TemplateTranslator,
};
use conatus_daemon::{Boundaries, Daemon, DaemonEvent, Mode, TriggerGenerator};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn memory_boundaries() -> Boundaries {
    Boundaries {
        embedder: Arc::new(HashEmbedder::new()),
        corpus: Arc::new(MemoryCorpus::new()),
        translator: Arc::new(TemplateTranslator::new()),
        notifier: Arc::new(LogNotifier::new()),
        states: Arc::new(MemoryStateStore::new()),
        impacts: Arc::new(MemoryImpactStore::new()),
        thoughts: Arc::new(MemoryThoughtStore::new()),
        detector: None,
    }
}

/// Long loop intervals so the tests drive cycles explicitly.
fn quiet_config() -> Config {
    let mut config = Config::default();
    config.daemon.autonomous_interval_ms = 3_600_000;
    config.daemon.vigilance_interval_ms = 3_600_000;
    config
}

fn dummy_report() -> DissonanceReport {
    DissonanceReport {
        total: 0.9,
        per_channel: [0.0; CHANNEL_COUNT],
        hard_negatives: Vec::new(),
        max_similarity: None,
        is_shock: true,
    }
}

// ===========================================================================
// Lifecycle
// ===========================================================================

#[tokio::test]
async fn daemon_starts_paused_and_stops_paused() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    assert_eq!(daemon.mode(), Mode::Paused);

    daemon.start().await;
    assert_eq!(daemon.mode(), Mode::Autonomous);

    daemon.stop().await;
    assert_eq!(daemon.mode(), Mode::Paused);
}

#[tokio::test]
async fn stop_twice_is_a_noop() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;
    daemon.stop().await;
    daemon.stop().await;
    assert_eq!(daemon.mode(), Mode::Paused);
}

#[tokio::test]
async fn start_twice_is_a_noop() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;
    daemon.start().await;
    daemon.stop().await;
    assert_eq!(daemon.mode(), Mode::Paused);
}

#[tokio::test]
async fn invalid_config_is_rejected_at_construction() {
    let mut config = quiet_config();
    config.fixation.delta_max = 0.0;
    assert!(Daemon::new(config, StateTensor::zeroed(), memory_boundaries()).is_err());
}

// ===========================================================================
// Conversation path
// ===========================================================================

#[tokio::test]
async fn user_message_round_trip() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;

    let reply = daemon.send_user("hello there").await.unwrap();

    assert!(!reply.text.is_empty());
    assert_eq!(reply.reason, VerbalizeReason::ConversationMode);
    assert_eq!(reply.cycle, 1);

    let stats = daemon.stats();
    assert_eq!(stats.conversation_cycles, 1);
    assert_eq!(stats.cycles_run, 1);
    assert_eq!(daemon.mode(), Mode::Autonomous);

    let state = daemon.current_state().await;
    assert_eq!(state.sequence, 1);
    assert_eq!(state.origin, "user");

    daemon.stop().await;
}

#[tokio::test]
async fn consecutive_messages_advance_the_lineage() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;

    daemon.send_user("first").await.unwrap();
    daemon.send_user("second").await.unwrap();

    let state = daemon.current_state().await;
    assert_eq!(state.sequence, 2);
    assert_eq!(state.previous, Some(1));
    assert_eq!(daemon.stats().conversation_cycles, 2);

    daemon.stop().await;
}

#[tokio::test]
async fn send_user_on_a_paused_daemon_fails() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    assert!(daemon.send_user("anyone home?").await.is_err());
}

#[tokio::test]
async fn conversation_emits_a_verbalized_event() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    let mut events = daemon.subscribe();
    daemon.start().await;

    daemon.send_user("speak up").await.unwrap();

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for the event")
        .unwrap();
    match event {
        DaemonEvent::Verbalized { text, reason, .. } => {
            assert!(!text.is_empty());
            assert_eq!(reason, VerbalizeReason::ConversationMode);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    daemon.stop().await;
}

#[tokio::test]
async fn non_user_triggers_also_get_replies() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;

    let reply = daemon
        .enqueue(Trigger::FreeRumination {
            text: "what about silence".to_string(),
        })
        .await
        .unwrap();
    assert!(!reply.text.is_empty());

    daemon.stop().await;
}

// ===========================================================================
// Autonomous and vigilance loops
// ===========================================================================

#[tokio::test]
async fn autonomous_loop_runs_cycles_on_its_own() {
    let mut config = quiet_config();
    config.daemon.autonomous_interval_ms = 10;
    let daemon = Daemon::new(config, StateTensor::zeroed(), memory_boundaries()).unwrap();
    daemon.start().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    daemon.stop().await;

    let stats = daemon.stats();
    assert!(stats.autonomous_cycles >= 1, "stats: {stats:?}");
    assert!(daemon.current_state().await.sequence >= 1);
}

#[tokio::test]
async fn fresh_daemon_vigilance_check_is_ok() {
    let daemon = Daemon::new(quiet_config(), StateTensor::zeroed(), memory_boundaries()).unwrap();
    let alert = daemon.check_vigilance().await;
    assert_eq!(alert.level, VigilanceLevel::Ok);
    assert_eq!(alert.cumulative_drift, 0.0);
}

#[tokio::test]
async fn vigilance_loop_emits_drift_events() {
    let mut config = quiet_config();
    config.daemon.vigilance_interval_ms = 10;
    let daemon = Daemon::new(config, StateTensor::zeroed(), memory_boundaries()).unwrap();
    let mut events = daemon.subscribe();
    daemon.start().await;

    let mut saw_drift = false;
    for _ in 0..10 {
        match tokio::time::timeout(Duration::from_secs(2), events.recv()).await {
            Ok(Ok(DaemonEvent::Drift { .. })) => {
                saw_drift = true;
                break;
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    assert!(saw_drift);

    daemon.stop().await;
}

// ===========================================================================
// Trigger generator
// ===========================================================================

#[tokio::test]
async fn empty_stores_yield_empty_triggers() {
    let generator = TriggerGenerator::with_seed(
        &DaemonConfig::default(),
        Arc::new(MemoryImpactStore::new()),
        Arc::new(MemoryCorpus::new()),
        Arc::new(MemoryThoughtStore::new()),
        42,
    )
    .unwrap();

    for _ in 0..10 {
        assert_eq!(generator.next_trigger().await, Trigger::Empty);
    }
}

#[tokio::test]
async fn stale_unresolved_impact_takes_priority() {
    let impacts = Arc::new(MemoryImpactStore::new());
    let mut impact = Impact::record(&Trigger::user("old shock"), 3, dummy_report());
    impact.created_at = Utc::now() - ChronoDuration::days(10);
    let stale_id = impact.id;
    impacts.append_impact(&impact).await.unwrap();

    let generator = TriggerGenerator::with_seed(
        &DaemonConfig::default(),
        impacts.clone(),
        Arc::new(MemoryCorpus::new()),
        Arc::new(MemoryThoughtStore::new()),
        42,
    )
    .unwrap();

    // Whatever the draw, the stale impact wins every time.
    for _ in 0..5 {
        match generator.next_trigger().await {
            Trigger::ImpactRumination { impact_id, text } => {
                assert_eq!(impact_id, stale_id);
                assert_eq!(text, "old shock");
            }
            other => panic!("unexpected trigger: {other:?}"),
        }
    }
}

#[tokio::test]
async fn fresh_impacts_surface_through_the_rumination_draw() {
    let impacts = Arc::new(MemoryImpactStore::new());
    let impact = Impact::record(&Trigger::user("recent shock"), 1, dummy_report());
    impacts.append_impact(&impact).await.unwrap();

    let generator = TriggerGenerator::with_seed(
        &DaemonConfig::default(),
        impacts,
        Arc::new(MemoryCorpus::new()),
        Arc::new(MemoryThoughtStore::new()),
        7,
    )
    .unwrap();

    // With rumination probability 0.5, 20 draws hit it essentially always.
    let mut ruminated = false;
    for _ in 0..20 {
        if matches!(
            generator.next_trigger().await,
            Trigger::ImpactRumination { .. }
        ) {
            ruminated = true;
            break;
        }
    }
    assert!(ruminated);
}

#[tokio::test]
async fn bad_trigger_probabilities_are_rejected() {
    let config = DaemonConfig {
        rumination_probability: 0.5,
        corpus_probability: 0.5,
        free_probability: 0.5,
        ..DaemonConfig::default()
    };
    assert!(TriggerGenerator::with_seed(
        &config,
        Arc::new(MemoryImpactStore::new()),
        Arc::new(MemoryCorpus::new()),
        Arc::new(MemoryThoughtStore::new()),
        42,
    )
    .is_err());
}

// ===========================================================================
// Config loading
// ===========================================================================

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let config = conatus_daemon::config::load(std::path::Path::new("/nonexistent/conatus.toml"));
    assert_eq!(config.daemon.autonomous_interval_ms, 30_000);
    assert!((config.fixation.delta_max - 0.001).abs() < 1e-9);
}

#[test]
fn partial_toml_keeps_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conatus.toml");
    std::fs::write(&path, "[daemon]\nautonomous_interval_ms = 5\n").unwrap();

    let config = conatus_daemon::config::load(&path);
    assert_eq!(config.daemon.autonomous_interval_ms, 5);
    assert_eq!(config.daemon.vigilance_interval_ms, 120_000);
    assert!((config.fixation.science_weight - 0.45).abs() < 1e-6);
}

#[test]
fn malformed_toml_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conatus.toml");
    std::fs::write(&path, "this is not toml {{{").unwrap();

    let config = conatus_daemon::config::load(&path);
    assert_eq!(config.daemon.autonomous_interval_ms, 30_000);
}

#[test]
fn default_config_renders_as_toml_and_parses_back() {
    let rendered = conatus_daemon::config::to_toml(&Config::default());
    assert!(rendered.contains("[daemon]"));
    let parsed: Config = toml::from_str(&rendered).unwrap();
    parsed.validate().unwrap();
}

// ===========================================================================
// Output audit
// ===========================================================================

#[test]
fn audit_finds_markers_case_insensitively() {
    let markers = vec!["step 1".to_string(), "as an ai".to_string()];
    let found = audit_markers("Step 1: first I will reason about this", &markers);
    assert_eq!(found, vec!["step 1".to_string()]);
}

#[test]
fn audit_passes_clean_text() {
    let markers = DaemonConfig::default().reasoning_markers;
    assert!(audit_markers("the state leans toward tension today", &markers).is_empty());
}

#[test]
fn audit_ignores_empty_markers() {
    let markers = vec![String::new()];
    assert!(audit_markers("anything at all", &markers).is_empty());
}

// ===========================================================================
// In-memory stores
// ===========================================================================

#[tokio::test]
async fn hash_embedder_is_deterministic_and_unit_length() {
    let embedder = HashEmbedder::new();
    assert_eq!(embedder.dimension(), CHANNEL_DIM);

    let a = embedder.embed("the same text").await.unwrap();
    let b = embedder.embed("the same text").await.unwrap();
    let c = embedder.embed("different text").await.unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!((l2_norm(&a) - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn impact_store_resolves_known_ids_only() {
    let store = MemoryImpactStore::new();
    let impact = Impact::record(&Trigger::user("shock"), 0, dummy_report());
    store.append_impact(&impact).await.unwrap();

    assert!(store.resolve_impact(Uuid::new_v4()).await.is_err());
    store.resolve_impact(impact.id).await.unwrap();

    assert!(store.impacts_by_resolved(false).await.unwrap().is_empty());
    assert_eq!(store.impacts_by_resolved(true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn thought_store_returns_newest_first() {
    let store = MemoryThoughtStore::new();
    for label in ["first", "second", "third"] {
        let thought = Thought {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            trigger_label: label.to_string(),
            dissonance_total: 0.1,
            delta_magnitude: 0.0005,
            affected_channels: Vec::new(),
            verbalized: false,
            reason: VerbalizeReason::SilentProcessing,
        };
        store.append_thought(&thought).await.unwrap();
    }

    let recent = store.recent_thoughts(2).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].trigger_label, "third");
    assert_eq!(recent[1].trigger_label, "second");
}
