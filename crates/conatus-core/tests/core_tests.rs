//! Tests for conatus-core: tensor math, channels, triggers, records, config

use conatus_core::config::{
    AnchorConfig, AnchorKind, DaemonConfig, DissonanceConfig, FixationConfig, VigilanceConfig,
};
use conatus_core::tensor::{
    cosine, l2_norm, normalize, normalized_euclidean, Channel, StateTensor, CHANNEL_COUNT,
    CHANNEL_DIM,
};
use conatus_core::types::{Impact, Trigger, VerbalizeReason};
use conatus_core::{Config, Error};
use chrono::{Duration, Utc};

fn unit_at(index: usize) -> Vec<f32> {
    let mut v = vec![0.0; CHANNEL_DIM];
    v[index] = 1.0;
    v
}

// ===========================================================================
// Vector math
// ===========================================================================

#[test]
fn l2_norm_of_unit_vector_is_one() {
    assert!((l2_norm(&unit_at(3)) - 1.0).abs() < 1e-6);
}

#[test]
fn normalize_produces_unit_length() {
    let mut v = vec![3.0, 4.0];
    normalize(&mut v);
    assert!((l2_norm(&v) - 1.0).abs() < 1e-6);
    assert!((v[0] - 0.6).abs() < 1e-6);
    assert!((v[1] - 0.8).abs() < 1e-6);
}

#[test]
fn normalize_leaves_zero_vector_alone() {
    let mut v = vec![0.0; 16];
    normalize(&mut v);
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn cosine_identical_vectors_is_one() {
    let v = unit_at(0);
    assert!((cosine(&v, &v) - 1.0).abs() < 1e-6);
}

#[test]
fn cosine_orthogonal_vectors_is_zero() {
    assert!(cosine(&unit_at(0), &unit_at(1)).abs() < 1e-6);
}

#[test]
fn cosine_degenerate_inputs_score_zero() {
    let v = unit_at(0);
    let zero = vec![0.0; CHANNEL_DIM];
    let short = vec![1.0; 4];
    assert_eq!(cosine(&v, &zero), 0.0);
    assert_eq!(cosine(&zero, &zero), 0.0);
    assert_eq!(cosine(&v, &short), 0.0);
    assert_eq!(cosine(&[], &[]), 0.0);
}

#[test]
fn normalized_euclidean_identical_is_zero() {
    let v = unit_at(5);
    assert_eq!(normalized_euclidean(&v, &v), 0.0);
}

#[test]
fn normalized_euclidean_known_value() {
    // distance 2 over 4 dims: 2 / sqrt(4) = 1
    let a = vec![0.0, 0.0, 0.0, 0.0];
    let b = vec![2.0, 0.0, 0.0, 0.0];
    assert!((normalized_euclidean(&a, &b) - 1.0).abs() < 1e-6);
}

#[test]
fn normalized_euclidean_mismatched_lengths_is_zero() {
    assert_eq!(normalized_euclidean(&[1.0, 2.0], &[1.0]), 0.0);
}

// ===========================================================================
// Channel
// ===========================================================================

#[test]
fn channel_all_has_eight_entries_in_fixed_order() {
    assert_eq!(Channel::ALL.len(), CHANNEL_COUNT);
    assert_eq!(Channel::ALL[0], Channel::Values);
    assert_eq!(Channel::ALL[7], Channel::Tension);
}

#[test]
fn channel_index_roundtrip() {
    for channel in Channel::ALL {
        assert_eq!(Channel::from_index(channel.index()), Some(channel));
    }
    assert_eq!(Channel::from_index(8), None);
}

#[test]
fn channel_display_matches_name() {
    assert_eq!(format!("{}", Channel::Habits), "habits");
    assert_eq!(Channel::Narrative.name(), "narrative");
}

#[test]
fn channel_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&Channel::Beliefs).unwrap(),
        r#""beliefs""#
    );
}

// ===========================================================================
// StateTensor
// ===========================================================================

#[test]
fn zeroed_tensor_has_no_written_channels() {
    let tensor = StateTensor::zeroed();
    assert_eq!(tensor.sequence, 0);
    assert_eq!(tensor.previous, None);
    for channel in Channel::ALL {
        assert!(!tensor.is_written(channel));
        assert_eq!(tensor.channel(channel).len(), CHANNEL_DIM);
    }
}

#[test]
fn set_channel_normalizes_to_unit_length() {
    let mut tensor = StateTensor::zeroed();
    let mut v = vec![0.0; CHANNEL_DIM];
    v[0] = 3.0;
    v[1] = 4.0;
    tensor.set_channel(Channel::Values, v).unwrap();
    assert!(tensor.is_written(Channel::Values));
    assert!((l2_norm(tensor.channel(Channel::Values)) - 1.0).abs() < 1e-6);
}

#[test]
fn set_channel_rejects_wrong_dimension_without_mutating() {
    let mut tensor = StateTensor::zeroed();
    let err = tensor
        .set_channel(Channel::Values, vec![1.0; 12])
        .unwrap_err();
    match err {
        Error::DimensionMismatch { expected, actual } => {
            assert_eq!(expected, CHANNEL_DIM);
            assert_eq!(actual, 12);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!tensor.is_written(Channel::Values));
}

#[test]
fn from_channels_requires_exactly_eight() {
    let err = StateTensor::from_channels(vec![unit_at(0); 7]).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { .. }));

    let tensor = StateTensor::from_channels(vec![unit_at(0); 8]).unwrap();
    for channel in Channel::ALL {
        assert!(tensor.is_written(channel));
    }
}

#[test]
fn successor_bumps_sequence_and_records_lineage() {
    let tensor = StateTensor::zeroed();
    let next = tensor.successor("user");
    assert_eq!(next.sequence, 1);
    assert_eq!(next.previous, Some(0));
    assert_eq!(next.origin, "user");
    let third = next.successor("empty");
    assert_eq!(third.sequence, 2);
    assert_eq!(third.previous, Some(1));
}

#[test]
fn reference_tensor_is_tagged_sequence_minus_one() {
    let mut base = StateTensor::zeroed();
    base.set_channel(Channel::Memory, unit_at(2)).unwrap();
    let reference = StateTensor::reference(&base);
    assert_eq!(reference.sequence, -1);
    assert_eq!(reference.previous, None);
    assert_eq!(reference.origin, "reference");
    assert_eq!(reference.channel(Channel::Memory), base.channel(Channel::Memory));
}

#[test]
fn deep_copy_is_independent() {
    let original = StateTensor::zeroed();
    let mut copy = original.deep_copy();
    copy.set_channel(Channel::Affect, unit_at(9)).unwrap();
    assert!(copy.is_written(Channel::Affect));
    assert!(!original.is_written(Channel::Affect));
}

#[test]
fn flatten_concatenates_in_channel_order() {
    let mut tensor = StateTensor::zeroed();
    tensor.set_channel(Channel::Beliefs, unit_at(0)).unwrap();
    let flat = tensor.flatten();
    assert_eq!(flat.len(), CHANNEL_COUNT * CHANNEL_DIM);
    // Beliefs is channel index 1.
    assert_eq!(flat[CHANNEL_DIM], 1.0);
    assert_eq!(flat[0], 0.0);
}

#[test]
fn weighted_blend_of_identical_tensors_preserves_direction() {
    let tensor = StateTensor::from_channels((0..8).map(unit_at).collect()).unwrap();
    let blended = StateTensor::weighted_blend(&[&tensor, &tensor], &[0.5, 0.5]).unwrap();
    for channel in Channel::ALL {
        let similarity = cosine(blended.channel(channel), tensor.channel(channel));
        assert!((similarity - 1.0).abs() < 1e-5);
        assert!((l2_norm(blended.channel(channel)) - 1.0).abs() < 1e-5);
    }
}

#[test]
fn weighted_blend_rejects_mismatched_weights() {
    let tensor = StateTensor::zeroed();
    assert!(StateTensor::weighted_blend(&[&tensor], &[0.5, 0.5]).is_err());
    assert!(StateTensor::weighted_blend(&[], &[]).is_err());
}

#[test]
fn weighted_blend_keeps_zero_channels_zero() {
    let a = StateTensor::zeroed();
    let b = StateTensor::zeroed();
    let blended = StateTensor::weighted_blend(&[&a, &b], &[0.5, 0.5]).unwrap();
    for channel in Channel::ALL {
        assert!(!blended.is_written(channel));
    }
}

// ===========================================================================
// Trigger
// ===========================================================================

#[test]
fn trigger_user_constructor_and_accessors() {
    let trigger = Trigger::user("hello");
    assert!(trigger.is_user());
    assert_eq!(trigger.label(), "user");
    assert_eq!(trigger.text(), "hello");
}

#[test]
fn trigger_empty_has_no_text() {
    assert_eq!(Trigger::Empty.text(), "");
    assert_eq!(Trigger::Empty.label(), "empty");
    assert!(!Trigger::Empty.is_user());
}

#[test]
fn trigger_from_label_maps_known_kinds() {
    assert!(Trigger::from_label("user", "hi").is_user());
    assert_eq!(
        Trigger::from_label("corpus_excerpt", "quote").label(),
        "corpus_excerpt"
    );
    assert_eq!(
        Trigger::from_label("free_rumination", "musing").label(),
        "free_rumination"
    );
}

#[test]
fn trigger_from_label_degrades_unknown_kinds() {
    assert_eq!(Trigger::from_label("bogus", "").label(), "empty");
    assert_eq!(Trigger::from_label("bogus", "text").label(), "free_rumination");
}

#[test]
fn trigger_serde_is_internally_tagged() {
    let json = serde_json::to_string(&Trigger::user("hi")).unwrap();
    assert!(json.contains(r#""kind":"user""#));
    let back: Trigger = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Trigger::user("hi"));
}

// ===========================================================================
// Impact
// ===========================================================================

fn dummy_report(total: f32) -> conatus_core::types::DissonanceReport {
    conatus_core::types::DissonanceReport {
        total,
        per_channel: [0.0; CHANNEL_COUNT],
        hard_negatives: Vec::new(),
        max_similarity: None,
        is_shock: true,
    }
}

#[test]
fn impact_records_trigger_and_starts_unresolved() {
    let trigger = Trigger::user("shocking");
    let impact = Impact::record(&trigger, 42, dummy_report(0.9));
    assert_eq!(impact.trigger_label, "user");
    assert_eq!(impact.trigger_text, "shocking");
    assert_eq!(impact.state_seq, 42);
    assert!(!impact.resolved);
}

#[test]
fn impact_resolve_flips_flag() {
    let mut impact = Impact::record(&Trigger::Empty, 0, dummy_report(0.8));
    impact.resolve();
    assert!(impact.resolved);
}

#[test]
fn impact_age_in_days() {
    let mut impact = Impact::record(&Trigger::Empty, 0, dummy_report(0.8));
    impact.created_at = Utc::now() - Duration::days(5);
    assert_eq!(impact.age_days(Utc::now()), 5);
}

#[test]
fn verbalize_reason_labels() {
    assert_eq!(VerbalizeReason::ConversationMode.as_str(), "conversation_mode");
    assert_eq!(VerbalizeReason::SilentProcessing.as_str(), "silent_processing");
}

// ===========================================================================
// Config validation
// ===========================================================================

#[test]
fn default_config_validates() {
    Config::default().validate().unwrap();
}

#[test]
fn dissonance_channel_weights_must_sum_to_one() {
    let config = DissonanceConfig {
        channel_weights: [0.3; 8],
        ..DissonanceConfig::default()
    };
    assert!(matches!(
        config.validate().unwrap_err(),
        Error::WeightSum { .. }
    ));
}

#[test]
fn dissonance_band_must_be_ordered() {
    let config = DissonanceConfig {
        band_low: 0.6,
        band_high: 0.3,
        ..DissonanceConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn fixation_method_weights_must_sum_to_one() {
    let config = FixationConfig {
        tenacity_weight: 0.3,
        authority_weight: 0.3,
        apriori_weight: 0.3,
        science_weight: 0.3,
        ..FixationConfig::default()
    };
    assert!(matches!(
        config.validate().unwrap_err(),
        Error::WeightSum { .. }
    ));
}

#[test]
fn fixation_weights_within_tolerance_pass() {
    let config = FixationConfig {
        tenacity_weight: 0.05,
        authority_weight: 0.25,
        apriori_weight: 0.25,
        science_weight: 0.448,
        ..FixationConfig::default()
    };
    config.validate().unwrap();
}

#[test]
fn fixation_delta_max_must_be_positive() {
    let config = FixationConfig {
        delta_max: 0.0,
        ..FixationConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn fixation_anchor_dimension_checked() {
    let config = FixationConfig {
        anchors: vec![AnchorConfig {
            name: "short".to_string(),
            kind: AnchorKind::Pact,
            vector: vec![1.0; 3],
        }],
        ..FixationConfig::default()
    };
    assert!(matches!(
        config.validate().unwrap_err(),
        Error::DimensionMismatch { .. }
    ));
}

#[test]
fn vigilance_alert_history_must_be_positive() {
    let config = VigilanceConfig {
        alert_history: 0,
        ..VigilanceConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn vigilance_critical_multiplier_must_be_at_least_one() {
    let config = VigilanceConfig {
        critical_multiplier: 0.5,
        ..VigilanceConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn daemon_trigger_probabilities_must_sum_to_one() {
    let config = DaemonConfig {
        rumination_probability: 0.5,
        corpus_probability: 0.5,
        free_probability: 0.5,
        ..DaemonConfig::default()
    };
    assert!(matches!(
        config.validate().unwrap_err(),
        Error::WeightSum { .. }
    ));
}

#[test]
fn daemon_intervals_must_be_positive() {
    let config = DaemonConfig {
        autonomous_interval_ms: 0,
        ..DaemonConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn default_trigger_probabilities_are_half_thirty_twenty() {
    let [rumination, corpus, free] = DaemonConfig::default().trigger_probabilities();
    assert!((rumination - 0.5).abs() < 1e-6);
    assert!((corpus - 0.3).abs() < 1e-6);
    assert!((free - 0.2).abs() < 1e-6);
}

#[test]
fn default_method_weights_favor_science() {
    let [tenacity, authority, apriori, science] = FixationConfig::default().method_weights();
    assert!((tenacity - 0.05).abs() < 1e-6);
    assert!((authority - 0.25).abs() < 1e-6);
    assert!((apriori - 0.25).abs() < 1e-6);
    assert!((science - 0.45).abs() < 1e-6);
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_display_includes_detail() {
    let err = Error::weight_sum("fixation.method_weights", 1.2);
    let text = err.to_string();
    assert!(text.contains("fixation.method_weights"));
    assert!(text.contains("1.2"));
}

#[test]
fn boundary_error_names_the_boundary() {
    let err = Error::boundary("embedding", "connection refused");
    assert!(err.to_string().contains("embedding"));
}
