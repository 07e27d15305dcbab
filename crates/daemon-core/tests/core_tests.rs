//! Tests for daemon-core: tiers, records, classification results, modes, errors

use daemon_core::*;

// ===========================================================================
// Tier / TierTag
// ===========================================================================

#[test]
fn tier_tags_match_memory_file_keys() {
    assert_eq!(Tier::Vital.as_str(), "vital");
    assert_eq!(Tier::LongTerm.as_str(), "long_term");
    assert_eq!(Tier::ShortTerm.as_str(), "short_term");
    for tier in Tier::ALL {
        assert_eq!(Tier::from_tag(tier.as_str()), Some(tier));
    }
}

#[test]
fn tier_serde_uses_snake_case() {
    let json = serde_json::to_string(&Tier::LongTerm).unwrap();
    assert_eq!(json, r#""long_term""#);
    let back: Tier = serde_json::from_str(r#""short_term""#).unwrap();
    assert_eq!(back, Tier::ShortTerm);
}

#[test]
fn tier_from_tag_rejects_unknown() {
    assert_eq!(Tier::from_tag("eternal"), None);
    assert_eq!(Tier::from_tag("Vital"), None);
    assert_eq!(Tier::from_tag(""), None);
}

#[test]
fn tier_tag_unrecognized_resolves_to_short_term() {
    let tag = TierTag::parse("eternal");
    assert_eq!(tag, TierTag::Unrecognized("eternal".into()));
    assert_eq!(tag.resolve(), Tier::ShortTerm);
}

#[test]
fn tier_tag_known_resolves_to_itself() {
    assert_eq!(TierTag::parse("vital").resolve(), Tier::Vital);
    assert_eq!(TierTag::from(Tier::LongTerm).resolve(), Tier::LongTerm);
}

// ===========================================================================
// MemoryRecord
// ===========================================================================

#[test]
fn memory_record_new_generates_unique_ids() {
    let a = MemoryRecord::new("event a", "label_a");
    let b = MemoryRecord::new("event a", "label_a");
    assert_ne!(a.id, b.id);
    assert!(uuid::Uuid::parse_str(&a.id).is_ok());
}

#[test]
fn memory_record_wire_field_names() {
    let record = MemoryRecord::new("The Architect said hello", "first_contact");
    let value = serde_json::to_value(&record).unwrap();
    let obj = value.as_object().unwrap();
    assert_eq!(obj.len(), 4);
    assert_eq!(obj["id"], record.id.as_str());
    assert_eq!(obj["event"], "The Architect said hello");
    assert_eq!(obj["mnemonic"], "first_contact");
    assert!(obj["timestamp"].as_str().unwrap().contains('T'));
}

#[test]
fn memory_record_accepts_legacy_uid_field() {
    let json = r#"{
        "uid": "5f1c1d9e-1111-4222-8333-444455556666",
        "event": "old event",
        "mnemonic": "old_label",
        "timestamp": "2025-06-01T12:00:00Z"
    }"#;
    let record: MemoryRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record.id, "5f1c1d9e-1111-4222-8333-444455556666");
    assert_eq!(record.label, "old_label");
}

#[test]
fn memory_record_timestamp_survives_serialization() {
    let record = MemoryRecord::new("e", "l");
    let json = serde_json::to_string(&record).unwrap();
    let back: MemoryRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(back, record);
}

// ===========================================================================
// FallbackReason / ClassificationResult
// ===========================================================================

#[test]
fn fallback_labels_are_diagnostic() {
    assert_eq!(FallbackReason::ServiceError.label(), "error");
    assert_eq!(FallbackReason::EmptyResponse.label(), "empty_llm_response");
    assert_eq!(FallbackReason::JsonDecode.label(), "json_decode_error");
    assert_eq!(
        FallbackReason::InvalidStructure.label(),
        "invalid_response_structure"
    );
}

#[test]
fn fallback_result_is_short_term_and_not_urgent() {
    let result = ClassificationResult::fallback(FallbackReason::JsonDecode);
    assert_eq!(result.tier.resolve(), Tier::ShortTerm);
    assert_eq!(result.label, "json_decode_error");
    assert!(!result.urgent);
    assert!(result.is_fallback());
}

// ===========================================================================
// DaemonMode
// ===========================================================================

#[test]
fn daemon_mode_defaults_to_idle() {
    assert_eq!(DaemonMode::default(), DaemonMode::Idle);
}

#[test]
fn daemon_mode_display() {
    assert_eq!(DaemonMode::SelfReflecting.to_string(), "self-reflecting");
    assert_eq!(DaemonMode::Evolving.to_string(), "evolving");
}

// ===========================================================================
// Error
// ===========================================================================

#[test]
fn error_constructors_format() {
    let err = Error::cognition("openrouter", "timeout");
    assert_eq!(err.to_string(), "cognition error: openrouter - timeout");
    let err = Error::config("bad provider");
    assert_eq!(err.to_string(), "config error: bad provider");
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
    let err: Error = io.into();
    assert!(matches!(err, Error::IoError(_)));
}
