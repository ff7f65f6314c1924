//! End-to-end journeys: one test per core scenario an operator would
//! actually run Katra through, exercised against a real temp-dir-backed
//! store rather than mocks.

use katra_core::memory::{Isolation, RecordType, RememberInput};
use katra_e2e_tests::Harness;

fn remember_input(content: &str) -> RememberInput {
    RememberInput {
        content: content.to_string(),
        record_type: None,
        importance: None,
        response: None,
        context: None,
        component: None,
        tags: vec![],
        emotion_intensity: 0.0,
        emotion_type: None,
        context_question: None,
        context_resolution: None,
        context_uncertainty: None,
        related_to: vec![],
        marked_important: false,
    }
}

#[test]
fn store_and_recall_across_owners() {
    let harness = Harness::new();
    let (mut nyx, nyx_id) = harness.register("Nyx");

    let input = remember_input("prefers terse commit messages");
    harness
        .engine
        .remember(&mut nyx, input, RecordType::Knowledge, Isolation::Public, None)
        .expect("remember failed");

    let (mut echo, _echo_id) = harness.register("Echo");
    let recall = harness
        .engine
        .recall(
            &mut echo,
            "echo-requester",
            katra_core::memory::RecallInput { topic: "commit messages".into(), ..Default::default() },
        )
        .expect("recall failed");

    assert!(recall.records.iter().any(|r| r.owner_id == nyx_id && r.content.contains("terse")));
}

#[test]
fn team_visibility_respects_isolation() {
    let harness = Harness::new();
    let (mut nyx, nyx_id) = harness.register("Nyx");
    let (_echo, echo_id) = harness.register("Echo");
    let (_carol, carol_id) = harness.register("Carol");

    harness.engine.team_create(&nyx_id, "architects").expect("team_create failed");
    harness.engine.team_join(&echo_id, "architects").expect("team_join failed");

    let input = remember_input("the index is authoritative for mutable fields");
    harness
        .engine
        .remember(&mut nyx, input, RecordType::Decision, Isolation::Team, Some("architects".into()))
        .expect("remember failed");

    let recall_filter = katra_core::memory::RecallInput { topic: "authoritative".into(), ..Default::default() };

    let mut echo_session = harness.engine.new_session();
    let member_view = harness
        .engine
        .recall(&mut echo_session, &echo_id, recall_filter.clone())
        .expect("recall failed");
    assert!(member_view.records.iter().any(|r| r.owner_id == nyx_id));

    let mut carol_session = harness.engine.new_session();
    let outsider_view = harness
        .engine
        .recall(&mut carol_session, &carol_id, recall_filter)
        .expect("recall failed");
    assert!(!outsider_view.records.iter().any(|r| r.owner_id == nyx_id));
}

#[test]
fn forget_requires_explicit_consent() {
    let harness = Harness::new();
    let (mut nyx, nyx_id) = harness.register("Nyx");

    let input = remember_input("a record nobody should keep around");
    let outcome = harness
        .engine
        .remember(&mut nyx, input, RecordType::Interaction, Isolation::Private, None)
        .expect("remember failed");
    let record_id = outcome.record.record_id.clone();

    let denied = harness.engine.forget(&nyx_id, &record_id, Some("cleanup"), false);
    assert!(matches!(denied, Err(katra_core::EngineError::ConsentDenied(_))));

    let removed = harness
        .engine
        .forget(&nyx_id, &record_id, Some("cleanup"), true)
        .expect("forget with consent failed");
    assert!(removed);

    let mut session = harness.engine.new_session();
    let recent = harness
        .engine
        .recent(&mut session, &nyx_id, katra_core::engine::RecentFilter::default())
        .expect("recent failed");
    assert!(!recent.records.iter().any(|r| r.record_id == record_id));
}

/// Consolidation runs against real wall-clock time internally, so this
/// drives the store/index/consolidation layers directly (bypassing
/// `Engine::remember`) to backdate records the way a 90-day-old memory
/// would actually look, rather than waiting 90 days in a test.
#[test]
fn consolidation_preserves_important_records() {
    use chrono::{Duration, Utc};
    use katra_core::consolidation::{self, ConsolidationConfig, NoGrouping};
    use katra_core::digest_store::DigestStore;
    use katra_core::hot_tier::HotTier;
    use katra_core::index::Index;
    use katra_core::memory::MemoryRecord;
    use tempfile::TempDir;

    let root = TempDir::new().unwrap();
    let hot_tier = HotTier::open(root.path(), 50 * 1024 * 1024).unwrap();
    let index = Index::open(&root.path().join("index.db")).unwrap();
    let digest_store = DigestStore::open(root.path(), 50 * 1024 * 1024).unwrap();

    let old = Utc::now() - Duration::days(120);
    let make_record = |id: &str, content: &str, marked_important: bool| MemoryRecord {
        record_id: id.to_string(),
        owner_id: "nyx".into(),
        timestamp: old,
        record_type: RecordType::Interaction,
        importance: 0.3,
        content: content.to_string(),
        response: None,
        context: None,
        component: None,
        session_id: None,
        tags: vec![],
        isolation: Isolation::Private,
        team_name: None,
        archived: false,
        archived_at: None,
        archive_reason: None,
        marked_important,
        marked_forgettable: false,
        archived_not_allowed: false,
        last_accessed: old,
        access_count: 0,
        emotion_intensity: 0.0,
        emotion_type: None,
        graph_centrality: 0.0,
        connection_count: 0,
        connected_record_ids: vec![],
        pattern_id: None,
        pattern_frequency: None,
        is_pattern_outlier: false,
        pattern_summary: None,
        semantic_similarity: None,
        context_question: None,
        context_resolution: None,
        context_uncertainty: None,
        related_to: vec![],
    };

    let important = make_record("r-important", "decision the team depends on", true);
    let stale = make_record("r-stale", "small talk nobody needs anymore", false);

    for record in [&important, &stale] {
        hot_tier.store(record).unwrap();
        index.upsert(record).unwrap();
    }

    let report = consolidation::run(
        &hot_tier,
        &index,
        &digest_store,
        &NoGrouping,
        "nyx",
        &ConsolidationConfig { max_age_days: 90, ..ConsolidationConfig::default() },
        Utc::now(),
        false,
    )
    .unwrap();

    assert_eq!(report.records_archived, 1);
    assert!(!index.get("r-important").unwrap().unwrap().archived);
    assert!(index.get("r-stale").unwrap().unwrap().archived);
}
