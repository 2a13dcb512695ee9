//! Decision lifecycle journeys over the public engine surface.

use mama_core::{
    MemoryEngine, Outcome, OutcomeUpdate, Relationship, SaveInput, SuggestOptions,
};
use mama_e2e_tests::harness::{backdate, now_ms, tier3_engine, TestEnv};

const DAY_MS: i64 = 86_400_000;

#[tokio::test]
async fn fresh_chain() {
    let env = tier3_engine().await;

    let first = env
        .engine
        .save(SaveInput::new("auth_strategy", "session_cookies", "baseline").with_confidence(0.5))
        .await
        .unwrap();
    let second = env
        .engine
        .save(SaveInput::new("auth_strategy", "JWT", "stateless scaling").with_confidence(0.7))
        .await
        .unwrap();

    let recall = env.engine.recall("auth_strategy").await.unwrap();
    assert_eq!(recall.chain_length, 2);
    assert_eq!(recall.chain[0].id, second.id);
    assert_eq!(recall.chain[0].decision, "JWT");
    assert_eq!(recall.chain[1].id, first.id);
    assert_eq!(recall.chain[1].decision, "session_cookies");

    // Back-pointer and supersede edge both exist
    assert_eq!(
        recall.chain[1].superseded_by.as_deref(),
        Some(second.id.as_str())
    );
    assert_eq!(
        recall.chain[0].supersedes.as_deref(),
        Some(first.id.as_str())
    );
    let stats = env.engine.stats().await.unwrap();
    assert_eq!(stats.edges_by_type.get("supersedes"), Some(&1));

    // Exactly one current decision for the topic
    assert_eq!(stats.active_decisions, 1);
}

#[tokio::test]
async fn cross_reference_edge() {
    let env = tier3_engine().await;

    let jwt = env
        .engine
        .save(SaveInput::new("auth_strategy", "JWT", "stateless scaling"))
        .await
        .unwrap();
    let rotation = env
        .engine
        .save(SaveInput::new(
            "token_rotation",
            "rotating refresh tokens",
            format!("builds_on: {} and improves token rotation", jwt.id),
        ))
        .await
        .unwrap();

    let graph = rotation.reasoning_graph.expect("edge should be reported");
    assert_eq!(graph.edges_created.len(), 1);
    assert_eq!(graph.edges_created[0].to_id, jwt.id);
    assert_eq!(graph.edges_created[0].relationship, Relationship::BuildsOn);

    // Visible from the JWT side under built_on_by
    let recall = env.engine.recall("auth_strategy").await.unwrap();
    assert_eq!(recall.semantic_edges.built_on_by.len(), 1);
    assert_eq!(recall.semantic_edges.built_on_by[0].other_id, rotation.id);
    assert_eq!(recall.edge_count, 1);
}

#[tokio::test]
async fn graph_expansion() {
    let env = tier3_engine().await;

    let a = env
        .engine
        .save(SaveInput::new("connection_pooling", "pgbouncer in transaction mode", "r"))
        .await
        .unwrap();
    let b = env
        .engine
        .save(SaveInput::new("timeout_budget", "statement timeout of 5s", "r"))
        .await
        .unwrap();
    let link = env
        .engine
        .propose_link(&a.id, &b.id, Relationship::Refines, Some("tightens it".into()))
        .await
        .unwrap();
    env.engine.approve_link(link).await.unwrap();

    let response = env
        .engine
        .suggest("pgbouncer", SuggestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].decision.id, a.id);
    assert_eq!(response.results[0].graph_source, "primary");
    assert_eq!(response.results[1].decision.id, b.id);
    assert_eq!(response.results[1].graph_source, "refines");
    assert!((response.results[1].graph_rank - 0.7).abs() < 1e-9);
    assert_eq!(response.results[1].related_to.as_deref(), Some(a.id.as_str()));
    assert_eq!(response.results[1].edge_reason.as_deref(), Some("tightens it"));
}

#[tokio::test]
async fn outcome_feedback() {
    let env = tier3_engine().await;

    let report = env
        .engine
        .save(
            SaveInput::new("retry_policy", "exponential backoff", "r")
                .with_confidence(0.5)
                .with_session("session-42"),
        )
        .await
        .unwrap();

    let feedback = env
        .engine
        .track_feedback("this doesn't work, tests fail", "session-42")
        .await
        .unwrap()
        .expect("feedback should attach");

    assert_eq!(feedback.decision_id, report.id);
    assert_eq!(feedback.outcome, Outcome::Failed);
    assert!(feedback.duration_days >= 0.0 && feedback.duration_days < 0.01);

    let decision = env.engine.get(&report.id).await.unwrap();
    assert_eq!(decision.outcome, Some(Outcome::Failed));
    assert_eq!(
        decision.failure_reason.as_deref(),
        Some("this doesn't work, tests fail")
    );
    // 0.5 - 0.3, clamped to [0, 1]
    assert!((decision.confidence - 0.2).abs() < 1e-9);

    // Double-marking is a no-op
    let second = env
        .engine
        .track_feedback("works now!", "session-42")
        .await
        .unwrap();
    assert!(second.is_none());
    let decision = env.engine.get(&report.id).await.unwrap();
    assert_eq!(decision.outcome, Some(Outcome::Failed));
}

#[tokio::test]
async fn tier2_fallback() {
    // Vector search disabled from the start: saves succeed without vectors,
    // suggest answers over the keyword fallback
    let env = tier3_engine().await;

    env.engine
        .save(SaveInput::new(
            "deploy_persistence",
            "mount a Railway volume at /data",
            "survives restarts",
        ))
        .await
        .unwrap();
    env.engine
        .save(SaveInput::new("frontend", "svelte", "smaller bundles"))
        .await
        .unwrap();

    let response = env
        .engine
        .suggest("Railway Volume", SuggestOptions::default())
        .await
        .unwrap();

    assert_eq!(response.search_method, "keyword+graph");
    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].decision.topic, "deploy_persistence");
    assert_eq!(response.results[0].similarity, 0.75);

    let stats = env.engine.stats().await.unwrap();
    assert_eq!(stats.embeddings_stored, 0);
    assert!(!stats.vector_search_enabled);
}

#[tokio::test]
async fn recency_override() {
    let env = tier3_engine().await;

    let fresh = env
        .engine
        .save(SaveInput::new("cache_layer_new", "use in-process caching", "r"))
        .await
        .unwrap();
    let stale = env
        .engine
        .save(SaveInput::new("cache_layer_old", "use in-process caching", "r"))
        .await
        .unwrap();

    let now = now_ms();
    backdate(&env, &fresh.id, now - DAY_MS);
    backdate(&env, &stale.id, now - 60 * DAY_MS);

    // Default weights: the newer decision outranks the older
    let with_recency = env
        .engine
        .suggest("in-process caching", SuggestOptions::default())
        .await
        .unwrap();
    let primaries: Vec<_> = with_recency
        .results
        .iter()
        .filter(|r| r.graph_source == "primary")
        .collect();
    assert_eq!(primaries.len(), 2);
    assert_eq!(primaries[0].decision.id, fresh.id);
    assert!(primaries[0].final_score > primaries[1].final_score);

    // Recency disabled: identical similarity, deterministic tie-break
    let run = |options: SuggestOptions| {
        let engine = &env.engine;
        async move { engine.suggest("in-process caching", options).await.unwrap() }
    };
    let first = run(SuggestOptions {
        disable_recency: true,
        ..Default::default()
    })
    .await;
    let second = run(SuggestOptions {
        disable_recency: true,
        ..Default::default()
    })
    .await;

    let order = |r: &mama_core::SuggestResponse| {
        r.results
            .iter()
            .map(|s| s.decision.id.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&first), order(&second));
    assert!(first
        .results
        .iter()
        .all(|r| (r.similarity - 0.75).abs() < 1e-6));
    assert!(
        (first.results[0].final_score - first.results[1].final_score).abs() < 1e-9,
        "recency off: scores tie on similarity"
    );
}

#[tokio::test]
async fn reopen_preserves_state() {
    let env = tier3_engine().await;

    let report = env
        .engine
        .save(SaveInput::new("schema_design", "wide events table", "r"))
        .await
        .unwrap();
    env.engine.close().await.unwrap();

    // Second init on the same database: migrations re-run as a no-op
    let engine = MemoryEngine::new(TestEnv::config(&env.dir));
    engine.init().await.unwrap();

    let decision = engine.get(&report.id).await.unwrap();
    assert_eq!(decision.topic, "schema_design");
    let recall = engine.recall("schema_design").await.unwrap();
    assert_eq!(recall.chain_length, 1);
}

#[tokio::test]
async fn outcome_update_normalizes_and_validates() {
    let env = tier3_engine().await;
    let report = env
        .engine
        .save(SaveInput::new("t", "d", "r"))
        .await
        .unwrap();

    let decision = env
        .engine
        .update_outcome(
            &report.id,
            OutcomeUpdate {
                outcome: "Partial".to_string(),
                failure_reason: None,
                limitation: Some("only under low load".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(decision.outcome, Some(Outcome::Partial));
    assert_eq!(decision.limitation.as_deref(), Some("only under low load"));

    let err = env
        .engine
        .update_outcome(
            "decision_ghost_1700000000000_ab12",
            OutcomeUpdate {
                outcome: "SUCCESS".to_string(),
                failure_reason: None,
                limitation: None,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "DECISION_NOT_FOUND");
}
