//! Property-Based Tests for the Classification Pipeline
//!
//! For any backend response:
//! - every agent in the response lands in exactly one bucket of the snapshot
//! - quartile totals add up to the sum of the response metrics
//! - re-running against an identical response reports no movement and does
//!   not bump the animation generation
//!
//! The published view is also checked to serialize for external observers.

use chrono::{FixedOffset, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use tierboard_core::{ingest, AgentKey};
use tierboard_engine::{FixedClock, Pipeline, PipelineSettings, Trigger};
use tierboard_test_utils::generators::arb_quartile_response;
use tierboard_test_utils::ScriptedBackend;
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn test_pipeline(backend: &Arc<ScriptedBackend>) -> Pipeline {
    let now = Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap();
    let clock = Arc::new(FixedClock::new(now, FixedOffset::west_opt(3 * 3600).unwrap()));
    Pipeline::new(backend.clone(), PipelineSettings::default(), clock)
}

// ============================================================================
// PROPERTY TESTS
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_snapshot_conserves_population(response in arb_quartile_response(40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let backend = Arc::new(ScriptedBackend::new());
            backend.set_quartiles_fallback(Ok(response.clone()));
            let pipeline = test_pipeline(&backend);

            pipeline
                .run(Trigger::initial())
                .await
                .map_err(|e| TestCaseError::fail(format!("Run failed: {}", e)))?;

            let expected = ingest::quartile_records(&response).value;
            let expected_total: u64 = expected.iter().map(|r| r.record.metric_value).sum();
            let expected_agents: BTreeSet<AgentKey> =
                expected.iter().map(|r| r.record.agent_key.clone()).collect();

            let view = pipeline.view();
            let snapshot = view
                .snapshot
                .ok_or_else(|| TestCaseError::fail("No snapshot published"))?;
            let seen: BTreeSet<AgentKey> =
                snapshot.iter().map(|(_, r)| r.agent_key.clone()).collect();

            prop_assert_eq!(snapshot.grand_total(), expected_total);
            prop_assert_eq!(snapshot.total_agents(), expected_agents.len());
            prop_assert_eq!(seen, expected_agents);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_identical_rerun_reports_no_movement(response in arb_quartile_response(40)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let backend = Arc::new(ScriptedBackend::new());
            backend.set_quartiles_fallback(Ok(response));
            let pipeline = test_pipeline(&backend);

            let first = pipeline
                .run(Trigger::initial())
                .await
                .map_err(|e| TestCaseError::fail(format!("First run failed: {}", e)))?;
            let generation = pipeline.view().generation;

            let second = pipeline
                .run(Trigger::poll())
                .await
                .map_err(|e| TestCaseError::fail(format!("Second run failed: {}", e)))?;

            prop_assert!(second.run_id > first.run_id);
            prop_assert!(!second.generation_bumped);
            let view = pipeline.view();
            prop_assert!(view.movements.is_empty());
            prop_assert!(view.highlights.is_empty());
            prop_assert_eq!(view.generation, generation);
            Ok::<(), TestCaseError>(())
        })?;
    }

    #[test]
    fn prop_view_serializes(response in arb_quartile_response(20)) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let backend = Arc::new(ScriptedBackend::new());
            backend.set_quartiles_fallback(Ok(response));
            let pipeline = test_pipeline(&backend);
            pipeline
                .run(Trigger::initial())
                .await
                .map_err(|e| TestCaseError::fail(format!("Run failed: {}", e)))?;

            let json = serde_json::to_value(pipeline.view())
                .map_err(|e| TestCaseError::fail(format!("Serialize failed: {}", e)))?;
            prop_assert_eq!(json["filter"]["query"]["start_date"].as_str(), Some("2025-06-10"));
            prop_assert_eq!(json["filter"]["query"]["fixed_roster_only"].as_bool(), Some(true));
            prop_assert_eq!(json["loading"].as_str(), Some("idle"));
            Ok::<(), TestCaseError>(())
        })?;
    }
}
