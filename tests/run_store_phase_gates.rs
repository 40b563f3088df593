//! Phase-dependency gating, exercised against the public RunStore API.

use brandkernel_core::models::{BrandAnalysis, CompetitorAnalysis, CompetitorCandidate, EvidenceValidation};
use brandkernel_core::run_store::RunStore;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::Arc;

fn store() -> RunStore {
    let conn = Connection::open_in_memory().unwrap();
    RunStore::new(Arc::new(Mutex::new(conn)), 7).unwrap()
}

fn sample_brand() -> BrandAnalysis {
    BrandAnalysis {
        brand_name: "Acme".to_string(),
        domain: "acme.example".to_string(),
        tagline: "Built to last".to_string(),
        category: "hardware".to_string(),
        value_propositions: vec!["durable".to_string()],
        target_audience: "builders".to_string(),
        positioning: "premium".to_string(),
        key_features: vec!["warranty".to_string()],
        summary: "A durable goods brand.".to_string(),
        evidence_refs: vec![],
        reported_confidence: 0.9,
        evidence: EvidenceValidation::default(),
    }
}

fn sample_candidate() -> CompetitorCandidate {
    CompetitorCandidate {
        name: "Rival".to_string(),
        domain: "rival.example".to_string(),
        confidence: 0.7,
        rationale: "same category".to_string(),
    }
}

fn sample_analysis() -> CompetitorAnalysis {
    CompetitorAnalysis {
        base: BrandAnalysis {
            brand_name: "Rival".to_string(),
            domain: "rival.example".to_string(),
            ..sample_brand()
        },
        pricing_approach: "subscription".to_string(),
        strengths: vec![],
        weaknesses: vec![],
        differentiation: "cheaper".to_string(),
    }
}

#[test]
fn competitors_phase_requires_brand() {
    let store = store();
    let run = store.create(serde_json::json!({})).unwrap();

    let err = store.save_competitors(&run.run_id, &[sample_candidate()]).unwrap_err();
    assert_eq!(err.code(), "UPSTREAM_ARTIFACT_MISSING");

    store.save_brand(&run.run_id, &sample_brand()).unwrap();
    store.save_competitors(&run.run_id, &[sample_candidate()]).unwrap();
}

#[test]
fn analyze_phase_requires_competitors_ten() {
    let store = store();
    let run = store.create(serde_json::json!({})).unwrap();
    store.save_brand(&run.run_id, &sample_brand()).unwrap();

    let err = store.save_analyzed(&run.run_id, &[sample_analysis()]).unwrap_err();
    assert_eq!(err.code(), "UPSTREAM_ARTIFACT_MISSING");

    store.save_competitors(&run.run_id, &[sample_candidate()]).unwrap();
    store.save_analyzed(&run.run_id, &[sample_analysis()]).unwrap();
}

#[test]
fn kernel_phase_requires_brand_and_analyzed_competitors() {
    let store = store();
    let run = store.create(serde_json::json!({})).unwrap();
    store.save_brand(&run.run_id, &sample_brand()).unwrap();
    store.save_competitors(&run.run_id, &[sample_candidate()]).unwrap();

    let err = store
        .save_kernel(&run.run_id, &brandkernel_core::models::Kernel {
            keyword_map: brandkernel_core::models::KeywordMap {
                brand_unique: vec![],
                shared: vec![],
                white_space: vec![],
            },
            gap_map: vec![],
            insights: brandkernel_core::models::Insights {
                strengths: vec![],
                opportunities: vec![],
                risks: vec![],
            },
            recommendations: vec![],
        })
        .unwrap_err();
    assert_eq!(err.code(), "UPSTREAM_ARTIFACT_MISSING");

    store.save_analyzed(&run.run_id, &[sample_analysis()]).unwrap();
    // Now both prerequisites are satisfied; the same save_kernel call should succeed.
    let kernel = brandkernel_core::models::Kernel {
        keyword_map: brandkernel_core::models::KeywordMap {
            brand_unique: vec![],
            shared: vec![],
            white_space: vec![],
        },
        gap_map: vec![],
        insights: brandkernel_core::models::Insights {
            strengths: vec![],
            opportunities: vec![],
            risks: vec![],
        },
        recommendations: vec![],
    };
    store.save_kernel(&run.run_id, &kernel).unwrap();
}

#[test]
fn expired_run_is_invisible_to_get() {
    let conn = Connection::open_in_memory().unwrap();
    // Negative expiration: every run created against this store is already expired.
    let store = RunStore::new(Arc::new(Mutex::new(conn)), -1).unwrap();
    let run = store.create(serde_json::json!({})).unwrap();
    assert!(store.get(&run.run_id).unwrap().is_none());
}
