//! End-to-end tests of the recommendation pipeline over in-memory stores.

mod support;

use chrono::{Duration, Utc};
use shoplens::behavior::BehaviorType;
use shoplens::config::ScoringConfig;
use shoplens::error::Error;
use shoplens::preferences::{Preference, PreferenceKind, PreferenceStore};
use shoplens::scoring::ranker::POPULAR_PICK_REASON;
use shoplens::scoring::ScoringEngine;
use std::sync::Arc;
use support::{product, raw_event, FailingBehaviorStore, MemoryBehaviorStore, MemoryCatalog, MemoryPreferenceStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("shoplens=debug")
        .with_test_writer()
        .try_init();
}

fn engine_with(
    behaviors: Arc<MemoryBehaviorStore>,
    catalog: MemoryCatalog,
) -> (ScoringEngine, Arc<MemoryPreferenceStore>) {
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let engine = ScoringEngine::new(
        behaviors,
        Arc::clone(&preferences) as Arc<dyn PreferenceStore>,
        Arc::new(catalog),
        ScoringConfig::default(),
    );
    (engine, preferences)
}

#[tokio::test]
async fn test_new_user_gets_popularity_list() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let catalog = MemoryCatalog::new(vec![
        product(1, "Olive Oil", &[], 3.9),
        product(2, "Sourdough Loaf", &[], 4.8),
        product(3, "Basil Pesto", &[], 4.2),
    ]);
    let (engine, _) = engine_with(Arc::clone(&behaviors), catalog);

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    assert!(recs.is_new_user);
    let ids: Vec<i64> = recs.products.iter().map(|p| p.product_id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
    assert!(recs
        .products
        .iter()
        .all(|p| p.reasons == vec![POPULAR_PICK_REASON.to_string()]));
    assert_eq!(recs.reasons, vec![POPULAR_PICK_REASON.to_string()]);
}

#[tokio::test]
async fn test_purchase_surfaces_purchased_product_first() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    behaviors.push_raw(raw_event(
        1,
        Some(5),
        BehaviorType::Purchase,
        1,
        3.5,
        Utc::now() - Duration::hours(2),
    ));
    let catalog = MemoryCatalog::new(vec![
        product(4, "Oat Milk", &[], 4.9),
        product(5, "Espresso Beans", &[], 4.1),
    ]);
    let (engine, _) = engine_with(Arc::clone(&behaviors), catalog);

    let recs = engine.recommendations(1, None, 1).await.unwrap();

    assert!(!recs.is_new_user);
    assert_eq!(recs.products.len(), 1);
    assert_eq!(recs.products[0].product_id, 5);
    assert!(recs.products[0]
        .reasons
        .iter()
        .any(|r| r.contains("purchased")));
}

#[tokio::test]
async fn test_younger_event_outranks_older_equal_event() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let now = Utc::now();
    behaviors.push_raw(raw_event(
        1,
        Some(10),
        BehaviorType::Purchase,
        1,
        3.5,
        now - Duration::days(30),
    ));
    behaviors.push_raw(raw_event(
        1,
        Some(11),
        BehaviorType::Purchase,
        1,
        3.5,
        now - Duration::days(1),
    ));
    let catalog = MemoryCatalog::new(vec![
        product(10, "Aged Cheddar", &[], 4.0),
        product(11, "Fresh Mozzarella", &[], 4.0),
    ]);
    let (engine, _) = engine_with(Arc::clone(&behaviors), catalog);

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    assert_eq!(recs.products[0].product_id, 11);
    assert_eq!(recs.products[1].product_id, 10);
    assert!(recs.products[0].score > recs.products[1].score);
}

#[tokio::test]
async fn test_diversity_bonus_outranks_equal_single_signal() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let at = Utc::now() - Duration::days(1);
    // Product 20: view + add-to-cart summing to the same raw weight as the
    // single view on product 21.
    behaviors.push_raw(raw_event(1, Some(20), BehaviorType::View, 1, 0.8, at));
    behaviors.push_raw(raw_event(1, Some(20), BehaviorType::AddToCart, 1, 3.0, at));
    behaviors.push_raw(raw_event(1, Some(21), BehaviorType::View, 1, 3.8, at));
    let catalog = MemoryCatalog::new(vec![
        product(20, "Trail Mix", &[], 4.0),
        product(21, "Granola Bars", &[], 4.0),
    ]);
    let (engine, _) = engine_with(Arc::clone(&behaviors), catalog);

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    assert_eq!(recs.products[0].product_id, 20);
    let gap = recs.products[0].score - recs.products[1].score;
    // One extra distinct signal type is worth exactly one diversity bonus.
    assert!((gap - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_short_results_backfilled_with_popular_picks() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let now = Utc::now();
    behaviors.push_raw(raw_event(1, Some(1), BehaviorType::Purchase, 1, 3.5, now));
    behaviors.push_raw(raw_event(1, Some(2), BehaviorType::View, 1, 0.8, now));
    let products: Vec<_> = (1..=12)
        .map(|id| product(id, &format!("Pantry Item {id}"), &[], 5.0 - id as f64 * 0.1))
        .collect();
    let (engine, _) = engine_with(Arc::clone(&behaviors), MemoryCatalog::new(products));

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    assert_eq!(recs.products.len(), 10);
    let backfilled = recs
        .products
        .iter()
        .filter(|p| p.reasons.iter().any(|r| r == POPULAR_PICK_REASON))
        .count();
    assert_eq!(backfilled, 8);

    let mut ids: Vec<i64> = recs.products.iter().map(|p| p.product_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_store_failure_degrades_to_popularity_list() {
    init_tracing();
    let preferences = Arc::new(MemoryPreferenceStore::new());
    let catalog = MemoryCatalog::new(vec![
        product(1, "Olive Oil", &[], 3.9),
        product(2, "Sourdough Loaf", &[], 4.8),
        product(3, "Basil Pesto", &[], 4.2),
    ]);
    let engine = ScoringEngine::new(
        Arc::new(FailingBehaviorStore),
        preferences,
        Arc::new(catalog),
        ScoringConfig::default(),
    );

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    assert_eq!(recs.products.len(), 3);
    assert!(recs
        .products
        .iter()
        .all(|p| p.reasons == vec![POPULAR_PICK_REASON.to_string()]));
}

#[tokio::test]
async fn test_rejects_missing_user() {
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let (engine, _) = engine_with(behaviors, MemoryCatalog::new(vec![]));

    let err = engine.recommendations(0, None, 10).await.unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
}

#[tokio::test]
async fn test_zero_limit_returns_empty() {
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    let (engine, _) = engine_with(behaviors, MemoryCatalog::new(vec![]));

    let recs = engine.recommendations(1, None, 0).await.unwrap();
    assert!(recs.products.is_empty());
    assert!(!recs.is_new_user);
}

#[tokio::test]
async fn test_stated_favorite_category_seeds_candidates() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    behaviors.push_raw(raw_event(
        1,
        Some(1),
        BehaviorType::View,
        1,
        0.8,
        Utc::now(),
    ));
    let catalog = MemoryCatalog::new(vec![
        product(1, "Olive Oil", &[], 3.9),
        product(2, "Ceylon Tea", &[7], 4.6),
        product(3, "Matcha Powder", &[7], 4.3),
    ]);
    let (engine, preferences) = engine_with(Arc::clone(&behaviors), catalog);
    preferences
        .replace_preferences(
            1,
            &[Preference {
                user_id: 1,
                kind: PreferenceKind::FavoriteCategory,
                value: "7".to_string(),
                weight: 1.0,
            }],
        )
        .await
        .unwrap();

    let recs = engine.recommendations(1, None, 10).await.unwrap();

    for id in [2, 3] {
        let entry = recs
            .products
            .iter()
            .find(|p| p.product_id == id)
            .unwrap_or_else(|| panic!("product {id} missing from expansion"));
        assert!(entry
            .reasons
            .iter()
            .any(|r| r == "fits your stated tastes"));
    }
}

#[tokio::test]
async fn test_query_expansion_surfaces_matching_products() {
    init_tracing();
    let behaviors = Arc::new(MemoryBehaviorStore::new());
    behaviors.push_raw(raw_event(
        1,
        Some(1),
        BehaviorType::View,
        1,
        0.8,
        Utc::now(),
    ));
    let catalog = MemoryCatalog::new(vec![
        product(1, "Olive Oil", &[], 3.9),
        product(4, "Dark Chocolate Bar", &[], 4.4),
    ]);
    let (engine, _) = engine_with(Arc::clone(&behaviors), catalog);

    let recs = engine
        .recommendations(1, Some("chocolate"), 10)
        .await
        .unwrap();

    let entry = recs
        .products
        .iter()
        .find(|p| p.product_id == 4)
        .expect("query match missing");
    assert!(entry.reasons.iter().any(|r| r == "matches your request"));
    // Seed: base plus one matched keyword.
    assert!((entry.score - 0.5).abs() < 1e-9);
}
