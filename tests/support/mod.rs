//! In-memory store implementations for exercising the engine without a
//! database.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use shoplens::behavior::event::WeightCurve;
use shoplens::behavior::store::NewBehaviorEvent;
use shoplens::behavior::{BehaviorEvent, BehaviorPayload, BehaviorStore, BehaviorType};
use shoplens::catalog::{CatalogStore, Product};
use shoplens::error::{Error, Result};
use shoplens::preferences::{Preference, PreferenceStore};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Behavior store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBehaviorStore {
    pub events: Mutex<Vec<BehaviorEvent>>,
    pub likes: Mutex<HashSet<(i64, i64)>>,
}

impl MemoryBehaviorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing the recorder (lets tests pick
    /// timestamps and counters).
    pub fn push_raw(&self, event: BehaviorEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn events_of_type(&self, behavior_type: BehaviorType) -> Vec<BehaviorEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.behavior_type == behavior_type)
            .cloned()
            .collect()
    }

    pub fn like_count(&self) -> usize {
        self.likes.lock().unwrap().len()
    }
}

/// Raw event constructor for seeding.
pub fn raw_event(
    user_id: i64,
    product_id: Option<i64>,
    behavior_type: BehaviorType,
    occurrence_count: i32,
    weight: f64,
    created_at: chrono::DateTime<Utc>,
) -> BehaviorEvent {
    BehaviorEvent {
        id: Uuid::new_v4(),
        user_id,
        product_id,
        behavior_type,
        occurrence_count,
        weight,
        payload: None,
        created_at,
        updated_at: created_at,
    }
}

#[async_trait]
impl BehaviorStore for MemoryBehaviorStore {
    async fn upsert_event(
        &self,
        new: NewBehaviorEvent,
        curve: WeightCurve,
    ) -> Result<BehaviorEvent> {
        let mut events = self.events.lock().unwrap();
        let now = Utc::now();

        if let Some(existing) = events.iter_mut().find(|e| {
            e.user_id == new.user_id
                && e.product_id == new.product_id
                && e.behavior_type == new.behavior_type
        }) {
            existing.occurrence_count += 1;
            existing.weight = curve.weight_at(existing.occurrence_count);
            if new.payload.is_some() {
                existing.payload = new.payload;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let event = BehaviorEvent {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            product_id: new.product_id,
            behavior_type: new.behavior_type,
            occurrence_count: 1,
            weight: new.weight,
            payload: new.payload,
            created_at: now,
            updated_at: now,
        };
        events.push(event.clone());
        Ok(event)
    }

    async fn append_event(&self, new: NewBehaviorEvent) -> Result<BehaviorEvent> {
        let now = Utc::now();
        let event = BehaviorEvent {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            product_id: new.product_id,
            behavior_type: new.behavior_type,
            occurrence_count: 1,
            weight: new.weight,
            payload: new.payload,
            created_at: now,
            updated_at: now,
        };
        self.events.lock().unwrap().push(event.clone());
        Ok(event)
    }

    async fn fold_event(
        &self,
        id: Uuid,
        weight: f64,
        payload: Option<BehaviorPayload>,
    ) -> Result<()> {
        let mut events = self.events.lock().unwrap();
        if let Some(event) = events.iter_mut().find(|e| e.id == id) {
            event.occurrence_count += 1;
            event.weight = weight;
            if payload.is_some() {
                event.payload = payload;
            }
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_event(
        &self,
        user_id: i64,
        product_id: i64,
        behavior_type: BehaviorType,
    ) -> Result<bool> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|e| {
            !(e.user_id == user_id
                && e.product_id == Some(product_id)
                && e.behavior_type == behavior_type)
        });
        Ok(events.len() < before)
    }

    async fn recent_events(&self, user_id: i64, limit: usize) -> Result<Vec<BehaviorEvent>> {
        let mut events: Vec<BehaviorEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn recent_events_of_type(
        &self,
        user_id: i64,
        behavior_type: BehaviorType,
        limit: usize,
    ) -> Result<Vec<BehaviorEvent>> {
        let mut events: Vec<BehaviorEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.behavior_type == behavior_type)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn count_events(&self, user_id: i64) -> Result<i64> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .count() as i64)
    }

    async fn insert_like(&self, user_id: i64, product_id: i64) -> Result<bool> {
        Ok(self.likes.lock().unwrap().insert((user_id, product_id)))
    }

    async fn delete_like(&self, user_id: i64, product_id: i64) -> Result<bool> {
        Ok(self.likes.lock().unwrap().remove(&(user_id, product_id)))
    }
}

/// Behavior store where every call fails, for degradation tests.
pub struct FailingBehaviorStore;

#[async_trait]
impl BehaviorStore for FailingBehaviorStore {
    async fn upsert_event(&self, _: NewBehaviorEvent, _: WeightCurve) -> Result<BehaviorEvent> {
        Err(Error::store("behavior store offline"))
    }

    async fn append_event(&self, _: NewBehaviorEvent) -> Result<BehaviorEvent> {
        Err(Error::store("behavior store offline"))
    }

    async fn fold_event(&self, _: Uuid, _: f64, _: Option<BehaviorPayload>) -> Result<()> {
        Err(Error::store("behavior store offline"))
    }

    async fn delete_event(&self, _: i64, _: i64, _: BehaviorType) -> Result<bool> {
        Err(Error::store("behavior store offline"))
    }

    async fn recent_events(&self, _: i64, _: usize) -> Result<Vec<BehaviorEvent>> {
        Err(Error::store("behavior store offline"))
    }

    async fn recent_events_of_type(
        &self,
        _: i64,
        _: BehaviorType,
        _: usize,
    ) -> Result<Vec<BehaviorEvent>> {
        Err(Error::store("behavior store offline"))
    }

    async fn count_events(&self, _: i64) -> Result<i64> {
        Err(Error::store("behavior store offline"))
    }

    async fn insert_like(&self, _: i64, _: i64) -> Result<bool> {
        Err(Error::store("behavior store offline"))
    }

    async fn delete_like(&self, _: i64, _: i64) -> Result<bool> {
        Err(Error::store("behavior store offline"))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct MemoryCatalog {
    pub products: Vec<Product>,
}

impl MemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

/// Product constructor for seeding.
pub fn product(id: i64, name: &str, categories: &[i64], rating: f64) -> Product {
    Product {
        id,
        name: name.to_string(),
        description: String::new(),
        tags: vec![],
        category_ids: categories.to_vec(),
        rating,
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn find_active_products_by_id(&self, ids: &[i64]) -> Result<Vec<Product>> {
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_active_product(&self, id: i64) -> Result<Option<Product>> {
        Ok(self.products.iter().find(|p| p.id == id).cloned())
    }

    async fn find_active_products(&self, limit: usize) -> Result<Vec<Product>> {
        let mut products = self.products.clone();
        products.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        products.truncate(limit);
        Ok(products)
    }

    async fn search_active_products_by_keywords(
        &self,
        keywords: &[String],
        exclude_ids: &[i64],
    ) -> Result<Vec<Product>> {
        Ok(self
            .products
            .iter()
            .filter(|p| !exclude_ids.contains(&p.id))
            .filter(|p| keywords.iter().any(|kw| p.matches_keyword(kw)))
            .cloned()
            .collect())
    }

    async fn find_active_products_by_category(
        &self,
        category_ids: &[i64],
        exclude_ids: &[i64],
        limit: usize,
    ) -> Result<Vec<Product>> {
        let mut out: Vec<Product> = self
            .products
            .iter()
            .filter(|p| !exclude_ids.contains(&p.id))
            .filter(|p| p.category_ids.iter().any(|c| category_ids.contains(c)))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        out.truncate(limit);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryPreferenceStore {
    pub preferences: Mutex<HashMap<i64, Vec<Preference>>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn replace_preferences(&self, user_id: i64, preferences: &[Preference]) -> Result<()> {
        self.preferences
            .lock()
            .unwrap()
            .insert(user_id, preferences.to_vec());
        Ok(())
    }

    async fn preferences_for(&self, user_id: i64) -> Result<Vec<Preference>> {
        Ok(self
            .preferences
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}
