//! Stated user preferences
//!
//! Explicit preferences (dietary, taste, price range) sit beside the implicit
//! behavior signal and are merged at read time: stated favorite categories
//! seed the category-affinity expansion. Updates use replace semantics — each
//! save deletes the user's rows wholesale and inserts the new set.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

/// Kinds of stated preference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceKind {
    Dietary,
    Allergen,
    FavoriteCategory,
    SpicyLevel,
    PriceRange,
    Other,
}

impl PreferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKind::Dietary => "dietary",
            PreferenceKind::Allergen => "allergen",
            PreferenceKind::FavoriteCategory => "favorite_category",
            PreferenceKind::SpicyLevel => "spicy_level",
            PreferenceKind::PriceRange => "price_range",
            PreferenceKind::Other => "other",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "dietary" => PreferenceKind::Dietary,
            "allergen" => PreferenceKind::Allergen,
            "favorite_category" => PreferenceKind::FavoriteCategory,
            "spicy_level" => PreferenceKind::SpicyLevel,
            "price_range" => PreferenceKind::PriceRange,
            _ => PreferenceKind::Other,
        }
    }
}

/// One stated preference row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub user_id: i64,
    pub kind: PreferenceKind,
    pub value: String,
    pub weight: f64,
}

impl Preference {
    /// Stated favorite categories carry their target category id in `value`.
    pub fn category_id(&self) -> Option<i64> {
        if self.kind == PreferenceKind::FavoriteCategory {
            self.value.parse().ok()
        } else {
            None
        }
    }
}

/// Storage capability for stated preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Replace the user's preference set wholesale, in one transaction.
    async fn replace_preferences(&self, user_id: i64, preferences: &[Preference]) -> Result<()>;

    /// All stated preferences for the user.
    async fn preferences_for(&self, user_id: i64) -> Result<Vec<Preference>>;
}

/// Postgres-backed preference store.
#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreferenceRow {
    user_id: i64,
    preference_type: String,
    value: String,
    weight: f64,
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn replace_preferences(&self, user_id: i64, preferences: &[Preference]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM preferences WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        for pref in preferences {
            sqlx::query(
                r#"
                INSERT INTO preferences (id, user_id, preference_type, value, weight, created_at)
                VALUES (gen_random_uuid(), $1, $2, $3, $4, NOW())
                "#,
            )
            .bind(user_id)
            .bind(pref.kind.as_str())
            .bind(&pref.value)
            .bind(pref.weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(user_id, count = preferences.len(), "replaced preferences");
        Ok(())
    }

    async fn preferences_for(&self, user_id: i64) -> Result<Vec<Preference>> {
        let rows = sqlx::query_as::<_, PreferenceRow>(
            r#"
            SELECT user_id, preference_type, value, weight
            FROM preferences
            WHERE user_id = $1
            ORDER BY preference_type, value
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Preference {
                user_id: row.user_id,
                kind: PreferenceKind::parse(&row.preference_type),
                value: row.value,
                weight: row.weight,
            })
            .collect())
    }
}
