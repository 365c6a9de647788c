//! Configuration management for the ShopLens engine
//!
//! Provides strongly-typed configuration with validation, environment variable
//! parsing, and sensible defaults. The scoring heuristics live in
//! [`ScoringConfig`], an immutable value injected into the engine so tests can
//! substitute alternate weight profiles deterministically.
//!
//! # Example
//! ```no_run
//! use shoplens::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("pool size: {}", config.database.max_connections);
//! ```

use crate::behavior::event::BehaviorType;
use crate::error::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Scoring heuristics
    pub scoring: ScoringConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Enable statement caching
    pub statement_cache_size: usize,
}

/// Base weight assigned to the first occurrence of each behavior type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseWeights {
    pub view: f64,
    pub like: f64,
    pub add_to_cart: f64,
    pub purchase: f64,
    pub review: f64,
    pub search: f64,
    pub click_category: f64,
}

impl BaseWeights {
    /// Weight for a single behavior type.
    pub fn for_type(&self, behavior_type: BehaviorType) -> f64 {
        match behavior_type {
            BehaviorType::View => self.view,
            BehaviorType::Like => self.like,
            BehaviorType::AddToCart => self.add_to_cart,
            BehaviorType::Purchase => self.purchase,
            BehaviorType::Review => self.review,
            BehaviorType::Search => self.search,
            BehaviorType::ClickCategory => self.click_category,
        }
    }
}

impl Default for BaseWeights {
    fn default() -> Self {
        Self {
            view: 0.8,
            like: 1.5,
            add_to_cart: 3.0,
            purchase: 3.5,
            review: 2.0,
            search: 0.4,
            click_category: 0.4,
        }
    }
}

/// Scoring engine heuristics.
///
/// Every tunable constant of the pipeline lives here as a named value. The
/// similarity threshold and the decay divisor in particular are heuristics
/// without a documented derivation; they are kept overridable rather than
/// inlined.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Per-type base weights
    pub base_weights: BaseWeights,
    /// Divisor of the exponential recency decay, in days (half-life ~7 days)
    pub recency_decay_days: f64,
    /// Keyword-overlap similarity above which two searches fold into one event
    pub search_similarity_threshold: f64,
    /// How many recent search events to compare against when deduplicating
    pub search_dedup_window: usize,
    /// How many recent behavior rows feed the accumulator
    pub recent_event_window: usize,
    /// Score added per distinct interaction type on a product
    pub diversity_bonus: f64,
    /// Score gap under which recency breaks near-ties
    pub tie_break_window: f64,
    /// Share of a product's score credited to each of its categories
    pub category_affinity_share: f64,
    /// How many top categories to expand
    pub top_category_count: usize,
    /// Maximum products pulled in per category expansion
    pub category_expansion_limit: usize,
    /// Seed score unit for category-expansion candidates
    pub category_seed_score: f64,
    /// Seed weight multiplier for stated favorite-category preferences
    pub stated_category_seed: f64,
    /// Base seed score for query-expansion candidates
    pub keyword_seed_base: f64,
    /// Seed score added per matched keyword
    pub keyword_seed_per_match: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_weights: BaseWeights::default(),
            recency_decay_days: 10.0,
            search_similarity_threshold: 0.8,
            search_dedup_window: 3,
            recent_event_window: 50,
            diversity_bonus: 0.2,
            tie_break_window: 0.2,
            category_affinity_share: 0.5,
            top_category_count: 3,
            category_expansion_limit: 5,
            category_seed_score: 0.3,
            stated_category_seed: 1.0,
            keyword_seed_base: 0.3,
            keyword_seed_per_match: 0.2,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Try to load .env file (ignore if not found)
        dotenvy::dotenv().ok();

        let config = Self {
            database: DatabaseConfig::from_env()?,
            scoring: ScoringConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(Error::InvalidConfig {
                key: "DATABASE_URL",
                message: "Database URL cannot be empty".into(),
            });
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.scoring.search_similarity_threshold) {
            return Err(Error::InvalidConfig {
                key: "SEARCH_SIMILARITY_THRESHOLD",
                message: "similarity threshold must be within 0.0..=1.0".into(),
            });
        }

        if self.scoring.recency_decay_days <= 0.0 {
            return Err(Error::InvalidConfig {
                key: "RECENCY_DECAY_DAYS",
                message: "decay divisor must be positive".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  Scoring:");
        info!(
            "    Recency decay: {} days, similarity threshold: {}",
            self.scoring.recency_decay_days, self.scoring.search_similarity_threshold
        );
        info!(
            "    Event window: {}, diversity bonus: {}",
            self.scoring.recent_event_window, self.scoring.diversity_bonus
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/shoplens_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "5").parse().unwrap_or(5),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
        })
    }
}

impl ScoringConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            recency_decay_days: get_env_or("RECENCY_DECAY_DAYS", "10.0")
                .parse()
                .unwrap_or(defaults.recency_decay_days),
            search_similarity_threshold: get_env_or("SEARCH_SIMILARITY_THRESHOLD", "0.8")
                .parse()
                .unwrap_or(defaults.search_similarity_threshold),
            recent_event_window: get_env_or("RECENT_EVENT_WINDOW", "50")
                .parse()
                .unwrap_or(defaults.recent_event_window),
            ..defaults
        })
    }
}

/// Get required environment variable
fn get_env(var: &'static str) -> Result<String> {
    std::env::var(var).map_err(|_| Error::Config {
        message: format!("Missing required environment variable: {}", var).into(),
    })
}

/// Get environment variable with default
fn get_env_or(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}
