use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, Settings};
use crate::db::{self, DbPool};
use crate::error::Result;
use crate::rights::RightsClock;

/// Process-wide conference state: the pool, policy settings, the
/// topic/option/decision catalogs, and the rights clock.
#[derive(Clone)]
pub struct Conference {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub settings: Settings,
    /// topic id -> name
    pub topics: HashMap<i64, String>,
    /// option id -> key
    pub options: HashMap<i64, String>,
    /// outcome code -> decision name
    pub decisions: HashMap<i32, String>,
    pub clock: Arc<RightsClock>,
}

impl Conference {
    pub async fn load(pool: DbPool, config: Arc<Config>) -> Result<Self> {
        let settings = db::load_settings(&pool).await?;
        let topics = db::load_topic_catalog(&pool).await?;
        let options = db::load_option_catalog(&pool).await?;
        let decisions = db::load_decision_catalog(&pool).await?;
        Ok(Conference {
            pool,
            config,
            settings,
            topics,
            options,
            decisions,
            clock: RightsClock::new(),
        })
    }
}
