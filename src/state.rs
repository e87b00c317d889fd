use crate::db::DbPool;
use crate::review::ReviewServices;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub services: Arc<ReviewServices>,
}
