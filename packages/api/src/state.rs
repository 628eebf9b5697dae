use sqlx::SqlitePool;

use crate::alignment::Alignment;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub alignment: Alignment,
}

impl AppState {
    pub fn new(pool: SqlitePool, alignment: Alignment) -> Self {
        Self { pool, alignment }
    }
}
