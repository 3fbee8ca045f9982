// repositories/cafe_repository.rs

use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::HashMap;

use super::invitation_repository::StoreError;
use crate::models::cafe::Cafe;

/// Read-only venue lookup used to enrich notification mails.
#[async_trait]
pub trait CafeDirectory: Send + Sync {
    async fn find(&self, id: &str) -> Result<Option<Cafe>, StoreError>;
}

pub struct PgCafeDirectory {
    pool: Pool,
}

impl PgCafeDirectory {
    pub fn new(pool: Pool) -> Self {
        PgCafeDirectory { pool }
    }
}

#[async_trait]
impl CafeDirectory for PgCafeDirectory {
    async fn find(&self, id: &str) -> Result<Option<Cafe>, StoreError> {
        let query = "SELECT id, name, address, city FROM cafes WHERE id = $1";
        let client = self.pool.get().await?;
        let row = client.query_opt(query, &[&id]).await?;

        match row {
            Some(row) => Ok(Some(Cafe {
                id: row.try_get(0)?,
                name: row.try_get(1)?,
                address: row.try_get(2)?,
                city: row.try_get(3)?,
            })),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct MemoryCafeDirectory {
    cafes: HashMap<String, Cafe>,
}

impl MemoryCafeDirectory {
    pub fn new(cafes: impl IntoIterator<Item = Cafe>) -> Self {
        Self {
            cafes: cafes.into_iter().map(|cafe| (cafe.id.clone(), cafe)).collect(),
        }
    }
}

#[async_trait]
impl CafeDirectory for MemoryCafeDirectory {
    async fn find(&self, id: &str) -> Result<Option<Cafe>, StoreError> {
        Ok(self.cafes.get(id).cloned())
    }
}
