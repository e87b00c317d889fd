//! Identity and capability lookups.
//!
//! Who is a student, reviewer or coordinator is decided by the institution
//! directory; the review services only ask through these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::{DbPool, Principal};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Student,
    Reviewer,
    Coordinator,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Student => "student",
            Capability::Reviewer => "reviewer",
            Capability::Coordinator => "coordinator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKey {
    Id(i64),
    Carnet(String),
}

#[async_trait]
pub trait CapabilityCheck: Send + Sync {
    async fn has_capability(&self, principal_id: i64, capability: Capability) -> Result<bool>;
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve(&self, key: PrincipalKey) -> Result<Option<Principal>>;

    async fn sede_exists(&self, sede_id: i64) -> Result<bool>;
}

/// Directory backed by the `principals`, `principal_capabilities` and `sedes` tables.
#[derive(Clone)]
pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CapabilityCheck for SqlDirectory {
    async fn has_capability(&self, principal_id: i64, capability: Capability) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM principal_capabilities
                WHERE principal_id = ?1 AND capability = ?2
            )
            "#,
        )
        .bind(principal_id)
        .bind(capability.as_str())
        .fetch_one(self.pool.as_ref())
        .await?;
        Ok(found)
    }
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn resolve(&self, key: PrincipalKey) -> Result<Option<Principal>> {
        let query = match &key {
            PrincipalKey::Id(_) => "SELECT id, carnet, full_name, email FROM principals WHERE id = ?1",
            PrincipalKey::Carnet(_) => {
                "SELECT id, carnet, full_name, email FROM principals WHERE carnet = ?1"
            }
        };
        let query = sqlx::query_as::<_, Principal>(query);
        let query = match key {
            PrincipalKey::Id(id) => query.bind(id),
            PrincipalKey::Carnet(carnet) => query.bind(carnet),
        };
        Ok(query.fetch_optional(self.pool.as_ref()).await?)
    }

    async fn sede_exists(&self, sede_id: i64) -> Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sedes WHERE id = ?1)")
            .bind(sede_id)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(found)
    }
}
