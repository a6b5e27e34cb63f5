/// Profile Lookup collaborator
///
/// Display profiles are owned by the identity side; this service only reads
/// them. A missing profile is a normal outcome (`Ok(None)`), not an error.
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub identity: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Raw role string
    pub role: Option<String>,
}

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn get_profile(&self, identity: Uuid) -> Result<Option<Profile>, StoreError>;
}

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileLookup for PgProfileRepository {
    async fn get_profile(&self, identity: Uuid) -> Result<Option<Profile>, StoreError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT identity, display_name, avatar_url, role
            FROM community_profiles
            WHERE identity = $1
            "#,
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}

/// Profiles held in memory; used with the in-memory content store.
#[derive(Default)]
pub struct InMemoryProfiles {
    profiles: DashMap<Uuid, Profile>,
}

impl InMemoryProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, profile: Profile) {
        self.profiles.insert(profile.identity, profile);
    }

    pub fn remove(&self, identity: &Uuid) {
        self.profiles.remove(identity);
    }
}

#[async_trait]
impl ProfileLookup for InMemoryProfiles {
    async fn get_profile(&self, identity: Uuid) -> Result<Option<Profile>, StoreError> {
        Ok(self.profiles.get(&identity).map(|p| p.value().clone()))
    }
}
