//! Shared fixtures: an in-memory community service and RS256 test keys.
#![allow(dead_code)]

use community_service::db::{InMemoryContentStore, InMemoryProfiles, Profile};
use community_service::domain::Role;
use community_service::middleware::{AuthorizationResolver, Caller, ModerationPolicy};
use community_service::realtime::BroadcastNotifier;
use community_service::services::{CommunityService, PostNormalizer, ServiceSettings};
use crypto_core::{TokenIssuer, TokenVerifier};
use std::sync::Arc;
use uuid::Uuid;

pub const PRIVATE_KEY: &str =
    include_str!("../../../libs/crypto-core/testdata/test_rsa_private.pem");
pub const PUBLIC_KEY: &str = include_str!("../../../libs/crypto-core/testdata/test_rsa_public.pem");

pub struct Harness {
    pub service: Arc<CommunityService>,
    pub store: Arc<InMemoryContentStore>,
    pub profiles: Arc<InMemoryProfiles>,
    pub hub: Arc<BroadcastNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(ModerationPolicy::default())
    }

    pub fn with_policy(policy: ModerationPolicy) -> Self {
        Self::with(policy, ServiceSettings::default())
    }

    pub fn with(policy: ModerationPolicy, settings: ServiceSettings) -> Self {
        let store = Arc::new(InMemoryContentStore::new());
        let profiles = Arc::new(InMemoryProfiles::new());
        let hub = Arc::new(BroadcastNotifier::new(64));

        let service = Arc::new(CommunityService::new(
            store.clone(),
            PostNormalizer::new(profiles.clone()),
            AuthorizationResolver::new(policy),
            hub.clone(),
            settings,
        ));

        Self {
            service,
            store,
            profiles,
            hub,
        }
    }

    /// Register a profile and return a caller for it.
    pub fn user(&self, name: &str, role: Role) -> Caller {
        let identity = Uuid::new_v4();
        self.profiles.upsert(Profile {
            identity,
            display_name: Some(name.to_string()),
            avatar_url: Some(format!("/avatars/{name}.png")),
            role: Some(role.label().to_string()),
        });
        Caller::new(identity, role)
    }
}

pub fn keys() -> (TokenIssuer, Arc<TokenVerifier>) {
    (
        TokenIssuer::from_rsa_pem(PRIVATE_KEY).expect("test private key"),
        Arc::new(TokenVerifier::from_rsa_pem(PUBLIC_KEY).expect("test public key")),
    )
}
