// app_state.rs

use std::collections::HashSet;
use std::sync::Arc;

use crate::services::{invitation_service::InviteService, jwt_service::JwtKeys};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Invite lifecycle, shared by every request
    pub invites: Arc<InviteService>,
    /// Keys used to verify bearer tokens
    pub jwt: JwtKeys,
    /// Subjects allowed on the administrative routes
    pub admin_ids: Arc<HashSet<String>>,
    /// Proxy hops trusted when reading `X-Forwarded-For`
    pub trusted_proxy_hops: usize,
}

impl AppState {
    /// Creates a new instance of AppState
    ///
    /// # Arguments
    /// * `invites` - The invite lifecycle service
    /// * `jwt` - Bearer token verification keys
    /// * `admin_ids` - Identities allowed to use `/admin` routes
    pub fn new(invites: Arc<InviteService>, jwt: JwtKeys, admin_ids: HashSet<String>) -> Self {
        Self {
            invites,
            jwt,
            admin_ids: Arc::new(admin_ids),
            trusted_proxy_hops: 0,
        }
    }

    pub fn with_trusted_proxy_hops(mut self, hops: usize) -> Self {
        self.trusted_proxy_hops = hops;
        self
    }

    pub fn is_admin(&self, caller_id: &str) -> bool {
        self.admin_ids.contains(caller_id)
    }
}
