//! Reconciles local key material with the wallet's authoritative grants.

use crate::{
    error::ProviderError,
    store::KeyStore,
    time::{Clock, SystemClock},
    types::{PermissionGrant, SessionKey},
};

/// State of the authoritative grant list at the time of a dispatch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AuthoritativeGrants {
    /// The list has not been fetched yet.
    #[default]
    Loading,
    /// Fetching the list failed.
    Unavailable,
    Loaded(Vec<PermissionGrant>),
}

impl From<Vec<PermissionGrant>> for AuthoritativeGrants {
    fn from(grants: Vec<PermissionGrant>) -> Self {
        Self::Loaded(grants)
    }
}

impl From<Result<Vec<PermissionGrant>, ProviderError>> for AuthoritativeGrants {
    fn from(result: Result<Vec<PermissionGrant>, ProviderError>) -> Self {
        match result {
            Ok(grants) => Self::Loaded(grants),
            Err(err) => {
                debug!(target: "fastpath::resolver", %err, "failed to fetch permission grants");
                Self::Unavailable
            }
        }
    }
}

/// Produces the session keys that are currently usable.
#[derive(Debug)]
pub struct SessionKeyResolver<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: KeyStore> SessionKeyResolver<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: KeyStore, C: Clock> SessionKeyResolver<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Joins `grants` with local material, see [`Self::resolve_at`].
    pub fn resolve(&self, grants: &AuthoritativeGrants) -> Vec<SessionKey> {
        self.resolve_at(grants, self.clock.now())
    }

    /// Returns the unexpired grants at `now`, with local material first, then latest expiry
    /// first.
    ///
    /// Yields nothing unless `grants` is [`AuthoritativeGrants::Loaded`]. A store error for
    /// one key counts as missing material for that key.
    pub fn resolve_at(&self, grants: &AuthoritativeGrants, now: u64) -> Vec<SessionKey> {
        let AuthoritativeGrants::Loaded(grants) = grants else {
            trace!(target: "fastpath::resolver", "authoritative grants not loaded");
            return Vec::new();
        };

        let mut keys: Vec<_> = grants
            .iter()
            .enumerate()
            .filter(|(_, grant)| grant.expiry > now)
            .filter_map(|(index, grant)| {
                let public_key = grant.public_key()?;
                let has_material = self.store.has_material(&public_key).unwrap_or_else(|err| {
                    warn!(target: "fastpath::resolver", %public_key, %err, "failed to read key material");
                    false
                });
                SessionKey::from_grant(grant, index, has_material)
            })
            .collect();

        // stable, so equal keys keep the wallet's order
        keys.sort_by(|a, b| {
            b.has_local_private_key
                .cmp(&a.has_local_private_key)
                .then_with(|| b.expiry.cmp(&a.expiry))
        });
        keys
    }

    /// Resolves `grants` and picks the best usable key.
    pub fn usable_key(&self, grants: &AuthoritativeGrants) -> Option<SessionKey> {
        let now = self.clock.now();
        get_usable_key(&self.resolve_at(grants, now), now).cloned()
    }
}

/// Returns the first key of `keys` that has local material and has not expired at `now`.
pub fn get_usable_key(keys: &[SessionKey], now: u64) -> Option<&SessionKey> {
    keys.iter().find(|key| key.is_usable(now))
}
