//! Creation, revocation and cleanup of session keys.

use crate::{
    error::LifecycleError,
    provider::WalletProvider,
    resolver::SessionKeyResolver,
    signer::generate_key,
    store::KeyStore,
    time::Clock,
    types::{CallScope, KeyRef, KeyType, Period, Scope, SessionKey, SpendScope},
    wallet::{FeeToken, GrantPermissions, WalletClient},
};
use alloy_primitives::Address;
use fastpath_config::GrantConfig;
use std::{collections::HashSet, time::Duration};

/// Request for a new session key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateSessionKey {
    pub key_type: KeyType,
    pub ttl: Duration,
    pub permissions: Scope,
    pub fee_token: Option<FeeToken>,
}

impl TryFrom<&GrantConfig> for CreateSessionKey {
    type Error = LifecycleError;

    /// Builds a request from the `[grant]` section, with the default key type and lifetime.
    fn try_from(config: &GrantConfig) -> Result<Self, Self::Error> {
        let calls = config
            .calls
            .iter()
            .map(|call| CallScope { target: call.to, selector: call.signature.clone() })
            .collect();
        let spend = config
            .spend
            .iter()
            .map(|spend| {
                let period = spend.period.parse::<Period>().map_err(LifecycleError::InvalidGrant)?;
                Ok(SpendScope { token: spend.token, limit: spend.limit, period })
            })
            .collect::<Result<_, LifecycleError>>()?;
        Ok(Self {
            key_type: KeyType::default(),
            ttl: Duration::from_secs(60 * 60),
            permissions: Scope { call_scope: calls, spend_scope: spend },
            fee_token: config
                .fee_token
                .as_ref()
                .map(|fee| FeeToken { symbol: fee.symbol.clone(), limit: fee.limit.clone() }),
        })
    }
}

/// Manages session keys of one account.
#[derive(Debug)]
pub struct Lifecycle<'a, P, S, C> {
    wallet: &'a WalletClient<P>,
    resolver: &'a SessionKeyResolver<S, C>,
    account: Option<Address>,
}

impl<'a, P: WalletProvider, S: KeyStore, C: Clock> Lifecycle<'a, P, S, C> {
    pub const fn new(
        wallet: &'a WalletClient<P>,
        resolver: &'a SessionKeyResolver<S, C>,
        account: Option<Address>,
    ) -> Self {
        Self { wallet, resolver, account }
    }

    /// Active session keys of the account, resolved against local material.
    pub async fn list(&self) -> Result<Vec<SessionKey>, LifecycleError> {
        let grants = self.wallet.get_permissions(self.account).await?;
        Ok(self.resolver.resolve(&grants.into()))
    }

    /// Generates a keypair, stores its material and asks the wallet to grant it.
    ///
    /// The material is removed again if the grant is not issued.
    pub async fn create_session_key(
        &self,
        request: CreateSessionKey,
    ) -> Result<SessionKey, LifecycleError> {
        if request.permissions.call_scope.is_empty() && request.permissions.spend_scope.is_empty()
        {
            return Err(LifecycleError::InvalidGrant("no permissions requested".to_string()));
        }

        let generated = generate_key(request.key_type)?;
        let store = self.resolver.store();
        store.put(&generated.public_key, generated.private_key)?;

        let expiry = self.resolver.now().saturating_add(request.ttl.as_secs());
        let grant = GrantPermissions {
            key: KeyRef { public_key: generated.public_key.clone(), key_type: request.key_type },
            expiry,
            fee_token: request.fee_token,
            permissions: request.permissions.clone(),
        };

        match self.wallet.grant_permissions(&grant).await {
            Ok(granted) => {
                let key = SessionKey::from_grant(&granted, 0, true).unwrap_or_else(|| SessionKey {
                    id: granted.id.clone().unwrap_or_else(|| generated.public_key.clone()),
                    public_key: generated.public_key.clone(),
                    key_type: request.key_type,
                    expiry,
                    scope: request.permissions,
                    has_local_private_key: true,
                });
                debug!(target: "fastpath::lifecycle", id = %key.id, public_key = %key.public_key, expiry, "granted session key");
                Ok(key)
            }
            Err(err) => {
                warn!(target: "fastpath::lifecycle", %err, "grant failed, discarding key material");
                if let Err(remove_err) = store.remove(&generated.public_key) {
                    warn!(target: "fastpath::lifecycle", %remove_err, public_key = %generated.public_key, "failed to discard key material");
                }
                Err(err.into())
            }
        }
    }

    /// Revokes the grant `id` and removes its local material.
    pub async fn revoke_session_key(&self, id: &str) -> Result<SessionKey, LifecycleError> {
        let grants = self.wallet.get_permissions(self.account).await?;
        let key = grants
            .iter()
            .enumerate()
            .filter_map(|(index, grant)| SessionKey::from_grant(grant, index, false))
            .find(|key| key.id == id)
            .ok_or_else(|| LifecycleError::UnknownKey(id.to_string()))?;

        self.wallet.revoke_permissions(id).await?;
        let store = self.resolver.store();
        let had_material = store.has_material(&key.public_key)?;
        store.remove(&key.public_key)?;
        debug!(target: "fastpath::lifecycle", id, had_material, "revoked session key");
        Ok(SessionKey { has_local_private_key: had_material, ..key })
    }

    /// Removes local material that no unexpired grant refers to, returning the removed public
    /// keys.
    ///
    /// Nothing is removed unless the grant list was fetched successfully.
    pub async fn prune_orphans(&self) -> Result<Vec<String>, LifecycleError> {
        let grants = self.wallet.get_permissions(self.account).await?;
        let now = self.resolver.now();
        let active: HashSet<_> = grants
            .iter()
            .filter(|grant| grant.expiry > now)
            .filter_map(|grant| grant.public_key())
            .collect();

        let store = self.resolver.store();
        let mut pruned = Vec::new();
        for public_key in store.public_keys()? {
            if !active.contains(&public_key) {
                store.remove(&public_key)?;
                pruned.push(public_key);
            }
        }
        if !pruned.is_empty() {
            debug!(target: "fastpath::lifecycle", count = pruned.len(), "pruned orphaned key material");
        }
        Ok(pruned)
    }
}
