use crate::error::{ConverterError, Result};
use crate::token::{Token, TokenWrapper};
use alloy_primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// In-process stand-in for the host environment's fungible-token ledger.
///
/// Balances are exact unsigned integers; a transfer that would underflow the
/// sender fails with [`ConverterError::InsufficientBalance`] and changes
/// nothing. One balance map exists per asset identifier, so no two assets
/// with the same identifier can coexist.
#[derive(Debug, Default)]
pub struct Ledger {
    // asset -> metadata
    assets: DashMap<Address, TokenWrapper>,
    // asset -> account -> balance
    balances: DashMap<Address, DashMap<Address, U256>>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Register asset metadata. Registration is idempotent: a second call for
    /// the same identifier returns the first registration unchanged.
    pub fn register<T: Into<Arc<Token>>>(&self, token: T) -> TokenWrapper {
        let token: TokenWrapper = token.into();
        self.assets.entry(token.get_address()).or_insert(token).clone()
    }

    pub fn get_token(&self, asset: &Address) -> Option<TokenWrapper> {
        self.assets.get(asset).map(|t| t.value().clone())
    }

    /// Display label for an asset: the registered symbol, or the bare address
    /// when the asset was never registered.
    pub fn describe(&self, asset: &Address) -> String {
        self.get_token(asset).map(|t| t.get_symbol()).unwrap_or_else(|| asset.to_string())
    }

    pub fn balance_of(&self, asset: &Address, account: &Address) -> U256 {
        self.balances.get(asset).and_then(|accounts| accounts.get(account).map(|b| *b)).unwrap_or_default()
    }

    /// Credit freshly issued units to an account. This is the external asset
    /// issuer's surface (faucets and test seeding), not part of the
    /// conversion core.
    pub fn deposit(&self, asset: &Address, to: &Address, amount: U256) {
        let accounts = self.balances.entry(*asset).or_default();
        let balance = accounts.get(to).map(|b| *b).unwrap_or_default();
        accounts.insert(*to, balance + amount);
    }

    /// Move `amount` of `asset` between accounts. The per-asset account map
    /// stays locked for the duration of the call, so a transfer is atomic
    /// with respect to other transfers of the same asset.
    pub fn transfer(&self, asset: &Address, from: &Address, to: &Address, amount: U256) -> Result<()> {
        let accounts = self.balances.entry(*asset).or_default();

        let from_balance = accounts.get(from).map(|b| *b).unwrap_or_default();
        if from_balance < amount {
            return Err(ConverterError::InsufficientBalance { asset: *asset, account: *from });
        }
        accounts.insert(*from, from_balance - amount);

        let to_balance = accounts.get(to).map(|b| *b).unwrap_or_default();
        accounts.insert(*to, to_balance + amount);

        debug!(asset = %asset, from = %from, to = %to, amount = %amount, "ledger transfer");
        Ok(())
    }
}
