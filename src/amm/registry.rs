use super::pool::{FeeTo, LiquidityPool, SharedPool};
use crate::error::{ConverterError, Result};
use crate::ledger::Ledger;
use crate::utils::LogicalClock;
use alloy_primitives::Address;
use dashmap::DashMap;
use sha2::digest::Update;
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Canonicalize an unordered pair by ascending asset address.
pub fn sort_pair(asset_a: &Address, asset_b: &Address) -> (Address, Address) {
    if asset_a < asset_b { (*asset_a, *asset_b) } else { (*asset_b, *asset_a) }
}

/// Owns every pool for the process lifetime and maps unordered asset pairs
/// to them. Creation is idempotent: a pair exists at most once regardless of
/// the order its assets are passed in.
pub struct PairRegistry {
    pools: DashMap<(Address, Address), SharedPool>,
    ledger: Arc<Ledger>,
    fee_to: Arc<FeeTo>,
    clock: LogicalClock,
}

impl PairRegistry {
    pub fn new(ledger: Arc<Ledger>, clock: LogicalClock) -> Self {
        PairRegistry { pools: DashMap::new(), ledger, fee_to: Arc::new(FeeTo::default()), clock }
    }

    /// Deterministic ledger account address for a pair: the trailing 20
    /// bytes of sha256 over the canonically ordered asset addresses.
    pub fn pair_address(asset_a: &Address, asset_b: &Address) -> Address {
        let (token0, token1) = sort_pair(asset_a, asset_b);
        let mut hasher = Sha256::new();
        Update::update(&mut hasher, token0.as_slice());
        Update::update(&mut hasher, token1.as_slice());
        let digest: [u8; 32] = hasher.finalize().into();
        Address::from_slice(&digest[12..])
    }

    /// Return the pool for the pair, creating a fresh zero-reserve pool on
    /// first sight. A no-op returning the existing pool when the pair is
    /// already registered.
    pub fn get_or_create(&self, asset_a: &Address, asset_b: &Address) -> Result<SharedPool> {
        if asset_a == asset_b {
            return Err(ConverterError::IdenticalAssets(*asset_a));
        }
        let key = sort_pair(asset_a, asset_b);
        let pool = self
            .pools
            .entry(key)
            .or_insert_with(|| {
                let address = Self::pair_address(&key.0, &key.1);
                info!(pool = %address, token0 = %key.0, token1 = %key.1, "created pair");
                Arc::new(Mutex::new(LiquidityPool::new(
                    address,
                    key.0,
                    key.1,
                    self.ledger.clone(),
                    self.fee_to.clone(),
                    self.clock.clone(),
                )))
            })
            .clone();
        Ok(pool)
    }

    /// Absence is a routable condition, not a fault.
    pub fn lookup(&self, asset_a: &Address, asset_b: &Address) -> Option<SharedPool> {
        self.pools.get(&sort_pair(asset_a, asset_b)).map(|p| p.value().clone())
    }

    pub fn set_fee_to(&self, recipient: Option<Address>) {
        self.fee_to.set(recipient);
    }

    pub fn get_fee_to(&self) -> Option<Address> {
        self.fee_to.get()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}
