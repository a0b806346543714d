use super::router::{BridgeRouter, ConversionRoute};
use crate::amm::{PairRegistry, SharedPool, math, sort_pair};
use crate::error::{ConverterError, Result};
use crate::ledger::Ledger;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Record of one completed conversion. Informational only; the ledger
/// transfer to the sink is the correctness-bearing effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub asset0: Address,
    pub asset1: Address,
    pub amount_converted: U256,
    pub recipient: Address,
}

/// Orchestrates the fee harvest for one pair: burn the engine's LP shares
/// back into the underlying assets, route each recovered asset to the
/// target asset, and forward the proceeds to the reward sink.
///
/// The engine is a pure orchestrator over registry and pool state; between
/// calls it holds nothing but its own ledger account, the target asset, and
/// the sink address. `convert` is permissionless and settles fully before
/// returning.
pub struct ConversionEngine {
    address: Address,
    target_asset: Address,
    reward_sink: Mutex<Address>,
    registry: Arc<PairRegistry>,
    router: Arc<BridgeRouter>,
    ledger: Arc<Ledger>,
}

impl ConversionEngine {
    pub fn new(
        address: Address,
        target_asset: Address,
        reward_sink: Address,
        registry: Arc<PairRegistry>,
        router: Arc<BridgeRouter>,
        ledger: Arc<Ledger>,
    ) -> Self {
        ConversionEngine {
            address,
            target_asset,
            reward_sink: Mutex::new(reward_sink),
            registry,
            router,
            ledger,
        }
    }

    pub fn get_address(&self) -> Address {
        self.address
    }

    pub fn get_target_asset(&self) -> Address {
        self.target_asset
    }

    pub fn get_reward_sink(&self) -> Address {
        *self.reward_sink.lock().expect("reward_sink mutex poisoned")
    }

    // Reachable only through the delay gate's execute dispatch.
    pub(crate) fn set_reward_sink(&self, sink: Address) {
        *self.reward_sink.lock().expect("reward_sink mutex poisoned") = sink;
        info!(sink = %sink, "reward sink updated");
    }

    /// Convert the engine's entire LP-share position in the pair into the
    /// target asset and forward it to the reward sink.
    ///
    /// Both legs' routes are resolved before any swap executes, so a
    /// missing route aborts the whole call with no partial forwarding. Legs
    /// that share a bridge asset are merged and cross that bridge's pool to
    /// the target in a single combined hop.
    pub fn convert(&self, asset_a: &Address, asset_b: &Address) -> Result<Conversion> {
        let pool = self
            .registry
            .lookup(asset_a, asset_b)
            .ok_or(ConverterError::PoolNotFound(*asset_a, *asset_b))?;

        let (token0, token1) = sort_pair(asset_a, asset_b);

        // Resolve both legs before touching any state: a missing route must
        // abort the conversion with the pool position untouched.
        let abort = |e: ConverterError| ConverterError::ConversionFailed(Box::new(e));
        let route0 = self.router.resolve(&token0, &self.target_asset).map_err(abort)?;
        let route1 = self.router.resolve(&token1, &self.target_asset).map_err(abort)?;

        let (amount0, amount1) = {
            let mut pool = pool.lock().expect("pool mutex poisoned");
            let shares = pool.share_balance(&self.address);
            let pool_address = pool.get_address();
            pool.transfer_shares(&self.address, &pool_address, shares)?;
            pool.burn(&self.address)?
        };
        debug!(asset0 = %token0, asset1 = %token1, amount0 = %amount0, amount1 = %amount1, "recovered underlying assets");

        let mut total = U256::ZERO;
        // bridge asset -> (accumulated proceeds, pool for the final hop)
        let mut pending: BTreeMap<Address, (U256, SharedPool)> = BTreeMap::new();
        for (asset, amount, route) in [(token0, amount0, route0), (token1, amount1, route1)] {
            match route {
                ConversionRoute::Identity => total += amount,
                ConversionRoute::Direct { pool } => {
                    total += self.swap_leg(&pool, &asset, &self.target_asset, amount)?;
                }
                ConversionRoute::Bridged { bridge, first, second } => {
                    let out = self.swap_leg(&first, &asset, &bridge, amount)?;
                    let entry = pending.entry(bridge).or_insert((U256::ZERO, second));
                    entry.0 += out;
                }
            }
        }
        // One combined hop per bridge asset, in ascending bridge order.
        for (bridge, (amount, second)) in pending {
            total += self.swap_leg(&second, &bridge, &self.target_asset, amount)?;
        }

        let recipient = self.get_reward_sink();
        self.ledger.transfer(&self.target_asset, &self.address, &recipient, total)?;

        info!(
            asset0 = %self.ledger.describe(&token0),
            asset1 = %self.ledger.describe(&token1),
            amount = %total,
            recipient = %recipient,
            "converted fee revenue"
        );
        Ok(Conversion { asset0: token0, asset1: token1, amount_converted: total, recipient })
    }

    // Execute one exact-input hop: quote against stored reserves, transfer
    // the input to the pool's account, then swap the quoted output back to
    // the engine. The quote is checked before the input moves so a failing
    // hop leaves no partial state.
    fn swap_leg(&self, pool: &SharedPool, asset_in: &Address, asset_out: &Address, amount_in: U256) -> Result<U256> {
        let mut pool = pool.lock().expect("pool mutex poisoned");
        let (reserve0, reserve1) = pool.get_reserves();
        let zero_for_one = pool.get_token0() == *asset_in;
        let (reserve_in, reserve_out) = if zero_for_one { (reserve0, reserve1) } else { (reserve1, reserve0) };

        let out = math::amount_out(amount_in, reserve_in, reserve_out)?;
        if out.is_zero() {
            return Err(ConverterError::InsufficientOutputAmount);
        }

        self.ledger.transfer(asset_in, &self.address, &pool.get_address(), amount_in)?;
        let (amount0_out, amount1_out) = if zero_for_one { (U256::ZERO, out) } else { (out, U256::ZERO) };
        pool.swap(amount0_out, amount1_out, &self.address)?;

        debug!(asset_in = %asset_in, asset_out = %asset_out, amount_in = %amount_in, amount_out = %out, "executed hop");
        Ok(out)
    }
}
