use crate::amm::{PairRegistry, SharedPool};
use crate::error::{ConverterError, Result};
use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use strum_macros::Display;
use tracing::info;

/// How one recovered asset reaches the conversion target.
#[derive(Clone, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionRoute {
    /// The asset already is the target; nothing to swap.
    Identity,
    /// One hop through a pool held directly against the target.
    Direct { pool: SharedPool },
    /// Two hops: source to its bridge asset, bridge asset to the target.
    Bridged { bridge: Address, first: SharedPool, second: SharedPool },
}

impl ConversionRoute {
    /// Hop count of the route.
    pub fn len(&self) -> usize {
        match self {
            ConversionRoute::Identity => 0,
            ConversionRoute::Direct { .. } => 1,
            ConversionRoute::Bridged { .. } => 2,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Resolves the route from an arbitrary asset to the conversion target.
///
/// Resolution is deterministic: for identical (source, target, mapping)
/// inputs the same route comes back every time. The bridge mapping is
/// mutable only through the delay gate's dispatch.
pub struct BridgeRouter {
    registry: Arc<PairRegistry>,
    // asset -> designated bridge; absent entries fall back to the base asset
    bridges: DashMap<Address, Address>,
    base_asset: Address,
}

impl BridgeRouter {
    pub fn new(registry: Arc<PairRegistry>, base_asset: Address) -> Self {
        BridgeRouter { registry, bridges: DashMap::new(), base_asset }
    }

    pub fn get_base_asset(&self) -> Address {
        self.base_asset
    }

    /// The bridge designated for `asset`, defaulting to the base asset.
    pub fn get_bridge(&self, asset: &Address) -> Address {
        self.bridges.get(asset).map(|b| *b).unwrap_or(self.base_asset)
    }

    // Reachable only through the delay gate's execute dispatch.
    pub(crate) fn set_bridge(&self, asset: Address, bridge: Address) {
        self.bridges.insert(asset, bridge);
        info!(asset = %asset, bridge = %bridge, "bridge mapping updated");
    }

    /// Resolve the route from `source` to `target`. Fails with
    /// [`ConverterError::NoRoute`] when neither a direct pool nor both legs
    /// of the bridged path exist.
    pub fn resolve(&self, source: &Address, target: &Address) -> Result<ConversionRoute> {
        if source == target {
            return Ok(ConversionRoute::Identity);
        }
        if let Some(pool) = self.registry.lookup(source, target) {
            return Ok(ConversionRoute::Direct { pool });
        }
        let bridge = self.get_bridge(source);
        if bridge != *source && bridge != *target {
            if let (Some(first), Some(second)) =
                (self.registry.lookup(source, &bridge), self.registry.lookup(&bridge, target))
            {
                return Ok(ConversionRoute::Bridged { bridge, first, second });
            }
        }
        Err(ConverterError::NoRoute { from: *source, target: *target })
    }
}
