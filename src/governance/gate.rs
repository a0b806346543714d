use crate::constants::TimelockBounds;
use crate::conversion::{BridgeRouter, ConversionEngine};
use crate::error::{ConverterError, Result};
use crate::utils::LogicalClock;
use alloy_primitives::{Address, Bytes, U256, hex};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::digest::Update;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use tracing::info;

/// An administrative mutation the gate can authorize. Typed variants
/// instead of opaque call-data buy compile-time checking of the dispatch;
/// `signature` and `encode` reproduce the content-hash keying surface of
/// the byte-string formulation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminCall {
    SetBridge { asset: Address, bridge: Address },
    SetRewardSink { sink: Address },
}

impl AdminCall {
    pub fn signature(&self) -> &'static str {
        match self {
            AdminCall::SetBridge { .. } => "setBridge(address,address)",
            AdminCall::SetRewardSink { .. } => "setRewardSink(address)",
        }
    }

    /// Canonical argument encoding: the argument addresses, concatenated.
    pub fn encode(&self) -> Bytes {
        match self {
            AdminCall::SetBridge { asset, bridge } => {
                let mut data = Vec::with_capacity(40);
                data.extend_from_slice(asset.as_slice());
                data.extend_from_slice(bridge.as_slice());
                Bytes::from(data)
            }
            AdminCall::SetRewardSink { sink } => Bytes::from(sink.as_slice().to_vec()),
        }
    }
}

/// Content hash identifying a queued call.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
pub struct CallHash(pub [u8; 32]);

impl Display for CallHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.0))
    }
}

impl Debug for CallHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallHash({})", hex::encode_prefixed(self.0))
    }
}

impl From<[u8; 32]> for CallHash {
    fn from(hash: [u8; 32]) -> Self {
        CallHash(hash)
    }
}

#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    Queued,
    Executed,
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct QueuedCall {
    pub target: Address,
    pub value: U256,
    pub call: AdminCall,
    pub eta: u64,
    pub state: CallState,
}

/// Timelocked queue of administrative calls.
///
/// Every configuration mutation of the router and engine goes through here:
/// queued by the admin with an eta at least the configured delay away,
/// executable only inside the `[eta, eta + GRACE_PERIOD]` window, and dead
/// forever once executed, cancelled, or stale. Records are keyed by the
/// content hash of the full call tuple, so re-queueing an identical tuple
/// collides with the live record instead of creating a new one.
pub struct DelayGate {
    admin: Address,
    delay: u64,
    records: DashMap<CallHash, QueuedCall>,
    clock: LogicalClock,
    router: Arc<BridgeRouter>,
    engine: Arc<ConversionEngine>,
}

impl DelayGate {
    pub fn new(
        admin: Address,
        delay: u64,
        clock: LogicalClock,
        router: Arc<BridgeRouter>,
        engine: Arc<ConversionEngine>,
    ) -> Result<Self> {
        if delay < TimelockBounds::MINIMUM_DELAY {
            return Err(ConverterError::DelayTooShort);
        }
        if delay > TimelockBounds::MAXIMUM_DELAY {
            return Err(ConverterError::DelayTooLong);
        }
        Ok(DelayGate { admin, delay, records: DashMap::new(), clock, router, engine })
    }

    pub fn get_admin(&self) -> Address {
        self.admin
    }

    pub fn get_delay(&self) -> u64 {
        self.delay
    }

    /// Content hash over (target, value, signature, data, eta).
    pub fn hash(target: &Address, value: U256, call: &AdminCall, eta: u64) -> CallHash {
        let mut hasher = Sha256::new();
        Update::update(&mut hasher, target.as_slice());
        Update::update(&mut hasher, &value.to_be_bytes::<32>());
        Update::update(&mut hasher, call.signature().as_bytes());
        Update::update(&mut hasher, &call.encode());
        Update::update(&mut hasher, &eta.to_be_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        CallHash(digest)
    }

    /// Queue a call for execution at or after `eta`. Queueing a tuple whose
    /// record already exists (in any state) returns the existing hash and
    /// changes nothing.
    pub fn queue(&self, caller: &Address, target: Address, value: U256, call: AdminCall, eta: u64) -> Result<CallHash> {
        if *caller != self.admin {
            return Err(ConverterError::NotAdmin);
        }
        if eta < self.clock.now() + self.delay {
            return Err(ConverterError::DelayTooShort);
        }

        let hash = Self::hash(&target, value, &call, eta);
        if self.records.contains_key(&hash) {
            return Ok(hash);
        }
        info!(hash = %hash, signature = call.signature(), eta, "queued transaction");
        self.records.insert(hash, QueuedCall { target, value, call, eta, state: CallState::Queued });
        Ok(hash)
    }

    /// Execute a queued call inside its `[eta, eta + GRACE_PERIOD]` window
    /// and apply the mutation it carries.
    pub fn execute(&self, caller: &Address, target: Address, value: U256, call: AdminCall, eta: u64) -> Result<()> {
        if *caller != self.admin {
            return Err(ConverterError::NotAdmin);
        }

        let hash = Self::hash(&target, value, &call, eta);
        {
            let mut record = self.records.get_mut(&hash).ok_or(ConverterError::TransactionNotQueued)?;
            if record.state != CallState::Queued {
                return Err(ConverterError::TransactionNotQueued);
            }
            let now = self.clock.now();
            if now < eta {
                return Err(ConverterError::NotSurpassedTimelock);
            }
            if now > eta + TimelockBounds::GRACE_PERIOD {
                return Err(ConverterError::StaleTransaction);
            }
            record.state = CallState::Executed;
        }

        // The record is consumed before the call is applied; a repeat
        // execute of the same tuple sees Executed and fails.
        match call {
            AdminCall::SetBridge { asset, bridge } => self.router.set_bridge(asset, bridge),
            AdminCall::SetRewardSink { sink } => self.engine.set_reward_sink(sink),
        }
        info!(hash = %hash, "executed transaction");
        Ok(())
    }

    /// Drop a queued call. Always succeeds for a record in the Queued
    /// state; a consumed or unknown record is reported as not queued.
    pub fn cancel(&self, caller: &Address, target: Address, value: U256, call: AdminCall, eta: u64) -> Result<()> {
        if *caller != self.admin {
            return Err(ConverterError::NotAdmin);
        }

        let hash = Self::hash(&target, value, &call, eta);
        let mut record = self.records.get_mut(&hash).ok_or(ConverterError::TransactionNotQueued)?;
        if record.state != CallState::Queued {
            return Err(ConverterError::TransactionNotQueued);
        }
        record.state = CallState::Cancelled;
        info!(hash = %hash, "cancelled transaction");
        Ok(())
    }

    pub fn get_state(&self, hash: &CallHash) -> Option<CallState> {
        self.records.get(hash).map(|r| r.state)
    }
}
