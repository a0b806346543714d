use alloy_primitives::Address;

/// LP shares permanently locked on a pool's first mint. Prevents the
/// share-price-inflation attack on a pool with near-zero reserves.
pub const MINIMUM_LOCKED_SHARES: u64 = 1000;

/// Account the locked shares are credited to.
pub const SHARE_LOCK_ADDRESS: Address = Address::ZERO;

/// Swap fee as parts-per-thousand kept by the pool: a taker pays 3/1000.
pub const FEE_NUMERATOR: u64 = 997;
pub const FEE_DENOMINATOR: u64 = 1000;

#[non_exhaustive]
pub struct TimelockBounds;

impl TimelockBounds {
    /// Shortest delay a gate may be configured with (2 days).
    pub const MINIMUM_DELAY: u64 = 2 * 24 * 60 * 60;

    /// Longest delay a gate may be configured with (30 days).
    pub const MAXIMUM_DELAY: u64 = 30 * 24 * 60 * 60;

    /// Window after `eta` during which a queued call stays executable (14 days).
    pub const GRACE_PERIOD: u64 = 14 * 24 * 60 * 60;
}
