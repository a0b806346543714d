use alloy_primitives::Address;

pub type Result<T> = std::result::Result<T, ConverterError>;

/// Error taxonomy of the conversion core. Every failure aborts the whole
/// enclosing operation with no partial state change; callers always receive
/// the specific kind, never a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum ConverterError {
    // Pool
    #[error("constant-product invariant violated")]
    InvariantViolation,
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,
    #[error("insufficient liquidity")]
    InsufficientLiquidity,
    #[error("insufficient output amount")]
    InsufficientOutputAmount,
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    #[error("invalid swap recipient {0}")]
    InvalidRecipient(Address),

    // Registry
    #[error("identical assets {0}")]
    IdenticalAssets(Address),
    #[error("no pool for pair {0}/{1}")]
    PoolNotFound(Address, Address),

    // Router / engine
    #[error("no route from {from} to {target}")]
    NoRoute { from: Address, target: Address },
    #[error("conversion aborted: {0}")]
    ConversionFailed(#[source] Box<ConverterError>),

    // Ledger
    #[error("insufficient balance of {asset} in account {account}")]
    InsufficientBalance { asset: Address, account: Address },

    // Delay gate
    #[error("caller is not the gate admin")]
    NotAdmin,
    #[error("eta must satisfy the configured delay")]
    DelayTooShort,
    #[error("delay must not exceed the maximum delay")]
    DelayTooLong,
    #[error("transaction hasn't surpassed the time lock")]
    NotSurpassedTimelock,
    #[error("transaction is past its grace window")]
    StaleTransaction,
    #[error("transaction is not queued")]
    TransactionNotQueued,
}
