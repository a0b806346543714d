// Layered architecture
pub mod ledger;      // Ledger layer: asset metadata, balances, transfers
pub mod amm;         // AMM layer: constant-product pools, pair registry, swap math
pub mod conversion;  // Conversion layer: bridge routing, fee-to-reward forwarding
pub mod governance;  // Governance layer: timelocked admin-call queue

// Common utilities and types
pub mod config;
pub mod constants;
pub mod error;
pub mod token;
pub mod utils;

// Re-export key components from each layer
pub use amm::{FeeTo, LiquidityPool, PairRegistry, SharedPool, sort_pair};
pub use config::{EngineConfigRoot, EngineConfigSection};
pub use conversion::{BridgeRouter, Conversion, ConversionEngine, ConversionRoute};
pub use error::{ConverterError, Result};
pub use governance::{AdminCall, CallHash, CallState, DelayGate, QueuedCall};
pub use ledger::Ledger;
pub use token::{Token, TokenWrapper};
pub use utils::{ConverterConfigLoader, ConverterConfigLoaderSync, LoadConfigError, LogicalClock};
