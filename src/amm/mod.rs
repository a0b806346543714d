pub mod math;
pub mod pool;
pub mod registry;

pub use pool::{FeeTo, LiquidityPool, SharedPool};
pub use registry::{PairRegistry, sort_pair};
