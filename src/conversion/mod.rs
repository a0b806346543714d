pub mod engine;
pub mod router;


pub use engine::{Conversion, ConversionEngine};
pub use router::{BridgeRouter, ConversionRoute};
