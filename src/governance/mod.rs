pub mod gate;

pub use gate::{AdminCall, CallHash, CallState, DelayGate, QueuedCall};
