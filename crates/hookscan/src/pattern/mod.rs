mod hash;
mod signature;

pub use hash::*;
pub use signature::*;
