//! Per-slot memory: uniform record layouts and the regions that hold them.

mod constants;
mod region;

pub use constants::*;
pub use region::*;
