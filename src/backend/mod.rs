//! Device backends
//!
//! [`Device`] is the capability interface the frame pipeline submits through.
//! [`ManualDevice`] and [`SimulatedDevice`] run without a GPU; the wgpu
//! backend is available with the `wgpu-backend` feature.

mod manual;
mod simulated;
pub mod traits;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use manual::*;
pub use simulated::*;
pub use traits::*;

#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::{WgpuDevice, WgpuTimeline};
