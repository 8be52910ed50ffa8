//! Frames in flight
//!
//! Per-slot resources, the cursor that cycles through them, and the command
//! recording that reads them.

mod command;
mod cursor;
mod recorder;
mod ring;

pub use command::*;
pub use cursor::*;
pub use recorder::*;
pub use ring::*;
