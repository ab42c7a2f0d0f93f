#![doc = "Per-CPU clock jump monitor: pinned busy-poll workers and their lifecycle."]

pub mod controller;
pub mod realtime;
pub mod shutdown;
pub mod sink;
pub mod worker;

pub use controller::*;
pub use realtime::*;
pub use shutdown::*;
pub use sink::*;
pub use worker::*;
