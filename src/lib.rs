//! Nostmack hub library.
//!
//! Rotary sensors report turns over UDP, each turn charges a gear, and the
//! charge of every gear is rendered onto a WLED strip in real time. When all
//! gears are full the installation celebrates, then falls back to idle.

pub mod audio;
pub mod config;
pub mod counter;
pub mod diagnostics;
pub mod dnrgb;
pub mod edge;
pub mod effect;
pub mod error;
pub mod gear;
pub mod machine;
pub mod restart;
pub mod scope;
pub mod sensor_link;
pub mod streaming;
pub mod watchdog;
pub mod wled;
