//! Test doubles for the security layer.

pub mod clock;
pub mod logs;

pub use clock::ManualClock;
pub use logs::CapturedLogs;
