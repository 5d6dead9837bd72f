// src/gps/mod.rs
//! Location sources: the gpsd session and the manual override file

pub mod data;
pub mod gpsd;
pub mod manual;

pub use data::{Fix, FixMode, OverrideRecord};
pub use gpsd::{LiveFix, LiveSession};
