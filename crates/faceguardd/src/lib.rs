//! faceguardd — resident face-recognition daemon.
//!
//! Wires the recognition engine to a V4L2 (or scripted) video source, a
//! SQLite event log and a D-Bus control surface. The background worker and
//! the per-frame path share one [`context::RuntimeContext`], so debouncing
//! and the model cache behave identically no matter where a frame came
//! from.

pub mod config;
pub mod context;
pub mod db;
pub mod dbus_interface;
pub mod debounce;
pub mod recognize;
pub mod service;
pub mod snapshots;
pub mod worker;
