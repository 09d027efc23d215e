//! Contract types for the order events shared by the demo services
//!
//! This crate contains the wire payload types exchanged through the event
//! relay, the closed [`OrderEvent`] union consumers dispatch on, and the
//! registry constructor wiring every event kind to its decoder.

pub mod order_events;

pub use order_events::*;
