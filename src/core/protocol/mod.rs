// src/core/protocol/mod.rs

//! The gateway's message model and its JSON wire encoding.

pub mod codec;
pub mod messages;

pub use messages::{Message, MessageHeader, Payload};
