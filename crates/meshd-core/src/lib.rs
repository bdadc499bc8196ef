//! Core types, constants, and wire formats for the meshd control plane.
//!
//! This crate defines the MAC address newtype and its IPv6 link-local
//! mapping, the PANN routing frame wire format, and the protocol constants
//! shared by the routing and node layers.

pub mod constants;
pub mod error;
pub mod frame;
pub mod types;

pub use error::FrameError;
pub use frame::PannFrame;
pub use types::{InvalidLength, MacAddress, ParseMacError};
