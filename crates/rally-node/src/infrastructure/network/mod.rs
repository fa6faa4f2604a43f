//! LAN discovery infrastructure.
//!
//! # Sub-modules
//!
//! - **`broadcast`** – The browsing side: sends discovery requests to every
//!   reachable broadcast target and turns the responses into discovery
//!   events for the session registry.
//!
//! - **`responder`** – The hosting side: answers discovery requests while a
//!   local-network session is hosted.
//!
//! - **`interfaces`** – Enumerates IPv4 interfaces so probes also reach each
//!   subnet's directed broadcast address.

pub mod broadcast;
pub mod interfaces;
pub mod responder;
