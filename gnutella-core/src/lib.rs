//! Protocol and domain logic for the Gnutella-style two-tier overlay
//! simulation: message identity, loop suppression, TTL decay, reverse-path
//! routing, the super-peer index, and the leaf request lifecycle.
//!
//! This crate is transport-agnostic — see [`transport::PeerRpc`]. The
//! binary crate `gnutella-node` supplies the production gRPC transport and
//! the process/CLI glue.

pub mod error;
pub mod leaf;
pub mod orchestrator;
pub mod storage;
pub mod super_peer;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
