//! Nutriledger Tools module
//!
//! MCP tool implementations over the ledger service.

pub mod catalog;
pub mod containers;
pub mod status;
