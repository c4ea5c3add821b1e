//! Nutriledger Library
//!
//! Per-meal calorie and nutrient aggregation with exact decimal scaling.

pub mod build_info;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod nutrition;
pub mod service;
pub mod store;
pub mod tools;
