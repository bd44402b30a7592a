//! The _caprov_ library crate.
//!
//! Turns a fresh host into a working PKI installation: the product is
//! downloaded and installed, then its administrative API is used to create
//! a two-level CA hierarchy and an issuer for a team.

pub mod api;
pub mod cli;
pub mod commons;
pub mod config;
pub mod constants;
pub mod install;
pub mod local;
pub mod provision;
