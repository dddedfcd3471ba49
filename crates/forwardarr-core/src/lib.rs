//! Forwardarr Core - Domain types, ports and configuration
//!
//! This crate contains the pieces every other Forwardarr crate agrees on:
//! - **Domain types** - [`ForwardedPort`](domain::ForwardedPort), a validated
//!   listening port, and the domain error type
//! - **Port definitions** - Traits for adapters: `ITorrentClient`, `IPortNotifier`
//! - **Configuration** - YAML file loading, environment overrides and validation
//!
//! # Architecture
//!
//! Adapter crates (`forwardarr-qbit`, `forwardarr-webhook`) implement the
//! port traits; `forwardarr-sync` drives them without knowing which
//! torrent client or notification transport sits behind them.

pub mod config;
pub mod domain;
pub mod ports;
