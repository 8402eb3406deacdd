//! Core collaborative editing and authorization engine for a server-based
//! threat-modeling platform.
//!
//! This crate implements the four subsystems that sit behind the HTTP and
//! WebSocket transport layer: the resource [`store`] layer, the [`authz`]
//! resolver, the [`cache`] and invalidation fan-out, the [`limits`]
//! rate/quota enforcement, and the real-time [`collab`] diagram hub.
//! Routing, OAuth/JWT validation, and database migrations are out of
//! scope — this crate is embedded by a transport layer that owns those
//! concerns.

pub mod authz;
pub mod cache;
pub mod collab;
pub mod config;
pub mod error;
pub mod limits;
pub mod principal;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod validation;
pub mod ws_url;

pub use error::{Error, ErrorKind, Result};
