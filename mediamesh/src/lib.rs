//! MediaMesh - shared media catalogs across independently operated nodes
//!
//! This library provides the two subsystems a MediaMesh node is built from:
//!
//! - **Catalog synchronization** ([`catalog`], [`scanner`], [`sync`]): every node
//!   scans its own media root into a local catalog; satellites push their
//!   catalog to a master and pull back the merged view of every owner.
//! - **File transfer** ([`jobs`], [`transfer`]): resumable, retrying HTTP
//!   downloads of files owned by other nodes, served by the range-aware
//!   `/serve` endpoint in [`api`].
//!
//! [`app::NodeApp`] wires the pieces together from a [`config::NodeConfig`].

pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod scanner;
pub mod sync;
pub mod transfer;

/// Library version, reported by `/ping` and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the shared secret on node-to-node requests.
pub const SECRET_HEADER: &str = "x-mediamesh-secret";

/// Header carrying the access PIN on requests from human clients.
pub const PIN_HEADER: &str = "x-mediamesh-pin";
