//! # Herdstore Core
//!
//! Snapshot archive and object-storage engines for a distributed block
//! store.
//!
//! Two subsystems live here, on top of the [`store::BlockStore`] boundary:
//!
//! - **farm** — a content-addressed snapshot engine. It captures the full
//!   object set of the cluster into a local archive of SHA-1-named slices
//!   and can restore any previous snapshot, re-creating the logical
//!   volumes it referenced.
//! - **kv** — an object-storage layer implementing accounts, buckets and
//!   objects over fixed-size block-store data objects, using inline
//!   hashing and linear probing inside a large sparse address space.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herdstore_core::{Farm, Kv, MemStore};
//!
//! let store = Arc::new(MemStore::new());
//!
//! // Object storage.
//! let kv = Kv::new(store.clone());
//! kv.create_account("coly")?;
//! kv.create_bucket("coly", "jetta")?;
//! kv.create_object("coly/jetta", "hello.txt", b"hello")?;
//!
//! // Snapshot the whole cluster, then restore it later.
//! let farm = Farm::init("./farm_archive", store)?;
//! let idx = farm.save_snapshot("v0")?;
//! farm.load_snapshot(idx, "v0")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod farm;
pub mod kv;
pub mod store;

mod util;


pub use config::HerdConfig;
pub use error::{Error, Result};
pub use farm::Farm;
pub use kv::{HttpStatus, Kv};
pub use store::{BlockStore, MemStore, VdiInode};
