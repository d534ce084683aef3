#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::too_long_first_doc_paragraph)]

//! An embeddable, single-node, persistent key-value store built on the
//! Bitcask log-structured model: appends go to a sequence of immutable
//! data files, an in-memory keydir indexes the latest live value for
//! every key, and a background compactor reclaims space from overwritten
//! and deleted records.

pub mod codec;
pub mod compactor;
pub mod config;
pub mod error;
pub mod file_manager;
pub mod keydir;
pub mod recovery;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use store::Store;
