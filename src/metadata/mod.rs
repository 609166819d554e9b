//! Live metadata access through the engine's own importer.
//!
//! The engine keeps the metadata of every loaded image in an importer object whose tables are
//! already decoded into fixed-width records. This module reads those records in place instead of
//! parsing the image again.
//!
//! # Key Components
//!
//! - [`token`] - Metadata tokens and the split form method descriptors store them in
//! - [`tableid`] - Table identifiers
//! - [`import::MdImport`] - The importer object, implementation flags and type enumeration
//! - [`minimd::MiniMd`] - Row counts, record sizes, cold data and hot-table lookup
//! - [`enumerator`] - The engine's enumeration cursor
//!
//! # Examples
//!
//! ```rust,no_run
//! use clrlive::{metadata::token::Token, Engine};
//!
//! let engine = Engine::global()?;
//! let domain = engine.app_domain()?;
//! if let Some(module) = domain.root_assembly().and_then(|a| a.module()) {
//!     let import = module.md_import()?;
//!     let flags = import.method_impl_flags(Token(0x0600_0001))?;
//!     println!("{:?}", flags);
//! }
//! # Ok::<(), clrlive::Error>(())
//! ```

/// The enumeration cursor and iterators built on it
pub mod enumerator;
/// The metadata importer
pub mod import;
/// The decoded table model and its hot-table cache
pub mod minimd;
/// Metadata table identifiers
pub mod tableid;
/// Metadata tokens
pub mod token;
/// Attribute flags stored in table records
pub mod types;
