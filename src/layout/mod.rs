//! Typed overlays over the engine's private data structures.
//!
//! The layout catalog turns a raw address into a typed view whose field offsets and widths match
//! the mirrored engine build. Overlays never validate the memory they describe: constructing one
//! is `unsafe` and is the single point where the caller vouches for the address. Everything read
//! through an overlay afterwards is trusted as the engine wrote it.
//!
//! # Architecture
//!
//! Each overlay is a `Copy` handle pairing an [`Address`] with the [`crate::Engine`] whose
//! [`BuildProfile`] describes the structure. Fields are declared once as [`Field`] descriptors in
//! the profile, overlays only name them. Variable-sized structures expose an explicit size
//! function instead of a fixed `size_of`.
//!
//! # Key Components
//!
//! - [`BuildProfile`] / [`NET8_X64`] - All offsets, widths and size tables of the mirrored build
//! - [`MethodDesc`], [`InstantiatedMethodDesc`], [`CodeData`] - Method descriptors
//! - [`MethodDescChunk`] - Runs of descriptors sharing a method table and token range
//! - [`MethodTable`], [`AuxiliaryData`] - Types and their dispatch slots
//! - [`Module`], [`PeAssembly`], [`Assembly`], [`AppDomain`], [`ArrayList`] - Loader structures
//! - [`types`] - Flag words and classifications
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use clrlive::{layout::Address, Engine};
//!
//! let engine = Engine::global()?;
//! let method = unsafe { engine.method_desc(Address(0x7ffd_1234_5678)) };
//!
//! println!("{:?} slot {} size {:#x}", method.classification(), method.slot_number(), method.size());
//! # Ok::<(), clrlive::Error>(())
//! ```

mod chunk;
mod field;
mod methoddesc;
mod methodtable;
mod module;
mod profile;
pub mod types;

pub use crate::probe::Address;
pub use chunk::{MethodDescChunk, MethodDescs};
pub use field::{Field, FieldArray};
pub use methoddesc::{CodeData, InstantiatedMethodDesc, MethodDesc};
pub use methodtable::{AuxiliaryData, MethodTable};
pub use module::{AppDomain, ArrayList, ArrayListIter, Assembly, Module, PeAssembly};
pub use profile::*;
