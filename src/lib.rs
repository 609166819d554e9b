// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
// Unsafe is confined to overlay construction and the memory probe:
// - 'probe/io.rs' performs every raw read, write and interlocked update
// - 'probe/region.rs' and 'probe/image.rs' call into the host OS
// - 'metadata/import.rs' and 'bridge/types.rs' call engine-internal functions through transmuted pointers

//! # clrlive
//!
//! Live-memory introspection and patching of a hosted .NET runtime's private structures.
//!
//! `clrlive` runs inside a process hosting the CoreCLR engine and reads the engine's private
//! method, type and metadata structures directly from memory. It resolves where a method's
//! compiled code lives, decodes and rewrites the small call stubs the engine routes calls
//! through, and can revert a method to its pre-compilation state so the next call compiles it
//! again.
//!
//! The engine gives no ABI guarantee for any of this. Every offset and width is taken from a
//! single build profile, [`layout::NET8_X64`], mirroring the x64 .NET 8 engine.
//!
//! ## Features
//!
//! - **Typed overlays** - `Copy` views over method descriptors, chunks, method tables, modules,
//!   assemblies and the app domain, with the engine's flag words exposed as bitflags
//! - **Entry point resolution** - Dispatch slots, native code slots, stable and temporary entry
//!   points
//! - **Precode handling** - Decoding, initializing and resetting redirect and fixup stubs, and a
//!   heap for creating new ones
//! - **Metadata model** - Row lookup in the engine's read-only tables, hot tables included
//! - **Host bridge** - From the host's reflection objects to the engine's descriptors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clrlive::prelude::*;
//!
//! let engine = Engine::global()?;
//!
//! // An address obtained from the host, e.g. a RuntimeMethodInfo object
//! let object = Address(0x0000_01d2_3456_7890);
//! let method = unsafe { HostMethod::classify(engine, object, "RuntimeMethodInfo")? }.method_desc()?;
//!
//! println!("{} slot {}", method.member_def(), method.slot_number());
//! println!("entry point {:?}", method.current_entry_point()?);
//!
//! // Route the next call through the compiler again
//! method.reset()?;
//! # Ok::<(), clrlive::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`probe`] - Raw reads, writes and virtual memory of the current process
//! - [`layout`] - The build profile and the overlays it describes
//! - [`resolver`] - Entry point resolution and mutation on method descriptors
//! - [`precode`] - Call stubs
//! - [`metadata`] - Tokens and the engine's metadata model
//! - [`bridge`] - Host reflection objects
//!
//! Everything starts from an [`Engine`], which pairs the resolved engine image with its build
//! profile. Overlays borrow the engine they were created from.
//!
//! ## Safety
//!
//! Overlays are created with `unsafe` constructors. Passing an address that does not point at a
//! live instance of the overlaid structure is undefined behavior; nothing is validated. Mutating
//! operations require the caller to hold whatever engine lock protects the mutated structure.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with [`Error`]. See [`Error`] for the categories.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use clrlive::prelude::*;
///
/// let engine = Engine::global()?;
/// let domain = engine.app_domain()?;
/// println!("{} assemblies", domain.assembly_list().len());
/// # Ok::<(), clrlive::Error>(())
/// ```
pub mod prelude;

/// Raw memory access to the current process
///
/// Resolves the engine image, reads and writes plain values at raw addresses and allocates
/// virtual memory. The only layer that dereferences addresses.
pub mod probe;

/// The build profile and the typed overlays over the engine's structures
///
/// # Key Components
///
/// - [`layout::BuildProfile`] / [`layout::NET8_X64`] - Offsets and widths of the mirrored build
/// - [`layout::MethodDesc`] / [`layout::MethodDescChunk`] - Method descriptors and their chunks
/// - [`layout::MethodTable`] - Types and their dispatch slots
/// - [`layout::Module`] / [`layout::Assembly`] / [`layout::AppDomain`] - Loader structures
pub mod layout;

/// Entry point resolution and mutation
///
/// Adds slot computations, entry point queries, temporary entry point creation, reset and tiering
/// eligibility to [`layout::MethodDesc`] and [`layout::MethodDescChunk`].
pub mod resolver;

/// The engine's call stubs
///
/// # Examples
///
/// ```rust,no_run
/// use clrlive::{precode::PrecodeType, Engine};
///
/// let engine = Engine::global()?;
/// let stub = engine.allocate_precode(PrecodeType::Fixup)?;
/// assert_eq!(stub.code_byte(), PrecodeType::Fixup as u8);
/// # Ok::<(), clrlive::Error>(())
/// ```
pub mod precode;

/// Metadata tokens and the engine's read-only metadata model
pub mod metadata;

/// Host reflection objects
pub mod bridge;

mod engine;

pub use engine::{Engine, EngineConfig};

/// `clrlive` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. This is used consistently throughout the crate.
///
/// # Examples
///
/// ```rust
/// use clrlive::{metadata::token::Token, metadata::tableid::TableId, Result};
///
/// fn table_of(token: Token) -> Result<TableId> {
///     TableId::try_from(token)
/// }
///
/// assert_eq!(table_of(Token(0x0600_0001))?, TableId::MethodDef);
/// # Ok::<(), clrlive::Error>(())
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `clrlive` Error type
///
/// The main error type for all operations in this crate. Provides detailed error information
/// for layout drift, lookup failures, precondition violations and host OS failures.
pub use error::Error;
