//! The memory probe: raw access to the current process.
//!
//! Everything else in this crate computes addresses, the probe is what finally touches memory.
//! It resolves the engine image, reads and writes plain values at raw addresses, and allocates
//! or frees virtual memory through the host OS.
//!
//! # Key Components
//!
//! - [`Address`] - A raw address in the current process
//! - [`io`] - Unchecked typed reads, writes, copies and interlocked flag updates
//! - [`image`] - Resolution of the engine's loaded image
//! - [`region`] - Virtual memory allocation with Win32-style states and protections

mod address;
pub mod image;
pub mod io;
pub mod region;

pub use address::Address;
pub use image::{default_image_name, resolve_image, EngineImage};
pub use region::{FreeType, MemoryProtect, MemoryState};
