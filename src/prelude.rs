//! # clrlive Prelude
//!
//! This module provides a convenient prelude for the most commonly used types of the clrlive
//! library. Import this module to get quick access to the engine context, the overlays and the
//! types their accessors return.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all clrlive operations
pub use crate::Error;

/// The result type used throughout clrlive
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The engine context every overlay is created from, and its settings
pub use crate::{Engine, EngineConfig};

/// Raw addresses
pub use crate::probe::Address;

/// The mirrored engine build
pub use crate::layout::{BuildProfile, NET8_X64};

// ================================================================================================
// Overlays
// ================================================================================================

/// Method descriptors and the structures around them
pub use crate::layout::{
    CodeData, InstantiatedMethodDesc, MethodDesc, MethodDescChunk, MethodTable,
};

/// Loader structures
pub use crate::layout::{AppDomain, Assembly, Module, PeAssembly};

/// Flag words and classifications
pub use crate::layout::types::{
    ChunkFlags, InstantiationKind, MethodClassification, MethodDescFlags, MethodDescFlags3,
    MethodDescFlags4, ModuleTransientFlags,
};

// ================================================================================================
// Precodes
// ================================================================================================

/// Call stubs
pub use crate::precode::{FixupPrecode, Precode, PrecodeType, StubPrecode};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata tokens and tables
pub use crate::metadata::{tableid::TableId, token::Token, types::CorMethodImpl};

/// The engine's metadata importer and model
pub use crate::metadata::{import::MdImport, minimd::MiniMd};

// ================================================================================================
// Host Bridge
// ================================================================================================

/// Host reflection objects
pub use crate::bridge::{HostMethod, RuntimeTypeObject, TypeHandle};
