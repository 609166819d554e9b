//! Flag and classification types of the engine's method and module structures.
//!
//! This module defines the bitflags and enums used to interpret the packed flag words of method
//! descriptors, method descriptor chunks, instantiated method descriptors and modules.
//!
//! # Key Types
//! - [`MethodDescFlags`], [`MethodDescFlags3`], [`MethodDescFlags4`]: Method descriptor flag words
//! - [`MethodClassification`]: The 3-bit kind of a method descriptor
//! - [`InstantiationKind`]: The kind of an instantiated method descriptor
//! - [`ChunkFlags`]: Method descriptor chunk flags
//! - [`ModuleTransientFlags`]: Module transient flags

use bitflags::bitflags;
use strum::{EnumCount, EnumIter};

/// Bitmask for classification extraction
pub const METHOD_DESC_CLASSIFICATION_MASK: u16 = 0x0007;
/// Bitmask selecting the flags that index the classification-size table
pub const METHOD_DESC_SIZE_INDEX_MASK: u16 = 0x007F;
/// Bitmask selecting the flags that precede the native code slot
pub const METHOD_DESC_NATIVE_CODE_SLOT_INDEX_MASK: u16 = 0x001F;
/// Bitmask for the token remainder stored in `flags3`
pub const METHOD_TOKEN_REMAINDER_MASK: u16 = 0x0FFF;
/// Number of bits of the method token stored in each descriptor
pub const METHOD_TOKEN_REMAINDER_BIT_COUNT: u32 = 12;
/// Bitmask for the token range stored in the chunk flags
pub const METHOD_TOKEN_RANGE_MASK: u16 = 0x0FFF;
/// Bitmask for the instantiation kind stored in `flags2`
pub const INSTANTIATION_KIND_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Primary method descriptor flags
    pub struct MethodDescFlags: u16 {
        /// Classification bits, see [`MethodClassification`]
        const CLASSIFICATION = 0x0007;
        /// The entry point lives in a private slot after the descriptor
        const HAS_NON_VTABLE_SLOT = 0x0008;
        /// The descriptor implements a method impl
        const METHOD_IMPL = 0x0010;
        /// The descriptor has a dedicated native code slot
        const HAS_NATIVE_CODE_SLOT = 0x0020;
        /// Added by edit and continue
        const ENC_ADDED_METHOD = 0x0040;
        /// Static method
        const STATIC = 0x0080;
        /// Value type parameters were walked
        const VALUE_TYPE_PARAMETERS_WALKED = 0x0100;
        /// Value type parameters were loaded
        const VALUE_TYPE_PARAMETERS_LOADED = 0x0200;
        /// Duplicate descriptor of another slot
        const DUPLICATE = 0x0400;
        /// No equivalent value type parameters
        const DOES_NOT_HAVE_EQUIVALENT_VALUETYPE_PARAMETERS = 0x0800;
        /// Covariant return type checks required
        const REQUIRES_COVARIANT_RETURN_TYPE_CHECKING = 0x1000;
        /// Never inline
        const NOT_INLINE = 0x2000;
        /// Synchronized method
        const SYNCHRONIZED = 0x4000;
        /// Intrinsic method
        const IS_INTRINSIC = 0x8000;
    }
}

impl MethodDescFlags {
    /// Index into the classification-size table
    #[must_use]
    pub fn size_index(self) -> u16 {
        self.bits() & METHOD_DESC_SIZE_INDEX_MASK
    }

    /// Index into the classification-size table of the slots preceding the native code slot
    #[must_use]
    pub fn native_code_slot_index(self) -> u16 {
        self.bits() & METHOD_DESC_NATIVE_CODE_SLOT_INDEX_MASK
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method descriptor `flags3`, sharing its word with the token remainder
    pub struct MethodDescFlags3: u16 {
        /// Low 12 bits of the method definition token
        const TOKEN_REMAINDER = 0x0FFF;
        /// The dispatch slot holds a stable entry point
        const HAS_STABLE_ENTRY_POINT = 0x1000;
        /// The stable entry point is a precode
        const HAS_PRECODE = 0x2000;
        /// Unboxing stub
        const IS_UNBOXING_STUB = 0x4000;
        /// Eligible for tiered compilation
        const IS_ELIGIBLE_FOR_TIERED_COMPILATION = 0x8000;
    }
}

impl MethodDescFlags3 {
    /// The token remainder stored in the low 12 bits
    #[must_use]
    pub fn token_remainder(self) -> u16 {
        self.bits() & METHOD_TOKEN_REMAINDER_MASK
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method descriptor `flags4`
    pub struct MethodDescFlags4: u8 {
        /// Whether a stable entry point is required was computed
        const COMPUTED_REQUIRES_STABLE_ENTRY_POINT = 0x01;
        /// A stable entry point is required
        const REQUIRES_STABLE_ENTRY_POINT = 0x02;
        /// The code data holds a temporary entry point
        const TEMPORARY_ENTRY_POINT_ASSIGNED = 0x04;
    }
}

/// The kind of a method descriptor, stored in the low 3 bits of `flags`.
///
/// The classification is fixed when the descriptor is created and determines the size of its
/// variable tail.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount)]
#[repr(u8)]
pub enum MethodClassification {
    /// Plain bytecode method
    Il = 0,
    /// Internal call implemented by the engine
    FCall = 1,
    /// Native interop call
    PInvoke = 2,
    /// Engine-implemented method, e.g. delegate invoke
    EEImpl = 3,
    /// Array accessor shim
    Array = 4,
    /// Generic instantiation or wrapper stub
    Instantiated = 5,
    /// COM interop wrapper
    ComInterop = 6,
    /// Dynamically generated method without metadata
    Dynamic = 7,
}

impl MethodClassification {
    /// Extracts the classification from the primary flags
    #[must_use]
    pub fn from_flags(flags: MethodDescFlags) -> Self {
        match flags.bits() & METHOD_DESC_CLASSIFICATION_MASK {
            0 => MethodClassification::Il,
            1 => MethodClassification::FCall,
            2 => MethodClassification::PInvoke,
            3 => MethodClassification::EEImpl,
            4 => MethodClassification::Array,
            5 => MethodClassification::Instantiated,
            6 => MethodClassification::ComInterop,
            _ => MethodClassification::Dynamic,
        }
    }
}

/// The kind of an instantiated method descriptor, stored in the low 3 bits of `flags2`
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstantiationKind {
    /// A kind the engine does not define
    Unknown(u8),
    /// Generic method definition
    GenericMethodDefinition,
    /// Unshared instantiation
    UnsharedMethodInstantiation,
    /// Instantiation shared over canonical arguments
    SharedMethodInstantiation,
    /// Stub providing the instantiation argument to shared code
    WrapperStubWithInstantiations,
}

impl InstantiationKind {
    /// Extracts the kind from `flags2`
    #[must_use]
    pub fn from_flags2(flags2: u16) -> Self {
        match flags2 & INSTANTIATION_KIND_MASK {
            1 => InstantiationKind::GenericMethodDefinition,
            2 => InstantiationKind::UnsharedMethodInstantiation,
            3 => InstantiationKind::SharedMethodInstantiation,
            4 => InstantiationKind::WrapperStubWithInstantiations,
            other => InstantiationKind::Unknown(other as u8),
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method descriptor chunk flags, sharing their word with the token range
    pub struct ChunkFlags: u16 {
        /// High 12 bits of the method definition tokens of the chunk
        const TOKEN_RANGE = 0x0FFF;
        /// Tiering eligibility was determined for the chunk
        const DETERMINED_IS_ELIGIBLE_FOR_TIERED_COMPILATION = 0x4000;
        /// The loader module is stored after the descriptors
        const LOADER_MODULE_ATTACHED_TO_CHUNK = 0x8000;
    }
}

impl ChunkFlags {
    /// The token range stored in the low 12 bits
    #[must_use]
    pub fn token_range(self) -> u16 {
        self.bits() & METHOD_TOKEN_RANGE_MASK
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Module transient flags
    pub struct ModuleTransientFlags: u32 {
        /// Module is tenured
        const MODULE_IS_TENURED = 0x0000_0001;
        /// Classes were freed
        const CLASSES_FREED = 0x0000_0004;
        /// Edit and continue is enabled
        const IS_EDIT_AND_CONTINUE = 0x0000_0008;
        /// The profiler was notified
        const IS_PROFILER_NOTIFIED = 0x0000_0010;
        /// ETW was notified
        const IS_ETW_NOTIFIED = 0x0000_0020;
        /// Created through reflection emit
        const IS_REFLECTION_EMIT = 0x0000_0040;
        /// Debugger user override
        const DEBUGGER_USER_OVERRIDE_PRIV = 0x0000_0400;
        /// Debugger allows JIT optimizations
        const DEBUGGER_ALLOW_JIT_OPTS_PRIV = 0x0000_0800;
        /// Debugger tracks JIT info
        const DEBUGGER_TRACK_JIT_INFO_PRIV = 0x0000_1000;
        /// Debugger edit and continue enabled
        const DEBUGGER_ENC_ENABLED_PRIV = 0x0000_2000;
        /// Debugger symbols copied
        const DEBUGGER_PDBS_COPIED = 0x0000_4000;
        /// Debugger symbols ignored
        const DEBUGGER_IGNORE_PDBS = 0x0000_8000;
        /// Fixed up for mixed-mode images
        const IS_IJW_FIXED_UP = 0x0008_0000;
        /// Being unloaded
        const IS_BEING_UNLOADED = 0x0010_0000;
    }
}
