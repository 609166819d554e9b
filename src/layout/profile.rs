//! The build profile: every offset, width and size constant of the mirrored engine build.
//!
//! The hosted engine gives no ABI guarantee for its private structures, field positions move
//! between builds. All of them are therefore collected in one [`BuildProfile`] value, and every
//! overlay reads its fields through the profile of the [`crate::Engine`] it was created from.
//! Only one profile is mirrored, [`NET8_X64`].

use crate::layout::{Address, Field, FieldArray};

/// Number of entries in the method descriptor classification-size table
pub const METHOD_DESC_SIZE_TABLE_LEN: usize = 128;

/// Layout of the fixed 16-byte method descriptor core
#[derive(Debug, Clone, Copy)]
pub struct MethodDescLayout {
    /// `flags3` including the 12-bit token remainder
    pub flags3: Field<u16>,
    /// Index of the descriptor inside its chunk, in pointer-sized units
    pub chunk_index: Field<u8>,
    /// `flags4`
    pub flags4: Field<u8>,
    /// Dispatch slot number
    pub slot_number: Field<u16>,
    /// `flags`, including the classification
    pub flags: Field<u16>,
    /// Pointer to the code data
    pub code_data: Field<Address>,
    /// Alignment of descriptors inside a chunk
    pub alignment: usize,
    /// Classification-size table, indexed by the low 7 bits of `flags`
    pub sizes: [u8; METHOD_DESC_SIZE_TABLE_LEN],
}

/// Layout of the instantiated method descriptor tail
#[derive(Debug, Clone, Copy)]
pub struct InstantiatedMethodDescLayout {
    /// Wrapped method descriptor, or the dictionary layout of a generic definition
    pub wrapped: Field<Address>,
    /// Per-instantiation info
    pub per_inst_info: Field<Address>,
    /// `flags2`, the low bits hold the instantiation kind
    pub flags2: Field<u16>,
    /// Number of generic arguments
    pub num_generic_args: Field<u16>,
}

/// Layout of the method descriptor code data
#[derive(Debug, Clone, Copy)]
pub struct CodeDataLayout {
    /// Versioning state
    pub versioning_state: Field<Address>,
    /// Temporary entry point, valid once `flags4` says it was assigned
    pub temporary_entry_point: Field<Address>,
}

/// Layout of the method descriptor chunk header
#[derive(Debug, Clone, Copy)]
pub struct ChunkLayout {
    /// Owning method table
    pub method_table: Field<Address>,
    /// Next chunk of the same method table
    pub next: Field<Address>,
    /// Size of the descriptor area in pointer-sized units, minus one
    pub size: Field<u8>,
    /// Number of descriptors, minus one
    pub count: Field<u8>,
    /// Flags and the 12-bit token range
    pub flags_and_token_range: Field<u16>,
    /// Size of the header, the first descriptor follows it
    pub header_size: usize,
}

/// Layout of the method table header
#[derive(Debug, Clone, Copy)]
pub struct MethodTableLayout {
    /// Low flags and component size
    pub flags: Field<u32>,
    /// Base instance size
    pub base_size: Field<u32>,
    /// `flags2`
    pub flags2: Field<u16>,
    /// Type definition token remainder
    pub token: Field<u16>,
    /// Number of virtual slots
    pub num_virtuals: Field<u16>,
    /// Number of interfaces
    pub num_interfaces: Field<u16>,
    /// Parent method table
    pub parent: Field<Address>,
    /// Owning module
    pub module: Field<Address>,
    /// Auxiliary data
    pub auxiliary_data: Field<Address>,
    /// Class or canonical method table
    pub canonical: Field<Address>,
    /// Per-instantiation info
    pub per_inst_info: Field<Address>,
    /// Interface map
    pub interface_map: Field<Address>,
    /// Virtual slot indirection cells trailing the header
    pub vtable_indirections: FieldArray<Address>,
    /// log2 of the number of slots per indirection cell
    pub slots_per_indirection_log2: usize,
}

/// Layout of the method table auxiliary data
#[derive(Debug, Clone, Copy)]
pub struct AuxiliaryDataLayout {
    /// Flags
    pub flags: Field<u32>,
    /// Signed offset from the auxiliary data to the end of the non-virtual slot array
    pub offset_to_non_virtual_slots: Field<i16>,
    /// Loader module
    pub loader_module: Field<Address>,
    /// Handle of the exposed class object
    pub exposed_class_object: Field<Address>,
}

/// Layout of the precode code side
#[derive(Debug, Clone, Copy)]
pub struct PrecodeLayout {
    /// Discriminator byte at the start of the stub code
    pub type_byte: Field<u8>,
    /// Size of a stub's code
    pub code_size: usize,
    /// Offset of the fixup entry inside a fixup precode
    pub fixup_code_offset: usize,
    /// Minimum size of the interleaved stub code page
    pub min_stub_code_page_size: usize,
}

/// Layout of the out-of-line data of a simple redirect stub
#[derive(Debug, Clone, Copy)]
pub struct StubPrecodeDataLayout {
    /// Owning method descriptor
    pub method_desc: Field<Address>,
    /// Call target
    pub target: Field<Address>,
    /// Effective precode type
    pub type_byte: Field<u8>,
}

/// Layout of the out-of-line data of a fixup stub
#[derive(Debug, Clone, Copy)]
pub struct FixupPrecodeDataLayout {
    /// Call target
    pub target: Field<Address>,
    /// Owning method descriptor
    pub method_desc: Field<Address>,
    /// Fixup thunk the stub jumps to on first call
    pub precode_fixup_thunk: Field<Address>,
}

/// Layout of a module
#[derive(Debug, Clone, Copy)]
pub struct ModuleLayout {
    /// Virtual function table
    pub vtable: Field<Address>,
    /// Loader allocator
    pub loader_allocator: Field<Address>,
    /// UTF-8 simple name
    pub simple_name: Field<Address>,
    /// PE assembly
    pub pe_assembly: Field<Address>,
    /// Transient flags
    pub transient_flags: Field<u32>,
    /// Owning assembly
    pub assembly: Field<Address>,
    /// Domain-local module
    pub domain_local_module: Field<Address>,
}

/// Layout of a PE assembly
#[derive(Debug, Clone, Copy)]
pub struct PeAssemblyLayout {
    /// Metadata importer
    pub md_import: Field<Address>,
}

/// Layout of an assembly
#[derive(Debug, Clone, Copy)]
pub struct AssemblyLayout {
    /// Manifest module
    pub module: Field<Address>,
    /// Created through reflection emit
    pub is_dynamic: Field<u8>,
    /// Loaded into a collectible context
    pub is_collectible: Field<u8>,
    /// Instrumentation status
    pub is_instrumented: Field<u8>,
}

/// Layout of the app domain
#[derive(Debug, Clone, Copy)]
pub struct AppDomainLayout {
    /// Inline array list of loaded assemblies
    pub assemblies: usize,
    /// Root assembly
    pub root_assembly: Field<Address>,
}

/// Layout of the engine's block-linked array list
#[derive(Debug, Clone, Copy)]
pub struct ArrayListLayout {
    /// Number of elements
    pub count: Field<i32>,
    /// Inline first block's link to the next block
    pub first_next: Field<Address>,
    /// Inline first block's capacity
    pub first_block_size: Field<i32>,
    /// Inline first block's elements
    pub first_elements: FieldArray<Address>,
    /// Link to the next block
    pub block_next: Field<Address>,
    /// Capacity of a block
    pub block_size: Field<i32>,
    /// Elements of a block
    pub block_elements: FieldArray<Address>,
}

/// Layout of the internal metadata importer
#[derive(Debug, Clone, Copy)]
pub struct MdImportLayout {
    /// Virtual function table
    pub vtable: Field<Address>,
    /// Inline metadata model
    pub mini_md: usize,
    /// Vtable slot of the type definition enumeration initializer
    pub enum_type_def_init: Field<Address>,
}

/// Layout of the metadata model
#[derive(Debug, Clone, Copy)]
pub struct MiniMdLayout {
    /// Schema row counts, one per table
    pub row_counts: FieldArray<u32>,
    /// Record width of each table definition
    pub record_sizes: FieldArray<u16>,
    /// Table data pointers
    pub table_data: FieldArray<Address>,
    /// Hot tables directory
    pub hot_tables: Field<Address>,
    /// Implementation flags inside a `MethodDef` row
    pub method_def_impl_flags: Field<u16>,
}

/// Layout of the hot tables directory and its per-table headers
#[derive(Debug, Clone, Copy)]
pub struct HotTableLayout {
    /// Per-table offsets of the hot headers, relative to the directory
    pub directory_offsets: FieldArray<i32>,
    /// Number of hot records
    pub record_count: Field<u32>,
    /// Offset of the first-level bucket table, zero for dense tables
    pub first_level_offset: Field<u32>,
    /// Offset of the second-level key bytes
    pub second_level_offset: Field<u32>,
    /// Offset of the hot record data
    pub hot_data_offset: Field<u32>,
    /// Bucket shift
    pub shift: Field<u16>,
}

/// Layout of the internal enumeration cursor
#[derive(Debug, Clone, Copy)]
pub struct HEnumLayout {
    /// Token type tag
    pub kind: Field<i32>,
    /// Number of items
    pub count: Field<i32>,
    /// Zero for a simple range, non-zero for indexed storage
    pub enum_type: Field<i32>,
    /// First item
    pub start: Field<i32>,
    /// One past the last item
    pub end: Field<i32>,
    /// Next item
    pub current: Field<i32>,
    /// Inline token storage
    pub tokens: FieldArray<u32>,
    /// Size of the cursor
    pub size: usize,
}

/// Layout of the host reflection objects
#[derive(Debug, Clone, Copy)]
pub struct HostLayout {
    /// Method descriptor handle of a runtime method info
    pub runtime_method_handle: Field<Address>,
    /// Method stub of a dynamic method
    pub dynamic_method_stub: Field<Address>,
    /// Method descriptor handle of a runtime method stub
    pub method_stub_handle: Field<Address>,
    /// Type handle of a runtime type object
    pub runtime_type_handle: Field<Address>,
    /// Element count of a managed array
    pub array_length: Field<i32>,
    /// Elements of a managed array of object references
    pub array_elements: FieldArray<Address>,
}

/// Offsets of engine globals and internal functions, relative to the image base
#[derive(Debug, Clone, Copy)]
pub struct ImageOffsets {
    /// Global app domain pointer
    pub app_domain: usize,
    /// Pre-compilation thunk
    pub pre_stub: usize,
    /// Module type enumeration helper
    pub get_types: usize,
}

/// Every layout constant of one engine build
#[derive(Debug, Clone, Copy)]
pub struct BuildProfile {
    /// Human readable name of the build
    pub name: &'static str,
    /// Size of a pointer
    pub pointer_size: usize,
    /// OS page size the engine assumes
    pub os_page_size: usize,
    /// Method descriptor core
    pub method_desc: MethodDescLayout,
    /// Instantiated method descriptor tail
    pub instantiated_method_desc: InstantiatedMethodDescLayout,
    /// Method descriptor code data
    pub code_data: CodeDataLayout,
    /// Method descriptor chunk
    pub chunk: ChunkLayout,
    /// Method table
    pub method_table: MethodTableLayout,
    /// Method table auxiliary data
    pub auxiliary_data: AuxiliaryDataLayout,
    /// Precode code side
    pub precode: PrecodeLayout,
    /// Simple redirect stub data
    pub stub_precode: StubPrecodeDataLayout,
    /// Fixup stub data
    pub fixup_precode: FixupPrecodeDataLayout,
    /// Module
    pub module: ModuleLayout,
    /// PE assembly
    pub pe_assembly: PeAssemblyLayout,
    /// Assembly
    pub assembly: AssemblyLayout,
    /// App domain
    pub app_domain: AppDomainLayout,
    /// Array list
    pub array_list: ArrayListLayout,
    /// Metadata importer
    pub md_import: MdImportLayout,
    /// Metadata model
    pub mini_md: MiniMdLayout,
    /// Hot tables
    pub hot_table: HotTableLayout,
    /// Enumeration cursor
    pub henum: HEnumLayout,
    /// Host reflection objects
    pub host: HostLayout,
    /// Image-relative globals and functions
    pub image: ImageOffsets,
}

impl BuildProfile {
    /// Size of the code page a precode's data page is paired with
    #[must_use]
    pub const fn stub_code_page_size(&self) -> usize {
        if self.precode.min_stub_code_page_size > self.os_page_size {
            self.precode.min_stub_code_page_size
        } else {
            self.os_page_size
        }
    }

    /// Classification-size table entry at `index`, only the low 7 bits are used
    #[must_use]
    pub const fn method_desc_size(&self, index: u16) -> usize {
        self.method_desc.sizes[(index & 0x7F) as usize] as usize
    }
}

/// The mirrored engine build, x64 .NET 8.
pub static NET8_X64: BuildProfile = BuildProfile {
    name: "net8.0-x64",
    pointer_size: 8,
    os_page_size: 0x1000,
    method_desc: MethodDescLayout {
        flags3: Field::new(0x00),
        chunk_index: Field::new(0x02),
        flags4: Field::new(0x03),
        slot_number: Field::new(0x04),
        flags: Field::new(0x06),
        code_data: Field::new(0x08),
        alignment: 8,
        #[rustfmt::skip]
        sizes: [
            0x10, 0x18, 0x38, 0x20, 0x20, 0x28, 0x18, 0x30, 0x18, 0x20, 0x40, 0x28, 0x28, 0x30, 0x20, 0x38,
            0x20, 0x28, 0x48, 0x30, 0x30, 0x38, 0x28, 0x40, 0x28, 0x30, 0x50, 0x38, 0x38, 0x40, 0x30, 0x48,
            0x18, 0x20, 0x40, 0x28, 0x28, 0x30, 0x20, 0x38, 0x20, 0x28, 0x48, 0x30, 0x30, 0x38, 0x28, 0x40,
            0x28, 0x30, 0x50, 0x38, 0x38, 0x40, 0x30, 0x48, 0x30, 0x38, 0x58, 0x40, 0x40, 0x48, 0x38, 0x50,
            0x28, 0x30, 0x50, 0x38, 0x38, 0x40, 0x30, 0x48, 0x30, 0x38, 0x58, 0x40, 0x40, 0x48, 0x38, 0x50,
            0x38, 0x40, 0x60, 0x48, 0x48, 0x50, 0x40, 0x58, 0x40, 0x48, 0x68, 0x50, 0x50, 0x58, 0x48, 0x60,
            0x30, 0x38, 0x58, 0x40, 0x40, 0x48, 0x38, 0x50, 0x38, 0x40, 0x60, 0x48, 0x48, 0x50, 0x40, 0x58,
            0x40, 0x48, 0x68, 0x50, 0x50, 0x58, 0x48, 0x60, 0x48, 0x50, 0x70, 0x58, 0x58, 0x60, 0x50, 0x68,
        ],
    },
    instantiated_method_desc: InstantiatedMethodDescLayout {
        wrapped: Field::new(0x10),
        per_inst_info: Field::new(0x18),
        flags2: Field::new(0x20),
        num_generic_args: Field::new(0x22),
    },
    code_data: CodeDataLayout {
        versioning_state: Field::new(0x00),
        temporary_entry_point: Field::new(0x08),
    },
    chunk: ChunkLayout {
        method_table: Field::new(0x00),
        next: Field::new(0x08),
        size: Field::new(0x10),
        count: Field::new(0x11),
        flags_and_token_range: Field::new(0x12),
        header_size: 0x18,
    },
    method_table: MethodTableLayout {
        flags: Field::new(0x00),
        base_size: Field::new(0x04),
        flags2: Field::new(0x08),
        token: Field::new(0x0A),
        num_virtuals: Field::new(0x0C),
        num_interfaces: Field::new(0x0E),
        parent: Field::new(0x10),
        module: Field::new(0x18),
        auxiliary_data: Field::new(0x20),
        canonical: Field::new(0x28),
        per_inst_info: Field::new(0x30),
        interface_map: Field::new(0x38),
        vtable_indirections: FieldArray::new(0x40, 8),
        slots_per_indirection_log2: 3,
    },
    auxiliary_data: AuxiliaryDataLayout {
        flags: Field::new(0x00),
        offset_to_non_virtual_slots: Field::new(0x02),
        loader_module: Field::new(0x08),
        exposed_class_object: Field::new(0x10),
    },
    precode: PrecodeLayout {
        type_byte: Field::new(0x00),
        code_size: 24,
        fixup_code_offset: 6,
        min_stub_code_page_size: 0x4000,
    },
    stub_precode: StubPrecodeDataLayout {
        method_desc: Field::new(0x00),
        target: Field::new(0x08),
        type_byte: Field::new(0x10),
    },
    fixup_precode: FixupPrecodeDataLayout {
        target: Field::new(0x00),
        method_desc: Field::new(0x08),
        precode_fixup_thunk: Field::new(0x10),
    },
    module: ModuleLayout {
        vtable: Field::new(0x00),
        loader_allocator: Field::new(0x98),
        simple_name: Field::new(0xA8),
        pe_assembly: Field::new(0xB0),
        transient_flags: Field::new(0xB8),
        assembly: Field::new(0xC8),
        domain_local_module: Field::new(0x2E8),
    },
    pe_assembly: PeAssemblyLayout {
        md_import: Field::new(0x18),
    },
    assembly: AssemblyLayout {
        module: Field::new(0x18),
        is_dynamic: Field::new(0x30),
        is_collectible: Field::new(0x34),
        is_instrumented: Field::new(0x54),
    },
    app_domain: AppDomainLayout {
        assemblies: 0x4B8,
        root_assembly: Field::new(0x590),
    },
    array_list: ArrayListLayout {
        count: Field::new(0x00),
        first_next: Field::new(0x08),
        first_block_size: Field::new(0x10),
        first_elements: FieldArray::new(0x18, 8),
        block_next: Field::new(0x00),
        block_size: Field::new(0x08),
        block_elements: FieldArray::new(0x10, 8),
    },
    md_import: MdImportLayout {
        vtable: Field::new(0x00),
        mini_md: 0x10,
        enum_type_def_init: Field::new(0x20),
    },
    mini_md: MiniMdLayout {
        row_counts: FieldArray::new(0x08 + 0x18, 4),
        record_sizes: FieldArray::new(0xE0 + 0x0A, 0x10),
        table_data: FieldArray::new(0x3C0, 8),
        hot_tables: Field::new(0x528),
        method_def_impl_flags: Field::new(0x04),
    },
    hot_table: HotTableLayout {
        directory_offsets: FieldArray::new(0x04, 4),
        record_count: Field::new(0x00),
        first_level_offset: Field::new(0x04),
        second_level_offset: Field::new(0x08),
        hot_data_offset: Field::new(0x0C),
        shift: Field::new(0x10),
    },
    henum: HEnumLayout {
        kind: Field::new(0x00),
        count: Field::new(0x04),
        enum_type: Field::new(0x08),
        start: Field::new(0x0C),
        end: Field::new(0x10),
        current: Field::new(0x14),
        tokens: FieldArray::new(0x18, 4),
        size: 0x38,
    },
    host: HostLayout {
        runtime_method_handle: Field::new(0x50),
        dynamic_method_stub: Field::new(0x10),
        method_stub_handle: Field::new(0x50),
        runtime_type_handle: Field::new(0x18),
        array_length: Field::new(0x08),
        array_elements: FieldArray::new(0x10, 8),
    },
    image: ImageOffsets {
        app_domain: 0x48_8080,
        pre_stub: 0x15_F050,
        get_types: 0x9_6D14,
    },
};
