//! Shared test fixtures.
//!
//! [`Fixture`] lays out a small but complete fake engine inside a zeroed [`FakeMemory`] arena: a
//! method table with virtual and non-virtual slots, a module with its PE assembly, importer and
//! metadata model, an assembly registered in an app domain, one method descriptor chunk and room
//! for precodes and host objects. The engine image is placed so that its app domain global lands
//! inside the arena. Every structure sits at a fixed offset listed in [`offsets`].

use std::{
    alloc::{self, Layout},
    cell::Cell,
    mem::size_of,
};

use crate::{
    layout::{Address, MethodDesc, MethodDescChunk, MethodTable, Module, NET8_X64},
    metadata::{import::MdImport, tableid::TableId, types::CorMethodImpl},
    precode::{Precode, PrecodeType},
    probe::{
        io::{self, RawIO},
        EngineImage,
    },
    Engine, EngineConfig,
};

/// Offsets of the fixture's structures inside the arena
pub mod offsets {
    /// Size of the arena
    pub const ARENA_SIZE: usize = 0x2_0000;

    /// Global app domain pointer of the fake image
    pub const APP_DOMAIN_SLOT: usize = 0x0F00;

    /// The method table
    pub const METHOD_TABLE: usize = 0x1000;
    /// Its auxiliary data
    pub const AUX_DATA: usize = 0x1200;
    /// Offset from the auxiliary data to the non-virtual slot anchor
    pub const NON_VIRTUAL_OFFSET: i16 = -0x10;
    /// Virtual slots, the indirection cells are laid out back to back
    pub const VTABLE_CELLS: usize = 0x1400;
    /// Number of virtual slots
    pub const NUM_VIRTUALS: u16 = 24;

    /// The module
    pub const MODULE: usize = 0x2000;
    /// Its simple name
    pub const MODULE_NAME: usize = 0x2400;
    /// Its loader allocator, never dereferenced
    pub const LOADER_ALLOCATOR: usize = 0x5A5A_0000;
    /// The PE assembly
    pub const PE_ASSEMBLY: usize = 0x2800;
    /// The metadata importer, the metadata model follows at +0x10
    pub const MD_IMPORT: usize = 0x2900;
    /// Virtual function table of the importer
    pub const IMPORTER_VTABLE: usize = 0x3000;

    /// The assembly
    pub const ASSEMBLY: usize = 0x3100;
    /// The app domain
    pub const APP_DOMAIN: usize = 0x3200;

    /// Cold `MethodDef` records
    pub const METHOD_DEF_DATA: usize = 0x4000;
    /// Rows of the `MethodDef` table
    pub const METHOD_DEF_ROWS: u32 = 16;
    /// Width of a `MethodDef` record
    pub const METHOD_DEF_RECORD_SIZE: usize = 14;
    /// Cold `TypeDef` records
    pub const TYPE_DEF_DATA: usize = 0x4200;
    /// Rows of the `TypeDef` table
    pub const TYPE_DEF_ROWS: u32 = 4;
    /// Width of a `TypeDef` record
    pub const TYPE_DEF_RECORD_SIZE: usize = 18;

    /// The method descriptor chunk
    pub const CHUNK: usize = 0x5000;
    /// Hot tables directory
    pub const HOT_TABLES: usize = 0x6000;
    /// Code data records, one per method, 0x10 apart
    pub const CODE_DATA: usize = 0x7000;

    /// Precode code, 24 bytes apart
    pub const PRECODE: usize = 0x8000;
    /// Distance of the precode data records from their code
    pub const STUB_CODE_PAGE: usize = 0x4000;

    /// Host objects
    pub const OBJECTS: usize = 0xD000;
    /// Free space for ad hoc structures
    pub const SPARE: usize = 0x1_0000;
}

/// HRESULT `E_FAIL`
const E_FAIL: i32 = 0x8000_4005_u32 as i32;

/// A zeroed, 16-byte aligned arena standing in for engine memory
pub struct FakeMemory {
    base: *mut u8,
    layout: Layout,
}

impl FakeMemory {
    /// Allocates a zeroed arena of `size` bytes
    pub fn new(size: usize) -> Self {
        let layout = Layout::from_size_align(size, 16).unwrap();
        let base = unsafe { alloc::alloc_zeroed(layout) };
        assert!(!base.is_null());
        FakeMemory { base, layout }
    }

    /// Address of the arena's first byte
    pub fn base(&self) -> Address {
        Address::from(self.base)
    }

    /// Address of `offset` inside the arena
    pub fn at(&self, offset: usize) -> Address {
        assert!(offset < self.layout.size(), "offset 0x{offset:x} outside the arena");
        self.base().add(offset)
    }

    /// Reads a value at `offset`
    pub fn read<T: RawIO>(&self, offset: usize) -> T {
        assert!(offset + size_of::<T>() <= self.layout.size());
        unsafe { io::read(self.at(offset)) }
    }

    /// Writes a value at `offset`
    pub fn write<T: RawIO>(&self, offset: usize, value: T) {
        assert!(offset + size_of::<T>() <= self.layout.size());
        unsafe { io::write(self.at(offset), value) }
    }

    /// Writes raw bytes at `offset`
    pub fn write_bytes(&self, offset: usize, bytes: &[u8]) {
        assert!(offset + bytes.len() <= self.layout.size());
        unsafe { io::write_bytes(self.at(offset), bytes) }
    }
}

impl Drop for FakeMemory {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.base, self.layout) };
    }
}

/// Fake type definition enumeration initializer, a simple range over `TypeDef` rows 2..=N
unsafe extern "system" fn enum_type_defs(_this: usize, cursor: usize) -> i32 {
    let cursor = Address(cursor);
    let henum = &NET8_X64.henum;
    let end = offsets::TYPE_DEF_ROWS as i32 + 1;

    unsafe {
        henum.kind.write(cursor, TableId::TypeDef.token_type() as i32);
        henum.count.write(cursor, end - 2);
        henum.enum_type.write(cursor, 0);
        henum.start.write(cursor, 2);
        henum.end.write(cursor, end);
        henum.current.write(cursor, 2);
    }
    0
}

unsafe extern "system" fn enum_type_defs_failing(_this: usize, _cursor: usize) -> i32 {
    E_FAIL
}

/// Description of a method descriptor added with [`Fixture::add_method`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodShape {
    pub slot: u16,
    pub token_remainder: u16,
    pub flags: u16,
    pub flags3: u16,
    pub flags4: u8,
    pub without_code_data: bool,
}

/// A fake engine laid out in a [`FakeMemory`] arena
pub struct Fixture {
    engine: Engine,
    memory: FakeMemory,
    methods: Cell<usize>,
    chunk_bytes: Cell<usize>,
}

impl Default for Fixture {
    fn default() -> Self {
        Fixture::new()
    }
}

impl Fixture {
    /// A fixture with token range 0 and the default configuration
    pub fn new() -> Self {
        Fixture::build(0, EngineConfig::default())
    }

    /// A fixture whose chunk has the token range `range`
    pub fn with_token_range(range: u16) -> Self {
        Fixture::build(range, EngineConfig::default())
    }

    /// A fixture whose engine context is created from `config`
    pub fn with_config(config: EngineConfig) -> Self {
        Fixture::build(0, config)
    }

    fn build(token_range: u16, config: EngineConfig) -> Self {
        use offsets::*;

        let memory = FakeMemory::new(ARENA_SIZE);
        let profile = config.profile;

        // Place the image so that its app domain global is inside the arena
        let image = EngineImage::new(
            memory.at(APP_DOMAIN_SLOT).sub(profile.image.app_domain),
            0x50_0000,
        );
        memory.write(APP_DOMAIN_SLOT, memory.at(APP_DOMAIN));

        // Method table, auxiliary data and virtual slot cells
        memory.write(METHOD_TABLE + 0x0C, NUM_VIRTUALS);
        memory.write(METHOD_TABLE + 0x18, memory.at(MODULE));
        memory.write(METHOD_TABLE + 0x20, memory.at(AUX_DATA));
        for cell in 0..usize::from(NUM_VIRTUALS).div_ceil(8) {
            memory.write(METHOD_TABLE + 0x40 + cell * 8, memory.at(VTABLE_CELLS + cell * 0x40));
        }
        memory.write(AUX_DATA + 0x02, NON_VIRTUAL_OFFSET);
        memory.write(AUX_DATA + 0x08, memory.at(MODULE));

        // Module, PE assembly and importer
        memory.write(MODULE + 0x98, Address(LOADER_ALLOCATOR));
        memory.write(MODULE + 0xA8, memory.at(MODULE_NAME));
        memory.write_bytes(MODULE_NAME, b"Fixture.dll\0");
        memory.write(MODULE + 0xB0, memory.at(PE_ASSEMBLY));
        memory.write(MODULE + 0xC8, memory.at(ASSEMBLY));
        memory.write(PE_ASSEMBLY + 0x18, memory.at(MD_IMPORT));
        memory.write(MD_IMPORT, memory.at(IMPORTER_VTABLE));
        memory.write(IMPORTER_VTABLE + 0x20, Address(enum_type_defs as usize));

        // Metadata model
        let mini_md = MD_IMPORT + 0x10;
        for (table, rows, record_size, data) in [
            (TableId::TypeDef, TYPE_DEF_ROWS, TYPE_DEF_RECORD_SIZE, TYPE_DEF_DATA),
            (TableId::MethodDef, METHOD_DEF_ROWS, METHOD_DEF_RECORD_SIZE, METHOD_DEF_DATA),
        ] {
            let index = table.index();
            memory.write(mini_md + 0x20 + index * 4, rows);
            memory.write(mini_md + 0xEA + index * 0x10, record_size as u16);
            memory.write(mini_md + 0x3C0 + index * 8, memory.at(data));
        }
        // Distinguishable names in each MethodDef row
        for row in 0..METHOD_DEF_ROWS as usize {
            memory.write(METHOD_DEF_DATA + row * METHOD_DEF_RECORD_SIZE + 8, row as u16 + 1);
        }

        // Assembly and app domain
        memory.write(ASSEMBLY + 0x18, memory.at(MODULE));
        memory.write(ASSEMBLY + 0x34, 1u8);
        let list = APP_DOMAIN + 0x4B8;
        memory.write(list, 1i32);
        memory.write(list + 0x10, 4i32);
        memory.write(list + 0x18, memory.at(ASSEMBLY));
        memory.write(APP_DOMAIN + 0x590, memory.at(ASSEMBLY));

        // Empty chunk attached to the method table
        memory.write(CHUNK, memory.at(METHOD_TABLE));
        memory.write(CHUNK + 0x12, token_range & 0x0FFF);

        let engine = unsafe { Engine::with_image(image, config) };

        Fixture {
            engine,
            memory,
            methods: Cell::new(0),
            chunk_bytes: Cell::new(0),
        }
    }

    /// The engine context
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// The arena
    pub fn memory(&self) -> &FakeMemory {
        &self.memory
    }

    /// Appends a method descriptor to the chunk
    pub fn add_method(&self, shape: MethodShape) -> MethodDesc<'_> {
        let offset = self.chunk_bytes.get();
        let index = self.methods.get();
        let at = offsets::CHUNK + 0x18 + offset;

        let flags3 = (shape.flags3 & !0x0FFF) | (shape.token_remainder & 0x0FFF);
        self.memory.write(at, flags3);
        self.memory.write(at + 0x02, (offset / 8) as u8);
        self.memory.write(at + 0x03, shape.flags4);
        self.memory.write(at + 0x04, shape.slot);
        self.memory.write(at + 0x06, shape.flags);
        if !shape.without_code_data {
            let code_data = self.memory.at(offsets::CODE_DATA + index * 0x10);
            self.memory.write(at + 0x08, code_data);
        }

        let size = self.engine.profile().method_desc_size(shape.flags);
        let total = offset + size;
        self.memory.write(offsets::CHUNK + 0x10, (total / 8 - 1) as u8);
        self.memory.write(offsets::CHUNK + 0x11, index as u8);
        self.chunk_bytes.set(total);
        self.methods.set(index + 1);

        unsafe { MethodDesc::new(&self.engine, self.memory.at(at)) }
    }

    /// The method descriptor chunk
    pub fn chunk(&self) -> MethodDescChunk<'_> {
        unsafe { MethodDescChunk::new(&self.engine, self.chunk_address()) }
    }

    /// Address of the method descriptor chunk
    pub fn chunk_address(&self) -> Address {
        self.memory.at(offsets::CHUNK)
    }

    /// The method table
    pub fn method_table(&self) -> MethodTable<'_> {
        unsafe { MethodTable::new(&self.engine, self.method_table_address()) }
    }

    /// Address of the method table
    pub fn method_table_address(&self) -> Address {
        self.memory.at(offsets::METHOD_TABLE)
    }

    /// The module
    pub fn module(&self) -> Module<'_> {
        unsafe { Module::new(&self.engine, self.module_address()) }
    }

    /// Address of the module
    pub fn module_address(&self) -> Address {
        self.memory.at(offsets::MODULE)
    }

    /// The metadata importer
    pub fn md_import(&self) -> MdImport<'_> {
        unsafe { MdImport::new(&self.engine, self.memory.at(offsets::MD_IMPORT)) }
    }

    /// Address of virtual slot `slot`
    pub fn virtual_slot_address(&self, slot: u16) -> Address {
        assert!(slot < offsets::NUM_VIRTUALS);
        self.memory.at(offsets::VTABLE_CELLS + usize::from(slot) * 8)
    }

    /// Stores `value` in virtual slot `slot`
    pub fn set_virtual_slot(&self, slot: u16, value: Address) {
        unsafe { io::write(self.virtual_slot_address(slot), value) };
    }

    /// Writes the instantiation kind of an instantiated descriptor
    pub fn set_instantiation_kind(&self, method: MethodDesc<'_>, kind: u16) {
        unsafe { io::write(method.address().add(0x20), kind) };
    }

    /// Writes the implementation flags of `MethodDef` row `rid`
    pub fn set_method_impl_flags(&self, rid: u32, flags: CorMethodImpl) {
        assert!(rid >= 1 && rid <= offsets::METHOD_DEF_ROWS);
        let row = offsets::METHOD_DEF_DATA + (rid as usize - 1) * offsets::METHOD_DEF_RECORD_SIZE;
        self.memory.write(row + 0x04, flags.bits());
    }

    fn install_method_def_hot_table(&self, header: &[(usize, u32)]) -> Address {
        let directory = offsets::HOT_TABLES;
        let table = 0x100;
        self.memory.write(offsets::MD_IMPORT + 0x10 + 0x528, self.memory.at(directory));
        self.memory
            .write(directory + 0x04 + TableId::MethodDef.index() * 4, table as i32);
        for (offset, value) in header {
            self.memory.write(directory + table + offset, *value);
        }
        self.memory.at(directory + table + 0x80)
    }

    fn copy_cold_rows(&self, hot_data: Address, rows: &[u32]) {
        let size = offsets::METHOD_DEF_RECORD_SIZE;
        for (index, row) in rows.iter().enumerate() {
            let cold = self
                .memory
                .at(offsets::METHOD_DEF_DATA + (*row as usize - 1) * size);
            unsafe { io::copy(hot_data.add(index * size), cold, size) };
        }
    }

    /// Makes `MethodDef` rows `1..=count` hot in a dense table, returns the hot data
    pub fn install_dense_hot_method_defs(&self, count: u32) -> Address {
        let hot_data = self.install_method_def_hot_table(&[(0x00, count), (0x0C, 0x80)]);
        let rows: Vec<u32> = (1..=count).collect();
        self.copy_cold_rows(hot_data, &rows);
        hot_data
    }

    /// Makes `rows` hot in a hashed table with 4 buckets, returns the hot data.
    ///
    /// Hot records are ordered by bucket, rows of the same bucket keep their order.
    pub fn install_hashed_hot_method_defs(&self, rows: &[u32]) -> Address {
        const SHIFT: u32 = 2;
        let buckets = 1usize << SHIFT;

        let mut ordered = rows.to_vec();
        ordered.sort_by_key(|row| row & (buckets as u32 - 1));

        let hot_data = self.install_method_def_hot_table(&[
            (0x00, ordered.len() as u32),
            (0x04, 0x20),
            (0x08, 0x40),
            (0x0C, 0x80),
        ]);
        let header = offsets::HOT_TABLES + 0x100;
        self.memory.write(header + 0x10, SHIFT as u16);

        let mut start = 0u16;
        for bucket in 0..buckets {
            self.memory.write(header + 0x20 + bucket * 2, start);
            start += ordered
                .iter()
                .filter(|row| (**row as usize & (buckets - 1)) == bucket)
                .count() as u16;
        }
        self.memory.write(header + 0x20 + buckets * 2, start);

        for (index, row) in ordered.iter().enumerate() {
            self.memory.write(header + 0x40 + index, (row >> SHIFT) as u8);
        }

        self.copy_cold_rows(hot_data, &ordered);
        hot_data
    }

    /// Makes the importer's type definition enumeration initializer fail
    pub fn fail_type_def_enumeration(&self) {
        self.memory.write(
            offsets::IMPORTER_VTABLE + 0x20,
            Address(enum_type_defs_failing as usize),
        );
    }

    /// The precode slot `index`, with whatever its memory holds
    pub fn precode(&self, index: usize) -> Precode<'_> {
        let code = self.memory.at(offsets::PRECODE + index * 24);
        unsafe { Precode::new(&self.engine, code) }
    }

    /// Writes a redirect stub into precode slot `index`
    pub fn stub_precode(&self, index: usize, method: MethodDesc<'_>, target: Address) -> Precode<'_> {
        let code = offsets::PRECODE + index * 24;
        let data = code + offsets::STUB_CODE_PAGE;
        self.memory.write(code, PrecodeType::Stub as u8);
        self.memory.write(data, method.address());
        self.memory.write(data + 0x08, target);
        self.memory.write(data + 0x10, PrecodeType::Stub as u8);
        self.precode(index)
    }

    /// Writes a fixup stub into precode slot `index`
    pub fn fixup_precode(&self, index: usize, method: MethodDesc<'_>, target: Address) -> Precode<'_> {
        let code = offsets::PRECODE + index * 24;
        let data = code + offsets::STUB_CODE_PAGE;
        self.memory.write(code, PrecodeType::Fixup as u8);
        self.memory.write(data, target);
        self.memory.write(data + 0x08, method.address());
        self.memory.write(data + 0x10, self.engine.pre_stub());
        self.precode(index)
    }

    /// Stores `entry_point` as the temporary entry point of `method`'s code data
    pub fn set_code_data_entry_point(&self, method: MethodDesc<'_>, entry_point: Address) {
        let code_data = method.code_data().unwrap();
        unsafe { io::write(code_data.address().add(0x08), entry_point) };
    }

    /// Clears the chunk's method table pointer
    pub fn detach_method_table(&self) {
        self.memory.write(offsets::CHUNK, Address::NULL);
    }
}
