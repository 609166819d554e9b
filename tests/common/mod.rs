//! A fake engine built only through the public API.
//!
//! Structures are placed in a zeroed arena and filled through the field descriptors of
//! [`NET8_X64`], so the tests follow the profile instead of repeating its offsets.

#![allow(dead_code)]

use clrlive::{
    layout::{MethodDesc, MethodDescChunk, MethodTable, Module},
    prelude::*,
    probe::{io, EngineImage},
};

pub const APP_DOMAIN_SLOT: usize = 0x0000;
pub const METHOD_TABLE: usize = 0x0100;
pub const AUX_DATA: usize = 0x0300;
pub const VTABLE_CELLS: usize = 0x0400;
pub const NUM_VIRTUALS: u16 = 24;
pub const MODULE: usize = 0x0800;
pub const MODULE_NAME: usize = 0x0B00;
pub const PE_ASSEMBLY: usize = 0x0B80;
pub const MD_IMPORT: usize = 0x0C00;
pub const ASSEMBLY: usize = 0x1200;
pub const APP_DOMAIN: usize = 0x1300;
pub const METHOD_DEFS: usize = 0x1A00;
pub const METHOD_DEF_ROWS: u32 = 8;
pub const METHOD_DEF_RECORD_SIZE: usize = 14;
pub const CHUNK: usize = 0x1C00;
pub const CODE_DATA: usize = 0x1E00;
pub const OBJECTS: usize = 0x2000;
pub const ARENA_SIZE: usize = 0x3000;

/// Zeroed, 8-byte aligned memory
pub struct Arena {
    words: Box<[u64]>,
}

impl Arena {
    pub fn new(size: usize) -> Self {
        Arena {
            words: vec![0u64; size / 8].into_boxed_slice(),
        }
    }

    pub fn at(&self, offset: usize) -> Address {
        assert!(offset < self.words.len() * 8);
        Address::from(self.words.as_ptr()).add(offset)
    }
}

/// A fake engine with one type, one module and one chunk
pub struct World {
    pub engine: Engine,
    pub arena: Arena,
    methods: std::cell::Cell<usize>,
    chunk_bytes: std::cell::Cell<usize>,
}

impl World {
    pub fn new() -> Self {
        World::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let arena = Arena::new(ARENA_SIZE);
        let p = config.profile;
        let at = |offset| arena.at(offset);

        let image = EngineImage::new(at(APP_DOMAIN_SLOT).sub(p.image.app_domain), 0x50_0000);

        unsafe {
            io::write(at(APP_DOMAIN_SLOT), at(APP_DOMAIN));

            let table = at(METHOD_TABLE);
            p.method_table.num_virtuals.write(table, NUM_VIRTUALS);
            p.method_table.module.write(table, at(MODULE));
            p.method_table.auxiliary_data.write(table, at(AUX_DATA));
            for cell in 0..usize::from(NUM_VIRTUALS).div_ceil(8) {
                let indirection = p.method_table.vtable_indirections;
                io::write(
                    indirection.at(cell).address(table),
                    at(VTABLE_CELLS + cell * 8 * p.pointer_size),
                );
            }
            p.auxiliary_data.offset_to_non_virtual_slots.write(at(AUX_DATA), -0x20);
            p.auxiliary_data.loader_module.write(at(AUX_DATA), at(MODULE));

            let module = at(MODULE);
            p.module.simple_name.write(module, at(MODULE_NAME));
            io::write_bytes(at(MODULE_NAME), b"World.dll\0");
            p.module.pe_assembly.write(module, at(PE_ASSEMBLY));
            p.module.assembly.write(module, at(ASSEMBLY));
            p.module.loader_allocator.write(module, Address(0xA110_C000));
            p.pe_assembly.md_import.write(at(PE_ASSEMBLY), at(MD_IMPORT));

            let mini_md = at(MD_IMPORT).add(p.md_import.mini_md);
            let index = TableId::MethodDef.index();
            io::write(p.mini_md.row_counts.at(index).address(mini_md), METHOD_DEF_ROWS);
            io::write(
                p.mini_md.record_sizes.at(index).address(mini_md),
                METHOD_DEF_RECORD_SIZE as u16,
            );
            io::write(p.mini_md.table_data.at(index).address(mini_md), at(METHOD_DEFS));

            p.assembly.module.write(at(ASSEMBLY), at(MODULE));
            let list = at(APP_DOMAIN).add(p.app_domain.assemblies);
            p.array_list.count.write(list, 1);
            p.array_list.first_block_size.write(list, 1);
            io::write(p.array_list.first_elements.at(0).address(list), at(ASSEMBLY));
            p.app_domain.root_assembly.write(at(APP_DOMAIN), at(ASSEMBLY));

            p.chunk.method_table.write(at(CHUNK), at(METHOD_TABLE));
        }

        let engine = unsafe { Engine::with_image(image, config) };
        World {
            engine,
            arena,
            methods: std::cell::Cell::new(0),
            chunk_bytes: std::cell::Cell::new(0),
        }
    }

    /// Appends a descriptor with the given flag words to the chunk
    pub fn add_method(&self, slot: u16, remainder: u16, flags: MethodDescFlags) -> MethodDesc<'_> {
        let p = self.engine.profile();
        let offset = self.chunk_bytes.get();
        let index = self.methods.get();
        let address = self.arena.at(CHUNK + p.chunk.header_size + offset);

        unsafe {
            p.method_desc.flags3.write(address, remainder & 0x0FFF);
            p.method_desc.chunk_index.write(address, (offset / 8) as u8);
            p.method_desc.slot_number.write(address, slot);
            p.method_desc.flags.write(address, flags.bits());
            p.method_desc
                .code_data
                .write(address, self.arena.at(CODE_DATA + index * 0x10));

            let total = offset + p.method_desc_size(flags.bits());
            p.chunk.size.write(self.arena.at(CHUNK), (total / 8 - 1) as u8);
            p.chunk.count.write(self.arena.at(CHUNK), index as u8);
            self.chunk_bytes.set(total);
        }
        self.methods.set(index + 1);

        unsafe { self.engine.method_desc(address) }
    }

    pub fn chunk(&self) -> MethodDescChunk<'_> {
        unsafe { self.engine.method_desc_chunk(self.arena.at(CHUNK)) }
    }

    pub fn method_table(&self) -> MethodTable<'_> {
        unsafe { self.engine.method_table(self.arena.at(METHOD_TABLE)) }
    }

    pub fn module(&self) -> Module<'_> {
        unsafe { self.engine.module(self.arena.at(MODULE)) }
    }

    /// Address of virtual slot `slot`
    pub fn virtual_slot(&self, slot: u16) -> Address {
        self.arena.at(VTABLE_CELLS + usize::from(slot) * 8)
    }

    /// Writes the implementation flags of `MethodDef` row `rid`
    pub fn set_impl_flags(&self, rid: u32, flags: CorMethodImpl) {
        let row = self
            .arena
            .at(METHOD_DEFS + (rid as usize - 1) * METHOD_DEF_RECORD_SIZE);
        unsafe {
            self.engine
                .profile()
                .mini_md
                .method_def_impl_flags
                .write(row, flags.bits())
        };
    }
}
