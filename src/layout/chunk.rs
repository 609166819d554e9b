use crate::{
    layout::{types::ChunkFlags, Address, MethodDesc, MethodTable, Module},
    probe::io,
};

overlay! {
    /// A method descriptor chunk.
    ///
    /// Descriptors are allocated in runs sharing one method table and one 12-bit token range. The
    /// chunk header precedes the first descriptor, the descriptors follow back to back with sizes
    /// given by their flags, and an optional loader module pointer trails the descriptor area.
    MethodDescChunk
}

impl<'e> MethodDescChunk<'e> {
    /// The owning method table, `None` if not attached yet
    #[must_use]
    pub fn method_table(&self) -> Option<MethodTable<'e>> {
        let address: Address = read_field!(self, chunk.method_table);
        address
            .non_null()
            .map(|address| unsafe { MethodTable::new(self.engine(), address) })
    }

    /// The next chunk of the same method table
    #[must_use]
    pub fn next(&self) -> Option<MethodDescChunk<'e>> {
        let address: Address = read_field!(self, chunk.next);
        address
            .non_null()
            .map(|address| unsafe { MethodDescChunk::new(self.engine(), address) })
    }

    /// Raw size field, the size of the descriptor area in pointer-sized units minus one
    #[must_use]
    pub fn size(&self) -> u8 {
        read_field!(self, chunk.size)
    }

    /// Number of descriptors in the chunk
    #[must_use]
    pub fn count(&self) -> usize {
        let count: u8 = read_field!(self, chunk.count);
        usize::from(count) + 1
    }

    /// Flags, including the token range
    #[must_use]
    pub fn flags(&self) -> ChunkFlags {
        ChunkFlags::from_bits_retain(read_field!(self, chunk.flags_and_token_range))
    }

    /// High 12 bits of the method definition tokens of the chunk
    #[must_use]
    pub fn token_range(&self) -> u16 {
        self.flags().token_range()
    }

    /// The loader module pointer is stored after the descriptor area
    #[must_use]
    pub fn is_loader_module_attached(&self) -> bool {
        self.flags()
            .contains(ChunkFlags::LOADER_MODULE_ATTACHED_TO_CHUNK)
    }

    /// Tiering eligibility was determined for all descriptors of the chunk
    #[must_use]
    pub fn determined_tiering_eligibility(&self) -> bool {
        self.flags()
            .contains(ChunkFlags::DETERMINED_IS_ELIGIBLE_FOR_TIERED_COMPILATION)
    }

    /// Atomically sets `bits` in the chunk flags
    pub(crate) fn set_flags(&self, bits: ChunkFlags) {
        let field = self.engine().profile().chunk.flags_and_token_range;
        unsafe { io::fetch_or_u16(field.address(self.address()), bits.bits()) };
    }

    /// Size of the chunk in bytes, header and trailing loader module included
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let profile = self.engine().profile();
        let attached = if self.is_loader_module_attached() {
            profile.pointer_size
        } else {
            0
        };

        profile.chunk.header_size + (usize::from(self.size()) + 1) * profile.method_desc.alignment + attached
    }

    /// The module whose loader allocated the chunk.
    ///
    /// The pointer stored in the chunk's last word if attached, the method table's loader module
    /// otherwise.
    #[must_use]
    pub fn loader_module(&self) -> Option<Module<'e>> {
        if self.is_loader_module_attached() {
            let slot = self
                .address()
                .add(self.byte_size() - self.engine().profile().pointer_size);
            let address = unsafe { io::read_ptr(slot) };
            return address
                .non_null()
                .map(|address| unsafe { Module::new(self.engine(), address) });
        }

        self.method_table().and_then(|table| table.loader_module())
    }

    /// The first descriptor, directly after the header
    #[must_use]
    pub fn first_method_desc(&self) -> MethodDesc<'e> {
        let header = self.engine().profile().chunk.header_size;
        unsafe { MethodDesc::new(self.engine(), self.address().add(header)) }
    }

    /// Iterates the descriptors of the chunk
    #[must_use]
    pub fn method_descs(&self) -> MethodDescs<'e> {
        MethodDescs {
            next: Some(self.first_method_desc()),
            remaining: self.count(),
        }
    }
}

/// Iterator over the descriptors of a [`MethodDescChunk`]
#[derive(Debug, Clone)]
pub struct MethodDescs<'e> {
    next: Option<MethodDesc<'e>>,
    remaining: usize,
}

impl<'e> Iterator for MethodDescs<'e> {
    type Item = MethodDesc<'e>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let current = self.next?;
        self.remaining -= 1;
        self.next = Some(unsafe {
            MethodDesc::new(current.engine(), current.address().add(current.size()))
        });
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for MethodDescs<'_> {}

#[cfg(test)]
mod tests {
    use crate::{
        layout::{types::ChunkFlags, Address, MethodDescChunk},
        test::{offsets, Fixture, MethodShape},
    };

    #[test]
    fn header_fields() {
        let fixture = Fixture::with_token_range(0x0ABC);
        fixture.add_method(MethodShape::default());
        fixture.add_method(MethodShape::default());

        let chunk = fixture.chunk();
        assert_eq!(chunk.token_range(), 0x0ABC);
        assert_eq!(chunk.count(), 2);
        assert_eq!(chunk.size(), 3);
        assert_eq!(chunk.byte_size(), 0x18 + 0x20);
        assert!(!chunk.is_loader_module_attached());
        assert!(!chunk.determined_tiering_eligibility());
        assert!(chunk.next().is_none());
        assert_eq!(
            chunk.method_table().map(|t| t.address()),
            Some(fixture.method_table_address())
        );
    }

    #[test]
    fn iterates_variable_sized_descriptors() {
        let fixture = Fixture::new();
        let a = fixture.add_method(MethodShape::default());
        let b = fixture.add_method(MethodShape {
            flags: 0x0028,
            ..MethodShape::default()
        });
        let c = fixture.add_method(MethodShape {
            flags: 0x0005,
            ..MethodShape::default()
        });
        let d = fixture.add_method(MethodShape::default());

        let chunk = fixture.chunk();
        assert_eq!(chunk.first_method_desc(), a);

        let all: Vec<_> = chunk.method_descs().collect();
        assert_eq!(all, vec![a, b, c, d]);
        assert_eq!(chunk.method_descs().len(), 4);

        for method in &all {
            assert_eq!(method.chunk(), chunk);
        }
    }

    #[test]
    fn loader_module_fallback() {
        let fixture = Fixture::new();
        fixture.add_method(MethodShape::default());

        let chunk = fixture.chunk();
        assert_eq!(
            chunk.loader_module().map(|m| m.address()),
            Some(fixture.module_address())
        );
    }

    #[test]
    fn loader_module_attached() {
        let fixture = Fixture::new();
        let memory = fixture.memory();

        // A standalone chunk: one 16-byte descriptor followed by the loader module
        let chunk_offset = offsets::SPARE;
        memory.write::<Address>(chunk_offset, fixture.method_table_address());
        memory.write::<u8>(chunk_offset + 0x10, 1);
        memory.write::<u8>(chunk_offset + 0x11, 0);
        memory.write::<u16>(
            chunk_offset + 0x12,
            ChunkFlags::LOADER_MODULE_ATTACHED_TO_CHUNK.bits(),
        );
        memory.write::<Address>(chunk_offset + 0x28, Address(0xBEEF_0000));

        let chunk = unsafe { MethodDescChunk::new(fixture.engine(), memory.at(chunk_offset)) };
        assert!(chunk.is_loader_module_attached());
        assert_eq!(chunk.byte_size(), 0x30);
        assert_eq!(
            chunk.loader_module().map(|m| m.address()),
            Some(Address(0xBEEF_0000))
        );
    }

    #[test]
    fn determined_flag() {
        let fixture = Fixture::with_token_range(0x0123);
        let chunk = fixture.chunk();

        chunk.set_flags(ChunkFlags::DETERMINED_IS_ELIGIBLE_FOR_TIERED_COMPILATION);
        assert!(chunk.determined_tiering_eligibility());
        assert_eq!(chunk.token_range(), 0x0123);
    }
}
