//! Overlays for modules, assemblies and the app domain that owns them.

use crate::{
    layout::{types::ModuleTransientFlags, Address},
    metadata::import::MdImport,
    probe::io,
    Result,
};

overlay! {
    /// A loaded module
    Module
}

impl<'e> Module<'e> {
    /// Virtual function table
    #[must_use]
    pub fn vtable(&self) -> Address {
        read_field!(self, module.vtable)
    }

    /// Loader allocator
    #[must_use]
    pub fn loader_allocator(&self) -> Address {
        read_field!(self, module.loader_allocator)
    }

    /// Simple name, `None` if the name pointer is null
    #[must_use]
    pub fn simple_name(&self) -> Option<String> {
        let address: Address = read_field!(self, module.simple_name);
        address
            .non_null()
            .map(|address| unsafe { io::read_c_str(address) })
    }

    /// Transient flags
    #[must_use]
    pub fn transient_flags(&self) -> ModuleTransientFlags {
        ModuleTransientFlags::from_bits_retain(read_field!(self, module.transient_flags))
    }

    /// Created through reflection emit
    #[must_use]
    pub fn is_reflection_emit(&self) -> bool {
        self.transient_flags()
            .contains(ModuleTransientFlags::IS_REFLECTION_EMIT)
    }

    /// The PE assembly backing the module
    #[must_use]
    pub fn pe_assembly(&self) -> Option<PeAssembly<'e>> {
        let address: Address = read_field!(self, module.pe_assembly);
        address
            .non_null()
            .map(|address| unsafe { PeAssembly::new(self.engine(), address) })
    }

    /// Owning assembly
    #[must_use]
    pub fn assembly(&self) -> Option<Assembly<'e>> {
        let address: Address = read_field!(self, module.assembly);
        address
            .non_null()
            .map(|address| unsafe { Assembly::new(self.engine(), address) })
    }

    /// Domain-local module
    #[must_use]
    pub fn domain_local_module(&self) -> Address {
        read_field!(self, module.domain_local_module)
    }

    /// The module's metadata importer
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for reflection-emit modules, whose importer lives in
    /// the writable emit scope, and [`crate::Error::Precondition`] if the module has no PE assembly
    /// or the PE assembly has no importer.
    pub fn md_import(&self) -> Result<MdImport<'e>> {
        if self.is_reflection_emit() {
            return Err(unsupported_error!(
                "Metadata importer of reflection-emit module {}",
                self.address()
            ));
        }

        match self.pe_assembly() {
            Some(pe_assembly) => pe_assembly.md_import(),
            None => Err(precondition_error!(
                "Module at {} has no PE assembly",
                self.address()
            )),
        }
    }
}

overlay! {
    /// The PE image backing a module
    PeAssembly
}

impl<'e> PeAssembly<'e> {
    /// The metadata importer of the image
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if no importer was opened.
    pub fn md_import(&self) -> Result<MdImport<'e>> {
        let address: Address = read_field!(self, pe_assembly.md_import);
        match address.non_null() {
            Some(address) => Ok(unsafe { MdImport::new(self.engine(), address) }),
            None => Err(precondition_error!(
                "PE assembly at {} has no metadata importer",
                self.address()
            )),
        }
    }
}

overlay! {
    /// A loaded assembly
    Assembly
}

impl<'e> Assembly<'e> {
    /// The manifest module
    #[must_use]
    pub fn module(&self) -> Option<Module<'e>> {
        let address: Address = read_field!(self, assembly.module);
        address
            .non_null()
            .map(|address| unsafe { Module::new(self.engine(), address) })
    }

    /// Created through reflection emit
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        let value: u8 = read_field!(self, assembly.is_dynamic);
        value != 0
    }

    /// Loaded into a collectible context
    #[must_use]
    pub fn is_collectible(&self) -> bool {
        let value: u8 = read_field!(self, assembly.is_collectible);
        value != 0
    }

    /// Instrumented by a profiler
    #[must_use]
    pub fn is_instrumented(&self) -> bool {
        let value: u8 = read_field!(self, assembly.is_instrumented);
        value != 0
    }
}

overlay! {
    /// The process-wide app domain
    AppDomain
}

impl<'e> AppDomain<'e> {
    /// The list of loaded assemblies
    #[must_use]
    pub fn assembly_list(&self) -> ArrayList<'e> {
        let offset = self.engine().profile().app_domain.assemblies;
        unsafe { ArrayList::new(self.engine(), self.address().add(offset)) }
    }

    /// Iterates the loaded assemblies
    pub fn assemblies(&self) -> impl Iterator<Item = Assembly<'e>> + 'e {
        let engine = self.engine();
        self.assembly_list()
            .iter()
            .filter_map(Address::non_null)
            .map(move |address| unsafe { Assembly::new(engine, address) })
    }

    /// The root assembly
    #[must_use]
    pub fn root_assembly(&self) -> Option<Assembly<'e>> {
        let address: Address = read_field!(self, app_domain.root_assembly);
        address
            .non_null()
            .map(|address| unsafe { Assembly::new(self.engine(), address) })
    }
}

overlay! {
    /// The engine's block-linked pointer list
    ArrayList
}

impl<'e> ArrayList<'e> {
    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        let count: i32 = read_field!(self, array_list.count);
        usize::try_from(count).unwrap_or(0)
    }

    /// Returns true if the list holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the elements, the inline first block then each linked block
    #[must_use]
    pub fn iter(&self) -> ArrayListIter<'e> {
        let layout = &self.engine().profile().array_list;
        let block_size: i32 = read_field!(self, array_list.first_block_size);

        ArrayListIter {
            engine: self.engine(),
            remaining: self.len(),
            elements: layout.first_elements.at(0).address(self.address()),
            index: 0,
            block_size: usize::try_from(block_size).unwrap_or(0),
            next_block: read_field!(self, array_list.first_next),
        }
    }
}

/// Iterator over the elements of an [`ArrayList`]
#[derive(Debug, Clone)]
pub struct ArrayListIter<'e> {
    engine: &'e crate::Engine,
    remaining: usize,
    elements: Address,
    index: usize,
    block_size: usize,
    next_block: Address,
}

impl Iterator for ArrayListIter<'_> {
    type Item = Address;

    fn next(&mut self) -> Option<Self::Item> {
        let layout = &self.engine.profile().array_list;

        while self.remaining > 0 {
            if self.index < self.block_size {
                let element = unsafe {
                    io::read_ptr(
                        self.elements
                            .add(self.index * layout.block_elements.stride()),
                    )
                };
                self.index += 1;
                self.remaining -= 1;
                return Some(element);
            }

            let block = self.next_block.non_null()?;
            let block_size = unsafe { layout.block_size.read(block) };
            self.elements = layout.block_elements.at(0).address(block);
            self.block_size = usize::try_from(block_size).unwrap_or(0);
            self.next_block = unsafe { layout.block_next.read(block) };
            self.index = 0;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        layout::{types::ModuleTransientFlags, Address, ArrayList},
        test::{offsets, Fixture},
        Error,
    };

    #[test]
    fn module_fields() {
        let fixture = Fixture::new();
        let module = fixture.module();

        assert_eq!(module.simple_name().as_deref(), Some("Fixture.dll"));
        assert_eq!(module.loader_allocator(), Address(offsets::LOADER_ALLOCATOR));
        assert!(!module.is_reflection_emit());
        assert_eq!(
            module.pe_assembly().map(|p| p.address()),
            Some(fixture.memory().at(offsets::PE_ASSEMBLY))
        );
        assert_eq!(
            module.md_import().unwrap().address(),
            fixture.memory().at(offsets::MD_IMPORT)
        );
        assert_eq!(
            module.assembly().map(|a| a.address()),
            Some(fixture.memory().at(offsets::ASSEMBLY))
        );
    }

    #[test]
    fn reflection_emit_importer_is_unsupported() {
        let fixture = Fixture::new();
        fixture.memory().write::<u32>(
            offsets::MODULE + 0xB8,
            ModuleTransientFlags::IS_REFLECTION_EMIT.bits() | 0x1,
        );

        let module = fixture.module();
        assert!(module.is_reflection_emit());
        assert!(matches!(module.md_import(), Err(Error::Unsupported { .. })));
    }

    #[test]
    fn missing_pe_assembly() {
        let fixture = Fixture::new();
        fixture
            .memory()
            .write::<Address>(offsets::MODULE + 0xB0, Address::NULL);

        assert!(matches!(
            fixture.module().md_import(),
            Err(Error::Precondition { .. })
        ));
    }

    #[test]
    fn assembly_fields() {
        let fixture = Fixture::new();
        let assembly = fixture.module().assembly().unwrap();

        assert_eq!(assembly.module(), Some(fixture.module()));
        assert!(!assembly.is_dynamic());
        assert!(assembly.is_collectible());
        assert!(!assembly.is_instrumented());
    }

    #[test]
    fn app_domain_assemblies() {
        let fixture = Fixture::new();
        let domain = fixture.engine().app_domain().unwrap();

        assert_eq!(
            domain.root_assembly().map(|a| a.address()),
            Some(fixture.memory().at(offsets::ASSEMBLY))
        );

        let assemblies: Vec<_> = domain.assemblies().map(|a| a.address()).collect();
        assert_eq!(assemblies, vec![fixture.memory().at(offsets::ASSEMBLY)]);
    }

    #[test]
    fn array_list_spans_blocks() {
        let fixture = Fixture::new();
        let memory = fixture.memory();

        // 5 inline elements, then a block of 4 of which 2 are used
        let list = offsets::SPARE;
        let block = offsets::SPARE + 0x100;
        memory.write::<i32>(list, 7);
        memory.write::<Address>(list + 0x08, memory.at(block));
        memory.write::<i32>(list + 0x10, 5);
        for i in 0..5 {
            memory.write::<Address>(list + 0x18 + i * 8, Address(0x100 + i));
        }
        memory.write::<Address>(block, Address::NULL);
        memory.write::<i32>(block + 0x08, 4);
        for i in 0..4 {
            memory.write::<Address>(block + 0x10 + i * 8, Address(0x200 + i));
        }

        let list = unsafe { ArrayList::new(fixture.engine(), memory.at(list)) };
        assert_eq!(list.len(), 7);
        assert!(!list.is_empty());

        let values: Vec<_> = list.iter().map(|a| a.value()).collect();
        assert_eq!(values, vec![0x100, 0x101, 0x102, 0x103, 0x104, 0x200, 0x201]);
    }

    #[test]
    fn array_list_stops_at_missing_block() {
        let fixture = Fixture::new();
        let memory = fixture.memory();

        let list = offsets::SPARE;
        memory.write::<i32>(list, 9);
        memory.write::<i32>(list + 0x10, 5);

        let list = unsafe { ArrayList::new(fixture.engine(), memory.at(list)) };
        assert_eq!(list.iter().count(), 5);
    }
}
