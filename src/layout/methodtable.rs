use crate::{
    layout::{Address, Module},
    probe::io,
    Result,
};

overlay! {
    /// A method table, the engine's runtime representation of a type.
    ///
    /// Virtual slots are reached through indirection cells that trail the header, each cell
    /// covering eight slots. Non-virtual slots live in an array that grows downwards from an
    /// anchor inside the [`AuxiliaryData`].
    MethodTable
}

impl<'e> MethodTable<'e> {
    /// Low flags
    #[must_use]
    pub fn flags(&self) -> u32 {
        read_field!(self, method_table.flags)
    }

    /// Base instance size
    #[must_use]
    pub fn base_size(&self) -> u32 {
        read_field!(self, method_table.base_size)
    }

    /// Type definition token remainder
    #[must_use]
    pub fn token_remainder(&self) -> u16 {
        read_field!(self, method_table.token)
    }

    /// Number of virtual slots
    #[must_use]
    pub fn num_virtuals(&self) -> u16 {
        read_field!(self, method_table.num_virtuals)
    }

    /// Number of implemented interfaces
    #[must_use]
    pub fn num_interfaces(&self) -> u16 {
        read_field!(self, method_table.num_interfaces)
    }

    /// Parent type
    #[must_use]
    pub fn parent(&self) -> Option<MethodTable<'e>> {
        let address: Address = read_field!(self, method_table.parent);
        address
            .non_null()
            .map(|address| unsafe { MethodTable::new(self.engine(), address) })
    }

    /// Owning module
    #[must_use]
    pub fn module(&self) -> Option<Module<'e>> {
        let address: Address = read_field!(self, method_table.module);
        address
            .non_null()
            .map(|address| unsafe { Module::new(self.engine(), address) })
    }

    /// Auxiliary data
    #[must_use]
    pub fn auxiliary_data(&self) -> Option<AuxiliaryData<'e>> {
        let address: Address = read_field!(self, method_table.auxiliary_data);
        address
            .non_null()
            .map(|address| unsafe { AuxiliaryData::new(self.engine(), address) })
    }

    /// Loader module, taken from the auxiliary data
    #[must_use]
    pub fn loader_module(&self) -> Option<Module<'e>> {
        self.auxiliary_data().and_then(|aux| aux.loader_module())
    }

    /// Index of the indirection cell holding virtual slot `slot`
    #[must_use]
    pub fn vtable_indirection_index(&self, slot: u16) -> usize {
        usize::from(slot) >> self.engine().profile().method_table.slots_per_indirection_log2
    }

    /// Index of virtual slot `slot` inside its indirection cell
    #[must_use]
    pub fn index_after_vtable_indirection(&self, slot: u16) -> usize {
        let per_cell = 1usize << self.engine().profile().method_table.slots_per_indirection_log2;
        usize::from(slot) & (per_cell - 1)
    }

    /// Anchor of the non-virtual slot array
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the method table has no auxiliary data.
    pub fn non_virtual_slots(&self) -> Result<Address> {
        match self.auxiliary_data() {
            Some(aux) => Ok(aux.non_virtual_slots()),
            None => Err(precondition_error!(
                "Method table at {} has no auxiliary data",
                self.address()
            )),
        }
    }

    /// Address of dispatch slot `slot`.
    ///
    /// Virtual slots resolve through the indirection cell `slot / 8` at position `slot % 8`.
    /// Non-virtual slot `slot` is element `1 + (slot - num_virtuals)` below the non-virtual anchor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] for a non-virtual slot of a method table without
    /// auxiliary data.
    pub fn slot_ptr(&self, slot: u16) -> Result<Address> {
        let profile = self.engine().profile();
        let num_virtuals = self.num_virtuals();

        if slot < num_virtuals {
            let cell = unsafe {
                profile
                    .method_table
                    .vtable_indirections
                    .read(self.address(), self.vtable_indirection_index(slot))
            };
            return Ok(cell.add(self.index_after_vtable_indirection(slot) * profile.pointer_size));
        }

        let index = 1 + usize::from(slot - num_virtuals);
        Ok(self.non_virtual_slots()?.sub(index * profile.pointer_size))
    }

    /// Value of dispatch slot `slot`
    ///
    /// # Errors
    /// Same as [`MethodTable::slot_ptr`].
    pub fn slot(&self, slot: u16) -> Result<Address> {
        let pointer = self.slot_ptr(slot)?;
        Ok(unsafe { io::read_ptr(pointer) })
    }
}

overlay! {
    /// Method table data that is not needed on hot paths
    AuxiliaryData
}

impl<'e> AuxiliaryData<'e> {
    /// Flags
    #[must_use]
    pub fn flags(&self) -> u32 {
        read_field!(self, auxiliary_data.flags)
    }

    /// Signed offset from the auxiliary data to the non-virtual slot anchor
    #[must_use]
    pub fn offset_to_non_virtual_slots(&self) -> i16 {
        read_field!(self, auxiliary_data.offset_to_non_virtual_slots)
    }

    /// Anchor of the non-virtual slot array
    #[must_use]
    pub fn non_virtual_slots(&self) -> Address {
        self.address()
            .offset(isize::from(self.offset_to_non_virtual_slots()))
    }

    /// Loader module
    #[must_use]
    pub fn loader_module(&self) -> Option<Module<'e>> {
        let address: Address = read_field!(self, auxiliary_data.loader_module);
        address
            .non_null()
            .map(|address| unsafe { Module::new(self.engine(), address) })
    }

    /// Handle of the exposed class object
    #[must_use]
    pub fn exposed_class_object(&self) -> Address {
        read_field!(self, auxiliary_data.exposed_class_object)
    }
}
