use crate::{
    layout::{Address, MethodDesc},
    Result,
};

impl MethodDesc<'_> {
    /// The private entry point slot directly after the descriptor's base size
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor has no such slot.
    pub fn non_vtable_slot_address(&self) -> Result<Address> {
        if !self.has_non_vtable_slot() {
            return Err(precondition_error!(
                "Method descriptor at {} has no non-vtable slot",
                self.address()
            ));
        }

        Ok(self.address().add(self.base_size()))
    }

    /// The dedicated native code slot, after the base size and the optional slots preceding it
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor has no native code slot.
    pub fn native_code_slot_address(&self) -> Result<Address> {
        if !self.has_native_code_slot() {
            return Err(precondition_error!(
                "Method descriptor at {} has no native code slot",
                self.address()
            ));
        }

        let index = self.flags().native_code_slot_index();
        Ok(self
            .address()
            .add(self.engine().profile().method_desc_size(index)))
    }

    /// Address of the slot holding the method's entry point.
    ///
    /// Descriptors with a private slot own it, all others share the dispatch table of their
    /// method table at their slot number.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor's chunk has no method table or the
    /// method table cannot address the slot.
    pub fn dispatch_slot_address(&self) -> Result<Address> {
        if self.has_non_vtable_slot() {
            return self.non_vtable_slot_address();
        }

        match self.method_table() {
            Some(table) => table.slot_ptr(self.slot_number()),
            None => Err(precondition_error!(
                "Method descriptor at {} has no method table",
                self.address()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        layout::types::MethodDescFlags,
        test::{offsets, Fixture, MethodShape},
        Error,
    };

    #[test]
    fn private_slot_follows_base_size() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape {
            flags: MethodDescFlags::HAS_NON_VTABLE_SLOT.bits(),
            ..MethodShape::default()
        });

        assert_eq!(method.dispatch_slot_address().unwrap(), method.address().add(0x10));
        assert_eq!(method.non_vtable_slot_address().unwrap(), method.address().add(0x10));
    }

    #[test]
    fn virtual_slots_use_method_table() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape {
            slot: 11,
            ..MethodShape::default()
        });

        assert_eq!(
            method.dispatch_slot_address().unwrap(),
            fixture.virtual_slot_address(11)
        );
        assert!(matches!(
            method.non_vtable_slot_address(),
            Err(Error::Precondition { .. })
        ));
    }

    #[test]
    fn non_virtual_slots_use_auxiliary_data() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape {
            slot: offsets::NUM_VIRTUALS + 2,
            ..MethodShape::default()
        });

        let anchor = fixture.method_table().non_virtual_slots().unwrap();
        assert_eq!(method.dispatch_slot_address().unwrap(), anchor.sub(3 * 8));
    }

    #[test]
    fn native_code_slot_skips_optional_slots() {
        let fixture = Fixture::new();
        let plain = fixture.add_method(MethodShape {
            flags: MethodDescFlags::HAS_NATIVE_CODE_SLOT.bits(),
            ..MethodShape::default()
        });
        assert_eq!(plain.native_code_slot_address().unwrap(), plain.address().add(0x10));

        let both = fixture.add_method(MethodShape {
            flags: (MethodDescFlags::HAS_NATIVE_CODE_SLOT
                | MethodDescFlags::HAS_NON_VTABLE_SLOT
                | MethodDescFlags::METHOD_IMPL)
                .bits(),
            ..MethodShape::default()
        });
        // non-vtable slot (8) and method impl (16) come first
        assert_eq!(both.native_code_slot_address().unwrap(), both.address().add(0x28));

        let none = fixture.add_method(MethodShape::default());
        assert!(matches!(
            none.native_code_slot_address(),
            Err(Error::Precondition { .. })
        ));
    }

    #[test]
    fn detached_chunk() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        fixture.detach_method_table();

        assert!(matches!(
            method.dispatch_slot_address(),
            Err(Error::Precondition { .. })
        ));
    }
}
