use tracing::{debug, trace};

use crate::{
    layout::{
        types::{MethodDescFlags3, MethodDescFlags4},
        Address, MethodDesc,
    },
    precode::{Precode, PrecodeType},
    probe::io,
    Result,
};

impl<'e> MethodDesc<'e> {
    /// The value of the dispatch slot, `None` if it is empty or the descriptor is not attached to
    /// a method table yet
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the method table cannot address the slot.
    pub fn current_entry_point(&self) -> Result<Option<Address>> {
        let slot = if self.has_non_vtable_slot() {
            self.non_vtable_slot_address()?
        } else {
            match self.method_table() {
                Some(table) => table.slot_ptr(self.slot_number())?,
                None => return Ok(None),
            }
        };

        Ok(unsafe { io::read_ptr(slot) }.non_null())
    }

    /// The stable entry point held by the dispatch slot
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor has no stable entry point.
    pub fn stable_entry_point(&self) -> Result<Address> {
        if !self.has_stable_entry_point() {
            return Err(precondition_error!(
                "Method descriptor at {} has no stable entry point",
                self.address()
            ));
        }

        Ok(unsafe { io::read_ptr(self.dispatch_slot_address()?) })
    }

    /// The precode behind the stable entry point
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the stable entry point is no precode or is empty.
    pub fn precode(&self) -> Result<Precode<'e>> {
        if !self.has_precode() {
            return Err(precondition_error!(
                "Method descriptor at {} has no precode",
                self.address()
            ));
        }

        match self.stable_entry_point()?.non_null() {
            Some(address) => Ok(unsafe { Precode::new(self.engine(), address) }),
            None => Err(precondition_error!(
                "Method descriptor at {} has an empty precode slot",
                self.address()
            )),
        }
    }

    /// The compiled code of the method.
    ///
    /// The dedicated native code slot if the descriptor has one. Otherwise the stable entry point,
    /// unless it is a precode redirecting to the compiler.
    ///
    /// # Errors
    /// Returns any error of the slot address computations.
    pub fn native_code(&self) -> Result<Option<Address>> {
        if self.has_native_code_slot() {
            let slot = self.native_code_slot_address()?;
            return Ok(unsafe { io::read_ptr(slot) }.non_null());
        }

        if !self.has_stable_entry_point() || self.has_precode() {
            return Ok(None);
        }

        Ok(self.stable_entry_point()?.non_null())
    }

    /// The temporary entry point, if one was assigned
    #[must_use]
    pub fn temporary_entry_point_if_exists(&self) -> Option<Address> {
        if !self
            .flags4()
            .contains(MethodDescFlags4::TEMPORARY_ENTRY_POINT_ASSIGNED)
        {
            return None;
        }

        self.code_data()
            .and_then(|code_data| code_data.temporary_entry_point().non_null())
    }

    /// The current entry point, establishing a temporary one first if the slot is empty
    ///
    /// # Errors
    /// Returns any error of [`MethodDesc::ensure_temporary_entry_point`].
    pub fn temporary_entry_point(&self) -> Result<Address> {
        if let Some(entry_point) = self.current_entry_point()? {
            return Ok(entry_point);
        }

        self.ensure_temporary_entry_point()?;
        match self.current_entry_point()? {
            Some(entry_point) => Ok(entry_point),
            None => Err(precondition_error!(
                "Method descriptor at {} has no entry point after establishing one",
                self.address()
            )),
        }
    }

    /// Makes sure the method can be called.
    ///
    /// Methods whose slot is empty get a fresh fixup precode routing to the pre-compilation
    /// thunk, stored as temporary entry point and published to the slot. A slot that already holds
    /// an entry point is never touched.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor has no code data or its slot
    /// cannot be addressed, [`crate::Error::Os`] if no stub page can be allocated.
    pub fn ensure_temporary_entry_point(&self) -> Result<()> {
        if self.current_entry_point()?.is_some() {
            return Ok(());
        }

        let entry_point = self.establish_temporary_entry_point()?;
        let slot = self.dispatch_slot_address()?;
        if unsafe { io::compare_exchange_ptr(slot, Address::NULL, entry_point) }.is_ok() {
            debug!(method_desc = %self.address(), %entry_point, "published temporary entry point");
        }

        Ok(())
    }

    /// Returns the temporary entry point, creating it if none was assigned yet
    fn establish_temporary_entry_point(&self) -> Result<Address> {
        if let Some(entry_point) = self.temporary_entry_point_if_exists() {
            return Ok(entry_point);
        }

        let Some(code_data) = self.code_data() else {
            return Err(precondition_error!(
                "Method descriptor at {} has no code data",
                self.address()
            ));
        };

        self.chunk().determine_and_set_tiering_eligibility();

        let precode = self.engine().allocate_precode(PrecodeType::Fixup)?;
        precode.init(PrecodeType::Fixup, *self, self.loader_allocator(), None)?;

        let entry_point = code_data.publish_temporary_entry_point(precode.address());
        if entry_point != precode.address() {
            trace!(method_desc = %self.address(), %entry_point, "temporary entry point assigned concurrently");
        }
        self.set_flags4(MethodDescFlags4::TEMPORARY_ENTRY_POINT_ASSIGNED);

        Ok(entry_point)
    }

    /// Points the dispatch slot at `target`
    ///
    /// # Errors
    /// Returns any error of [`MethodDesc::dispatch_slot_address`].
    pub fn set_entry_point(&self, target: Address) -> Result<()> {
        let slot = self.dispatch_slot_address()?;
        unsafe { io::write(slot, target) };
        trace!(method_desc = %self.address(), %target, "set entry point");
        Ok(())
    }

    /// Reverts the method to its pre-compilation state.
    ///
    /// An existing precode is re-initialized to route to the pre-compilation thunk. Otherwise the
    /// descriptor is marked as having a precode stable entry point and the slot is pointed at the
    /// temporary entry point. The dedicated native code slot, if any, is cleared.
    ///
    /// # Errors
    /// Returns any error of [`crate::precode::Precode::reset`] or of establishing the temporary
    /// entry point.
    pub fn reset(&self) -> Result<()> {
        if self.has_precode() {
            self.precode()?.reset()?;
        } else {
            let entry_point = self.establish_temporary_entry_point()?;
            self.set_flags3(
                MethodDescFlags3::HAS_STABLE_ENTRY_POINT | MethodDescFlags3::HAS_PRECODE,
            );
            self.set_entry_point(entry_point)?;
        }

        if self.has_native_code_slot() {
            let slot = self.native_code_slot_address()?;
            unsafe { io::write(slot, Address::NULL) };
        }

        debug!(method_desc = %self.address(), "reset to pre-compilation state");
        Ok(())
    }
}
