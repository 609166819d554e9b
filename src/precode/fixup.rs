use tracing::trace;

use crate::layout::{Address, MethodDesc};

overlay! {
    /// A fixup-then-redirect stub.
    ///
    /// The stub jumps through its target, which initially points back at the stub's own fixup
    /// entry. That entry loads the descriptor and jumps to the fixup thunk, the pre-compilation
    /// thunk on this build. Compiling the method rewrites the target to the native code.
    FixupPrecode
}

impl<'e> FixupPrecode<'e> {
    fn data(&self) -> Address {
        self.address()
            .add(self.engine().profile().stub_code_page_size())
    }

    /// The fixup entry inside the stub's code
    #[must_use]
    pub fn fixup_entry(&self) -> Address {
        self.address()
            .add(self.engine().profile().precode.fixup_code_offset)
    }

    /// The owning method descriptor
    #[must_use]
    pub fn method_desc(&self) -> Option<MethodDesc<'e>> {
        let layout = &self.engine().profile().fixup_precode;
        let address = unsafe { layout.method_desc.read(self.data()) };
        address
            .non_null()
            .map(|address| unsafe { MethodDesc::new(self.engine(), address) })
    }

    /// The call target
    #[must_use]
    pub fn target(&self) -> Address {
        let layout = &self.engine().profile().fixup_precode;
        unsafe { layout.target.read(self.data()) }
    }

    /// The thunk the fixup entry jumps to
    #[must_use]
    pub fn precode_fixup_thunk(&self) -> Address {
        let layout = &self.engine().profile().fixup_precode;
        unsafe { layout.precode_fixup_thunk.read(self.data()) }
    }

    /// Initializes the data record, the target defaults to the stub's own fixup entry
    pub fn init(&self, method_desc: MethodDesc<'_>, allocator: Address, target: Option<Address>) {
        let layout = &self.engine().profile().fixup_precode;
        let data = self.data();
        let target = target.unwrap_or(self.fixup_entry());

        unsafe {
            layout.method_desc.write(data, method_desc.address());
            layout.target.write(data, target);
            layout
                .precode_fixup_thunk
                .write(data, self.engine().pre_stub());
        }

        trace!(precode = %self.address(), method_desc = %method_desc.address(), %allocator, %target, "initialized fixup precode");
    }
}
