use tracing::trace;

use crate::{
    layout::{Address, MethodDesc},
    precode::PrecodeType,
};

overlay! {
    /// A simple redirect stub: loads its descriptor and jumps to the target in its data record
    StubPrecode
}

impl<'e> StubPrecode<'e> {
    fn data(&self) -> Address {
        self.address()
            .add(self.engine().profile().stub_code_page_size())
    }

    /// The owning method descriptor
    #[must_use]
    pub fn method_desc(&self) -> Option<MethodDesc<'e>> {
        let layout = &self.engine().profile().stub_precode;
        let address = unsafe { layout.method_desc.read(self.data()) };
        address
            .non_null()
            .map(|address| unsafe { MethodDesc::new(self.engine(), address) })
    }

    /// The call target
    #[must_use]
    pub fn target(&self) -> Address {
        let layout = &self.engine().profile().stub_precode;
        unsafe { layout.target.read(self.data()) }
    }

    /// The effective kind byte
    #[must_use]
    pub fn type_byte(&self) -> u8 {
        let layout = &self.engine().profile().stub_precode;
        unsafe { layout.type_byte.read(self.data()) }
    }

    /// Points the stub at `target`
    pub(crate) fn set_target(&self, target: Address) {
        let layout = &self.engine().profile().stub_precode;
        unsafe { layout.target.write(self.data(), target) };
    }

    /// Initializes the data record.
    ///
    /// The target is only written when a loader allocator is supplied, it defaults to the
    /// pre-compilation thunk.
    pub fn init(&self, method_desc: MethodDesc<'_>, allocator: Address, target: Option<Address>) {
        let layout = &self.engine().profile().stub_precode;
        let data = self.data();

        if !allocator.is_null() {
            let target = target.unwrap_or(self.engine().pre_stub());
            unsafe { layout.target.write(data, target) };
        }

        unsafe {
            layout.method_desc.write(data, method_desc.address());
            layout.type_byte.write(data, PrecodeType::Stub as u8);
        }

        trace!(precode = %self.address(), method_desc = %method_desc.address(), target = %self.target(), "initialized stub precode");
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        layout::Address,
        test::{Fixture, MethodShape},
    };

    #[test]
    fn init_with_allocator() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let stub = fixture.precode(1).as_stub();

        stub.init(method, Address(0xA110C), Some(Address(0x5000_0000)));
        assert_eq!(stub.method_desc(), Some(method));
        assert_eq!(stub.target(), Address(0x5000_0000));
        assert_eq!(stub.type_byte(), 0x4C);

        stub.init(method, Address(0xA110C), None);
        assert_eq!(stub.target(), fixture.engine().pre_stub());
    }

    #[test]
    fn init_without_allocator_keeps_target() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let stub = fixture.stub_precode(2, method, Address(0x7777));

        stub.as_stub().init(method, Address::NULL, Some(Address(0x8888)));
        assert_eq!(stub.as_stub().target(), Address(0x7777));
    }
}
