use crate::{
    layout::{Address, MethodDesc},
    Engine, Result,
};

overlay! {
    /// A host `RuntimeMethodInfo` object
    RuntimeMethodInfo
}

impl RuntimeMethodInfo<'_> {
    /// The method descriptor handle
    #[must_use]
    pub fn handle(&self) -> Address {
        read_field!(self, host.runtime_method_handle)
    }
}

overlay! {
    /// A host `DynamicMethod` object
    DynamicMethod
}

impl<'e> DynamicMethod<'e> {
    /// The runtime method stub of the dynamic method, `None` until the method was created
    #[must_use]
    pub fn stub(&self) -> Option<RuntimeMethodStub<'e>> {
        let address: Address = read_field!(self, host.dynamic_method_stub);
        address
            .non_null()
            .map(|address| unsafe { RuntimeMethodStub::new(self.engine(), address) })
    }
}

overlay! {
    /// A host `RuntimeMethodHandleInternal` stub object
    RuntimeMethodStub
}

impl RuntimeMethodStub<'_> {
    /// The method descriptor handle
    #[must_use]
    pub fn handle(&self) -> Address {
        read_field!(self, host.method_stub_handle)
    }
}

/// A host reflection object describing a method.
///
/// The host hands out method objects of several runtime types; which one an object is decides
/// where its descriptor handle is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMethod<'e> {
    /// An ordinary compiled method
    Runtime(RuntimeMethodInfo<'e>),
    /// A dynamically generated method
    Dynamic(DynamicMethod<'e>),
}

impl<'e> HostMethod<'e> {
    /// Classifies `object` by the name of its runtime type
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for method objects of any other type.
    ///
    /// # Safety
    /// `object` must be a live, pinned host object of the named type.
    pub unsafe fn classify(engine: &'e Engine, object: Address, type_name: &str) -> Result<Self> {
        match type_name {
            "RuntimeMethodInfo" => Ok(HostMethod::Runtime(unsafe {
                RuntimeMethodInfo::new(engine, object)
            })),
            "DynamicMethod" | "RTDynamicMethod" => Ok(HostMethod::Dynamic(unsafe {
                DynamicMethod::new(engine, object)
            })),
            _ => Err(unsupported_error!(
                "Method object of type {} at {}",
                type_name,
                object
            )),
        }
    }

    /// The method descriptor behind the object
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the object holds no descriptor yet.
    pub fn method_desc(&self) -> Result<MethodDesc<'e>> {
        let (engine, handle) = match self {
            HostMethod::Runtime(info) => (info.engine(), info.handle()),
            HostMethod::Dynamic(method) => (
                method.engine(),
                method.stub().map_or(Address::NULL, |stub| stub.handle()),
            ),
        };

        match handle.non_null() {
            Some(address) => Ok(unsafe { MethodDesc::new(engine, address) }),
            None => Err(precondition_error!(
                "Method object {:?} has no method descriptor",
                self
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        bridge::HostMethod,
        layout::Address,
        test::{offsets, Fixture, MethodShape},
        Error,
    };

    #[test]
    fn runtime_method_info() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let memory = fixture.memory();
        memory.write::<Address>(offsets::OBJECTS + 0x50, method.address());

        let host = unsafe {
            HostMethod::classify(fixture.engine(), memory.at(offsets::OBJECTS), "RuntimeMethodInfo")
        }
        .unwrap();
        assert!(matches!(host, HostMethod::Runtime(_)));
        assert_eq!(host.method_desc().unwrap(), method);
    }

    #[test]
    fn dynamic_method() {
        let fixture = Fixture::new();
        let method = fixture.add_method(MethodShape::default());
        let memory = fixture.memory();
        let object = offsets::OBJECTS;
        let stub = offsets::OBJECTS + 0x100;
        memory.write::<Address>(object + 0x10, memory.at(stub));
        memory.write::<Address>(stub + 0x50, method.address());

        for name in ["DynamicMethod", "RTDynamicMethod"] {
            let host =
                unsafe { HostMethod::classify(fixture.engine(), memory.at(object), name) }.unwrap();
            assert!(matches!(host, HostMethod::Dynamic(_)));
            assert_eq!(host.method_desc().unwrap(), method);
        }
    }

    #[test]
    fn dynamic_method_without_stub() {
        let fixture = Fixture::new();
        let memory = fixture.memory();

        let host = unsafe {
            HostMethod::classify(fixture.engine(), memory.at(offsets::OBJECTS), "DynamicMethod")
        }
        .unwrap();
        assert!(matches!(host.method_desc(), Err(Error::Precondition { .. })));
    }

    #[test]
    fn other_method_objects() {
        let fixture = Fixture::new();
        let result = unsafe {
            HostMethod::classify(
                fixture.engine(),
                fixture.memory().at(offsets::OBJECTS),
                "RuntimeConstructorInfo",
            )
        };
        assert!(matches!(result, Err(Error::Unsupported { .. })));
    }
}
