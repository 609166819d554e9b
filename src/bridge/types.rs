use tracing::trace;

use crate::{
    layout::{Address, MethodTable, Module},
    Result,
};

/// Tag bit marking a type handle that points at a type descriptor instead of a method table
pub const TYPE_DESC_TAG: usize = 0x2;

/// Signature of the engine's module type enumeration helper
type GetTypes = unsafe extern "system" fn(module: usize) -> usize;

overlay! {
    /// A host `RuntimeType` object
    RuntimeTypeObject
}

impl<'e> RuntimeTypeObject<'e> {
    /// The engine type handle of the type
    #[must_use]
    pub fn type_handle(&self) -> TypeHandle<'e> {
        let value: Address = read_field!(self, host.runtime_type_handle);
        unsafe { TypeHandle::new(self.engine(), value) }
    }
}

overlay! {
    /// An engine type handle, a method table or a tagged type descriptor
    TypeHandle
}

impl<'e> TypeHandle<'e> {
    /// The handle points at a type descriptor (arrays of generic variables, pointers, ...)
    #[must_use]
    pub fn is_type_desc(&self) -> bool {
        self.address().value() & TYPE_DESC_TAG != 0
    }

    /// The method table of the type
    ///
    /// # Errors
    /// Returns [`crate::Error::Unsupported`] for type descriptor handles.
    pub fn method_table(&self) -> Result<MethodTable<'e>> {
        if self.is_type_desc() {
            return Err(unsupported_error!(
                "Type handle {} is a type descriptor",
                self.address()
            ));
        }

        Ok(unsafe { MethodTable::new(self.engine(), self.address()) })
    }
}

overlay! {
    /// A managed array of object references
    ObjectArray
}

impl<'e> ObjectArray<'e> {
    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        let length: i32 = read_field!(self, host.array_length);
        usize::try_from(length).unwrap_or(0)
    }

    /// Returns true if the array has no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates the element references, null elements included
    pub fn iter(&self) -> impl Iterator<Item = Address> + 'e {
        let array = *self;
        let elements = array.engine().profile().host.array_elements;
        (0..self.len()).map(move |index| unsafe { elements.read(array.address(), index) })
    }

    /// The type handles of an array of runtime type objects
    #[must_use]
    pub fn type_handles(&self) -> Vec<TypeHandle<'e>> {
        let engine = self.engine();
        self.iter()
            .filter_map(Address::non_null)
            .map(|object| unsafe { RuntimeTypeObject::new(engine, object) }.type_handle())
            .collect()
    }
}

impl<'e> Module<'e> {
    /// The module's types as reported by the engine's own type enumeration helper
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the helper returned no array.
    pub fn types(&self) -> Result<Vec<TypeHandle<'e>>> {
        let engine = self.engine();
        let helper = engine.image().at(engine.profile().image.get_types);

        let function: GetTypes = unsafe { std::mem::transmute(helper.value()) };
        let array = Address(unsafe { function(self.address().value()) });
        trace!(module = %self.address(), %array, "enumerated module types");

        match array.non_null() {
            Some(array) => Ok(unsafe { ObjectArray::new(engine, array) }.type_handles()),
            None => Err(precondition_error!(
                "Module at {} returned no type array",
                self.address()
            )),
        }
    }
}
