//! Overlays for method descriptors and the structures hanging off them.
//!
//! # Key Components
//!
//! - [`MethodDesc`] - The per-method bookkeeping structure, a 16-byte core plus a tail whose
//!   size depends on the classification and the optional slots
//! - [`InstantiatedMethodDesc`] - The tail of generic instantiations and instantiating stubs
//! - [`CodeData`] - The out-of-line versioning state and temporary entry point
//!
//! Entry point resolution and mutation on [`MethodDesc`] live in [`crate::resolver`].

use crate::{
    layout::{
        types::{
            InstantiationKind, MethodClassification, MethodDescFlags, MethodDescFlags3,
            MethodDescFlags4,
        },
        Address, MethodDescChunk, MethodTable, Module,
    },
    metadata::{import::MdImport, token::Token, types::CorMethodImpl},
    probe::io,
    Result,
};

overlay! {
    /// A method descriptor.
    ///
    /// Every method known to the engine has one. The descriptor records the method's dispatch slot,
    /// its low token bits and the flags driving entry point resolution. Descriptors are allocated
    /// in chunks, [`MethodDesc::chunk`] recovers the owning [`MethodDescChunk`] from the chunk index.
    MethodDesc
}

impl<'e> MethodDesc<'e> {
    /// Primary flags
    #[must_use]
    pub fn flags(&self) -> MethodDescFlags {
        MethodDescFlags::from_bits_retain(read_field!(self, method_desc.flags))
    }

    /// `flags3`, including the token remainder
    #[must_use]
    pub fn flags3(&self) -> MethodDescFlags3 {
        MethodDescFlags3::from_bits_retain(read_field!(self, method_desc.flags3))
    }

    /// `flags4`
    #[must_use]
    pub fn flags4(&self) -> MethodDescFlags4 {
        MethodDescFlags4::from_bits_retain(read_field!(self, method_desc.flags4))
    }

    /// The descriptor's kind
    #[must_use]
    pub fn classification(&self) -> MethodClassification {
        MethodClassification::from_flags(self.flags())
    }

    /// Dispatch slot number
    #[must_use]
    pub fn slot_number(&self) -> u16 {
        read_field!(self, method_desc.slot_number)
    }

    /// Position inside the owning chunk, in pointer-sized units
    #[must_use]
    pub fn chunk_index(&self) -> u8 {
        read_field!(self, method_desc.chunk_index)
    }

    /// Low 12 bits of the method definition token
    #[must_use]
    pub fn token_remainder(&self) -> u16 {
        self.flags3().token_remainder()
    }

    /// Atomically sets `bits` in `flags3`, as the engine's interlocked flag update does
    pub(crate) fn set_flags3(&self, bits: MethodDescFlags3) {
        let field = self.engine().profile().method_desc.flags3;
        unsafe { io::fetch_or_u16(field.address(self.address()), bits.bits()) };
    }

    /// Atomically sets `bits` in `flags4`
    pub(crate) fn set_flags4(&self, bits: MethodDescFlags4) {
        let field = self.engine().profile().method_desc.flags4;
        unsafe { io::fetch_or_u8(field.address(self.address()), bits.bits()) };
    }

    /// Static method
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags().contains(MethodDescFlags::STATIC)
    }

    /// The entry point lives in a private slot after the descriptor
    #[must_use]
    pub fn has_non_vtable_slot(&self) -> bool {
        self.flags().contains(MethodDescFlags::HAS_NON_VTABLE_SLOT)
    }

    /// The descriptor implements a method impl
    #[must_use]
    pub fn is_method_impl(&self) -> bool {
        self.flags().contains(MethodDescFlags::METHOD_IMPL)
    }

    /// The descriptor has a dedicated native code slot
    #[must_use]
    pub fn has_native_code_slot(&self) -> bool {
        self.flags().contains(MethodDescFlags::HAS_NATIVE_CODE_SLOT)
    }

    /// The dispatch slot holds a stable entry point
    #[must_use]
    pub fn has_stable_entry_point(&self) -> bool {
        self.flags3()
            .contains(MethodDescFlags3::HAS_STABLE_ENTRY_POINT)
    }

    /// The stable entry point is a precode
    #[must_use]
    pub fn has_precode(&self) -> bool {
        self.flags3().contains(MethodDescFlags3::HAS_PRECODE)
    }

    /// Unboxing stub
    #[must_use]
    pub fn is_unboxing_stub(&self) -> bool {
        self.flags3().contains(MethodDescFlags3::IS_UNBOXING_STUB)
    }

    /// Eligible for tiered compilation
    #[must_use]
    pub fn is_eligible_for_tiered_compilation(&self) -> bool {
        self.flags3()
            .contains(MethodDescFlags3::IS_ELIGIBLE_FOR_TIERED_COMPILATION)
    }

    /// Instantiated descriptor of kind wrapper-stub-with-instantiations that is not an unboxing stub
    #[must_use]
    pub fn is_instantiating_stub(&self) -> bool {
        !self.is_unboxing_stub()
            && self.as_instantiated().is_some_and(|instantiated| {
                instantiated.kind() == InstantiationKind::WrapperStubWithInstantiations
            })
    }

    /// Unboxing or instantiating stub
    #[must_use]
    pub fn is_wrapper_stub(&self) -> bool {
        self.is_unboxing_stub() || self.is_instantiating_stub()
    }

    /// Plain bytecode method
    #[must_use]
    pub fn is_il(&self) -> bool {
        self.classification() == MethodClassification::Il
    }

    /// Dynamically generated method without metadata
    #[must_use]
    pub fn is_no_metadata(&self) -> bool {
        self.classification() == MethodClassification::Dynamic
    }

    /// Size of the descriptor for its bare classification
    #[must_use]
    pub fn base_size(&self) -> usize {
        self.engine()
            .profile()
            .method_desc_size(self.classification() as u16)
    }

    /// Full size of the descriptor including its optional slots
    #[must_use]
    pub fn size(&self) -> usize {
        self.engine()
            .profile()
            .method_desc_size(self.flags().size_index())
    }

    /// The chunk this descriptor was allocated in
    #[must_use]
    pub fn chunk(&self) -> MethodDescChunk<'e> {
        let profile = self.engine().profile();
        let offset =
            profile.chunk.header_size + usize::from(self.chunk_index()) * profile.method_desc.alignment;
        unsafe { MethodDescChunk::new(self.engine(), self.address().sub(offset)) }
    }

    /// The owning method table, `None` while the chunk is not yet attached to one
    #[must_use]
    pub fn method_table(&self) -> Option<MethodTable<'e>> {
        self.chunk().method_table()
    }

    /// The module of the owning method table
    #[must_use]
    pub fn module(&self) -> Option<Module<'e>> {
        self.method_table().and_then(|table| table.module())
    }

    /// The module whose loader allocated this descriptor
    #[must_use]
    pub fn loader_module(&self) -> Option<Module<'e>> {
        self.chunk().loader_module()
    }

    /// Loader allocator of the loader module, null if there is none
    #[must_use]
    pub fn loader_allocator(&self) -> Address {
        self.loader_module()
            .map_or(Address::NULL, |module| module.loader_allocator())
    }

    /// Out-of-line code data, `None` if not allocated
    #[must_use]
    pub fn code_data(&self) -> Option<CodeData<'e>> {
        let address: Address = read_field!(self, method_desc.code_data);
        address
            .non_null()
            .map(|address| unsafe { CodeData::new(self.engine(), address) })
    }

    /// The full method definition token, merged from the chunk's token range and the remainder
    #[must_use]
    pub fn member_def(&self) -> Token {
        Token::merge_method_token(self.chunk().token_range(), self.token_remainder())
    }

    /// The metadata importer of the owning module
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the descriptor has no module, or any error of
    /// [`Module::md_import`].
    pub fn md_import(&self) -> Result<MdImport<'e>> {
        match self.module() {
            Some(module) => module.md_import(),
            None => Err(precondition_error!(
                "Method descriptor at {} has no module",
                self.address()
            )),
        }
    }

    /// Implementation attributes of the method definition
    ///
    /// # Errors
    /// Returns an error if the importer cannot be reached or the member token does not resolve.
    pub fn impl_attributes(&self) -> Result<CorMethodImpl> {
        self.md_import()?.method_impl_flags(self.member_def())
    }

    /// Whether the method requests a fixed optimization level
    ///
    /// Methods without metadata never do. Others do if their implementation attributes contain
    /// `NoOptimization` or `AggressiveOptimization`.
    ///
    /// # Errors
    /// Returns any error of [`MethodDesc::impl_attributes`].
    pub fn is_jit_optimization_level_requested(&self) -> Result<bool> {
        if self.is_no_metadata() {
            return Ok(false);
        }

        Ok(self.impl_attributes()?.requests_optimization_level())
    }

    /// The instantiated tail, for descriptors of classification
    /// [`MethodClassification::Instantiated`]
    #[must_use]
    pub fn as_instantiated(&self) -> Option<InstantiatedMethodDesc<'e>> {
        if self.classification() == MethodClassification::Instantiated {
            Some(unsafe { InstantiatedMethodDesc::new(self.engine(), self.address()) })
        } else {
            None
        }
    }
}

overlay! {
    /// A method descriptor of classification [`MethodClassification::Instantiated`]
    InstantiatedMethodDesc
}

impl<'e> InstantiatedMethodDesc<'e> {
    /// The descriptor core
    #[must_use]
    pub fn method_desc(&self) -> MethodDesc<'e> {
        unsafe { MethodDesc::new(self.engine(), self.address()) }
    }

    /// Raw `flags2`
    #[must_use]
    pub fn flags2(&self) -> u16 {
        read_field!(self, instantiated_method_desc.flags2)
    }

    /// The instantiation kind
    #[must_use]
    pub fn kind(&self) -> InstantiationKind {
        InstantiationKind::from_flags2(self.flags2())
    }

    /// Number of generic arguments
    #[must_use]
    pub fn num_generic_args(&self) -> u16 {
        read_field!(self, instantiated_method_desc.num_generic_args)
    }

    /// Wrapped descriptor of a wrapper stub, the dictionary layout of a definition otherwise
    #[must_use]
    pub fn wrapped(&self) -> Address {
        read_field!(self, instantiated_method_desc.wrapped)
    }

    /// Per-instantiation info
    #[must_use]
    pub fn per_inst_info(&self) -> Address {
        read_field!(self, instantiated_method_desc.per_inst_info)
    }
}

overlay! {
    /// Out-of-line code data of a method descriptor
    CodeData
}

impl CodeData<'_> {
    /// Versioning state
    #[must_use]
    pub fn versioning_state(&self) -> Address {
        read_field!(self, code_data.versioning_state)
    }

    /// Stored temporary entry point, meaningful only once assigned
    #[must_use]
    pub fn temporary_entry_point(&self) -> Address {
        read_field!(self, code_data.temporary_entry_point)
    }

    /// Stores `entry_point` unless another one was stored first, returns the one that stays
    pub(crate) fn publish_temporary_entry_point(&self, entry_point: Address) -> Address {
        let field = self.engine().profile().code_data.temporary_entry_point;
        let slot = field.address(self.address());
        match unsafe { io::compare_exchange_ptr(slot, Address::NULL, entry_point) } {
            Ok(_) => entry_point,
            Err(existing) => existing,
        }
    }
}
