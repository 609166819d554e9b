//! The engine's internal metadata importer.

use crate::{
    layout::Address,
    metadata::{
        enumerator::{HEnumInternal, TypeDefs},
        minimd::MiniMd,
        tableid::TableId,
        token::Token,
        types::CorMethodImpl,
    },
    probe::io,
    Error, Result,
};

/// Signature of the importer's type definition enumeration initializer
type EnumTypeDefInit = unsafe extern "system" fn(this: usize, cursor: usize) -> i32;

overlay! {
    /// A read-only metadata importer.
    ///
    /// The importer is a COM-style object whose first word is its virtual function table,
    /// the metadata model it reads from is embedded right after the object header.
    MdImport
}

impl<'e> MdImport<'e> {
    /// Virtual function table
    #[must_use]
    pub fn vtable(&self) -> Address {
        read_field!(self, md_import.vtable)
    }

    /// The embedded metadata model
    #[must_use]
    pub fn mini_md(&self) -> MiniMd<'e> {
        let offset = self.engine().profile().md_import.mini_md;
        unsafe { MiniMd::new(self.engine(), self.address().add(offset)) }
    }

    /// Implementation attributes of the method definition `token`
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if the token's row is not in the `MethodDef` table.
    pub fn method_impl_flags(&self, token: Token) -> Result<CorMethodImpl> {
        let row = self.mini_md().record_for(TableId::MethodDef, token)?;
        let field = self.engine().profile().mini_md.method_def_impl_flags;
        Ok(CorMethodImpl::from_bits_retain(unsafe { field.read(row) }))
    }

    /// Advances `cursor`, see [`HEnumInternal::next_token`]
    pub fn enum_next(&self, cursor: &HEnumInternal<'_>) -> Option<Token> {
        cursor.next_token()
    }

    /// Calls the importer's type definition enumeration initializer on `cursor`.
    ///
    /// # Errors
    /// Returns [`Error::Precondition`] if the vtable slot is empty, [`Error::EngineCall`] with the
    /// failing status otherwise.
    ///
    /// # Safety
    /// `cursor` must point at writable storage of at least the profile's cursor size.
    pub unsafe fn enum_type_def_init(&self, cursor: Address) -> Result<()> {
        let field = self.engine().profile().md_import.enum_type_def_init;
        let function = unsafe { field.read(self.vtable()) };
        if function.is_null() {
            return Err(precondition_error!(
                "Importer at {} has no type definition enumerator",
                self.address()
            ));
        }

        let function: EnumTypeDefInit = unsafe { std::mem::transmute(function.value()) };
        let status = unsafe { function(self.address().value(), cursor.value()) };
        if status < 0 {
            return Err(Error::EngineCall(status));
        }

        Ok(())
    }

    /// Enumerates the type definitions of the image
    ///
    /// # Errors
    /// Returns any error of [`MdImport::enum_type_def_init`].
    pub fn type_defs(&self) -> Result<TypeDefs<'e>> {
        TypeDefs::init(self)
    }

    /// Reads the raw record of `token` from whichever copy the model prefers
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for tokens outside their table.
    pub fn record_bytes(&self, token: Token) -> Result<Vec<u8>> {
        let table = TableId::try_from(token)?;
        let mini_md = self.mini_md();
        let row = mini_md.record_for(table, token)?;
        Ok(unsafe { io::read_bytes(row, mini_md.record_size(table)) })
    }
}
