//! The engine's internal enumeration cursor and iterators built on it.

use crate::{
    layout::Address,
    metadata::{import::MdImport, token::Token},
    Engine,
};

overlay! {
    /// An internal enumeration cursor.
    ///
    /// A simple cursor enumerates the row range `start..end` of one table, combining each row
    /// index with the token type tag in `kind`. Otherwise the tokens are taken from the cursor's
    /// inline storage, indexed by the absolute position.
    HEnumInternal
}

impl HEnumInternal<'_> {
    /// Token type tag of the enumerated table
    #[must_use]
    pub fn kind(&self) -> u32 {
        let kind: i32 = read_field!(self, henum.kind);
        kind as u32
    }

    /// Number of items
    #[must_use]
    pub fn count(&self) -> i32 {
        read_field!(self, henum.count)
    }

    /// Returns true for a plain row range
    #[must_use]
    pub fn is_simple(&self) -> bool {
        let enum_type: i32 = read_field!(self, henum.enum_type);
        enum_type == 0
    }

    /// First position
    #[must_use]
    pub fn start(&self) -> i32 {
        read_field!(self, henum.start)
    }

    /// One past the last position
    #[must_use]
    pub fn end(&self) -> i32 {
        read_field!(self, henum.end)
    }

    /// Next position
    #[must_use]
    pub fn current(&self) -> i32 {
        read_field!(self, henum.current)
    }

    /// Advances the cursor and returns the token at the previous position, `None` once
    /// `current` reached `end`
    pub fn next_token(&self) -> Option<Token> {
        let current = self.current();
        if current as u32 >= self.end() as u32 {
            return None;
        }

        let token = if self.is_simple() {
            Token(self.kind() | current as u32)
        } else {
            let tokens = &self.engine().profile().henum.tokens;
            Token(unsafe { tokens.read(self.address(), current as usize) })
        };

        write_field!(self, henum.current, current + 1);
        Some(token)
    }
}

/// Iterator over the type definitions of an importer.
///
/// Owns the cursor storage the engine's enumeration initializer filled in.
pub struct TypeDefs<'e> {
    engine: &'e Engine,
    storage: *mut [u64],
}

impl<'e> TypeDefs<'e> {
    /// Allocates zeroed cursor storage and lets `import` initialize it
    pub(crate) fn init(import: &MdImport<'e>) -> crate::Result<Self> {
        let engine = import.engine();
        let words = engine.profile().henum.size.div_ceil(8);
        let storage = Box::into_raw(vec![0u64; words].into_boxed_slice());
        let enumerator = TypeDefs { engine, storage };

        unsafe { import.enum_type_def_init(enumerator.cursor().address())? };
        Ok(enumerator)
    }

    /// The cursor over the owned storage
    #[must_use]
    pub fn cursor(&self) -> HEnumInternal<'e> {
        let address = Address::from(self.storage.cast::<u64>());
        unsafe { HEnumInternal::new(self.engine, address) }
    }
}

impl Iterator for TypeDefs<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor().next_token()
    }
}

impl Drop for TypeDefs<'_> {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.storage) });
    }
}

impl std::fmt::Debug for TypeDefs<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypeDefs").field(&self.cursor()).finish()
    }
}
