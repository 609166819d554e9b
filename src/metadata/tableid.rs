use strum::{EnumCount, EnumIter};

use crate::{metadata::token::Token, Error};

/// Identifiers of the metadata tables held by the engine's metadata model.
///
/// The numeric values are the table ids of the CLI specification and equal the high byte of the
/// tokens that reference the table. The engine keeps one schema row count, one table definition
/// and one data pointer per id, in id order, including the pointer and edit-and-continue tables
/// that never appear in optimized images.
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
#[repr(u8)]
pub enum TableId {
    /// `Module` table (0x00) - The module itself
    Module = 0x00,
    /// `TypeRef` table (0x01) - References to types of other scopes
    TypeRef = 0x01,
    /// `TypeDef` table (0x02) - Type definitions
    TypeDef = 0x02,
    /// `FieldPtr` table (0x03) - Field indirection of unoptimized images
    FieldPtr = 0x03,
    /// `Field` table (0x04) - Field definitions
    Field = 0x04,
    /// `MethodPtr` table (0x05) - Method indirection of unoptimized images
    MethodPtr = 0x05,
    /// `MethodDef` table (0x06) - Method definitions.
    ///
    /// Rows carry the RVA, the implementation flags at offset 4, the attributes, name,
    /// signature and parameter list.
    MethodDef = 0x06,
    /// `ParamPtr` table (0x07) - Parameter indirection of unoptimized images
    ParamPtr = 0x07,
    /// `Param` table (0x08) - Parameter definitions
    Param = 0x08,
    /// `InterfaceImpl` table (0x09) - Interface implementations by types
    InterfaceImpl = 0x09,
    /// `MemberRef` table (0x0A) - References to members of other scopes
    MemberRef = 0x0A,
    /// `Constant` table (0x0B) - Compile-time constant values
    Constant = 0x0B,
    /// `CustomAttribute` table (0x0C) - Custom attribute applications
    CustomAttribute = 0x0C,
    /// `FieldMarshal` table (0x0D) - Marshalling information
    FieldMarshal = 0x0D,
    /// `DeclSecurity` table (0x0E) - Declarative security
    DeclSecurity = 0x0E,
    /// `ClassLayout` table (0x0F) - Explicit type layouts
    ClassLayout = 0x0F,
    /// `FieldLayout` table (0x10) - Explicit field offsets
    FieldLayout = 0x10,
    /// `StandAloneSig` table (0x11) - Standalone signatures
    StandAloneSig = 0x11,
    /// `EventMap` table (0x12) - Type to event list mapping
    EventMap = 0x12,
    /// `EventPtr` table (0x13) - Event indirection of unoptimized images
    EventPtr = 0x13,
    /// `Event` table (0x14) - Event definitions
    Event = 0x14,
    /// `PropertyMap` table (0x15) - Type to property list mapping
    PropertyMap = 0x15,
    /// `PropertyPtr` table (0x16) - Property indirection of unoptimized images
    PropertyPtr = 0x16,
    /// `Property` table (0x17) - Property definitions
    Property = 0x17,
    /// `MethodSemantics` table (0x18) - Accessor to property and event mapping
    MethodSemantics = 0x18,
    /// `MethodImpl` table (0x19) - Method implementation mappings
    MethodImpl = 0x19,
    /// `ModuleRef` table (0x1A) - References to other modules
    ModuleRef = 0x1A,
    /// `TypeSpec` table (0x1B) - Type specifications
    TypeSpec = 0x1B,
    /// `ImplMap` table (0x1C) - Native interop mappings
    ImplMap = 0x1C,
    /// `FieldRVA` table (0x1D) - Initial data of fields
    FieldRVA = 0x1D,
    /// `ENCLog` table (0x1E) - Edit-and-continue log
    EncLog = 0x1E,
    /// `ENCMap` table (0x1F) - Edit-and-continue token map
    EncMap = 0x1F,
    /// `Assembly` table (0x20) - The assembly manifest
    Assembly = 0x20,
    /// `AssemblyProcessor` table (0x21) - Unused processor info
    AssemblyProcessor = 0x21,
    /// `AssemblyOS` table (0x22) - Unused OS info
    AssemblyOS = 0x22,
    /// `AssemblyRef` table (0x23) - Referenced assemblies
    AssemblyRef = 0x23,
    /// `AssemblyRefProcessor` table (0x24) - Unused reference processor info
    AssemblyRefProcessor = 0x24,
    /// `AssemblyRefOS` table (0x25) - Unused reference OS info
    AssemblyRefOS = 0x25,
    /// `File` table (0x26) - Files of a multi-file assembly
    File = 0x26,
    /// `ExportedType` table (0x27) - Types forwarded or exported
    ExportedType = 0x27,
    /// `ManifestResource` table (0x28) - Resources
    ManifestResource = 0x28,
    /// `NestedClass` table (0x29) - Nesting relationships
    NestedClass = 0x29,
    /// `GenericParam` table (0x2A) - Generic parameters
    GenericParam = 0x2A,
    /// `MethodSpec` table (0x2B) - Generic method instantiations
    MethodSpec = 0x2B,
    /// `GenericParamConstraint` table (0x2C) - Generic parameter constraints
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Index of the table in the engine's per-table arrays
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The token type tag of rows of this table
    #[must_use]
    pub fn token_type(self) -> u32 {
        (self as u32) << 24
    }

    /// The token of row `row` of this table
    #[must_use]
    pub fn token(self, row: u32) -> Token {
        Token::from_parts(self.token_type(), row)
    }
}

impl TryFrom<u8> for TableId {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        use strum::IntoEnumIterator;

        TableId::iter()
            .find(|table| *table as u8 == value)
            .ok_or(value)
    }
}

impl TryFrom<Token> for TableId {
    type Error = Error;

    fn try_from(token: Token) -> std::result::Result<Self, Self::Error> {
        TableId::try_from(token.table()).map_err(|_| Error::InvalidToken(token))
    }
}
