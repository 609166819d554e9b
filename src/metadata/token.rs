use std::fmt;
use std::hash::{Hash, Hasher};

use crate::layout::types::{METHOD_TOKEN_RANGE_MASK, METHOD_TOKEN_REMAINDER_BIT_COUNT, METHOD_TOKEN_REMAINDER_MASK};

/// A metadata token referencing a row of a metadata table.
///
/// Tokens are 32-bit values where:
/// - The high byte (bits 24-31) is the token type, identifying the table
/// - The low 24 bits (bits 0-23) are the 1-based row index within that table
///
/// Method definition tokens are never stored whole by the engine. Each method descriptor keeps
/// the low 12 bits of the row, its chunk the next 12; [`Token::merge_method_token`] and
/// [`Token::split_method_token`] convert between both forms.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

/// Token type tags, the high byte of a token shifted into place
pub struct TokenType;

#[allow(missing_docs)]
impl TokenType {
    pub const MODULE: u32 = 0x0000_0000;
    pub const TYPE_REF: u32 = 0x0100_0000;
    pub const TYPE_DEF: u32 = 0x0200_0000;
    pub const FIELD_DEF: u32 = 0x0400_0000;
    pub const METHOD_DEF: u32 = 0x0600_0000;
    pub const PARAM_DEF: u32 = 0x0800_0000;
    pub const INTERFACE_IMPL: u32 = 0x0900_0000;
    pub const MEMBER_REF: u32 = 0x0a00_0000;
    pub const CUSTOM_ATTRIBUTE: u32 = 0x0c00_0000;
    pub const PERMISSION: u32 = 0x0e00_0000;
    pub const SIGNATURE: u32 = 0x1100_0000;
    pub const EVENT: u32 = 0x1400_0000;
    pub const PROPERTY: u32 = 0x1700_0000;
    pub const METHOD_IMPL: u32 = 0x1900_0000;
    pub const MODULE_REF: u32 = 0x1a00_0000;
    pub const TYPE_SPEC: u32 = 0x1b00_0000;
    pub const ASSEMBLY: u32 = 0x2000_0000;
    pub const ASSEMBLY_REF: u32 = 0x2300_0000;
    pub const FILE: u32 = 0x2600_0000;
    pub const EXPORTED_TYPE: u32 = 0x2700_0000;
    pub const MANIFEST_RESOURCE: u32 = 0x2800_0000;
    pub const NESTED_CLASS: u32 = 0x2900_0000;
    pub const GENERIC_PARAM: u32 = 0x2a00_0000;
    pub const METHOD_SPEC: u32 = 0x2b00_0000;
    pub const GENERIC_PARAM_CONSTRAINT: u32 = 0x2c00_0000;
    pub const STRING: u32 = 0x7000_0000;
    pub const NAME: u32 = 0x7100_0000;
    pub const BASE_TYPE: u32 = 0x7200_0000;
}

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token from a type tag and a row index
    #[must_use]
    pub fn from_parts(token_type: u32, row: u32) -> Self {
        Token((token_type & 0xFF00_0000) | (row & 0x00FF_FFFF))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The type tag, the high byte in place
    #[must_use]
    pub fn token_type(&self) -> u32 {
        self.0 & 0xFF00_0000
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Rebuilds a method definition token from a chunk's token range and a descriptor's remainder
    ///
    /// ## Arguments
    /// * 'range'     - High 12 bits of the row, from the method descriptor chunk
    /// * 'remainder' - Low 12 bits of the row, from the method descriptor
    #[must_use]
    pub fn merge_method_token(range: u16, remainder: u16) -> Self {
        let range = u32::from(range & METHOD_TOKEN_RANGE_MASK);
        let remainder = u32::from(remainder & METHOD_TOKEN_REMAINDER_MASK);
        Token((range << METHOD_TOKEN_REMAINDER_BIT_COUNT) | remainder | TokenType::METHOD_DEF)
    }

    /// Splits a method definition token into its chunk range and descriptor remainder
    #[must_use]
    pub fn split_method_token(&self) -> (u16, u16) {
        let row = self.row();
        let range = (row >> METHOD_TOKEN_REMAINDER_BIT_COUNT) as u16 & METHOD_TOKEN_RANGE_MASK;
        let remainder = row as u16 & METHOD_TOKEN_REMAINDER_MASK;
        (range, remainder)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
