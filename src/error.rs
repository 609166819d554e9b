use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! unsupported_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Unsupported {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Unsupported {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! precondition_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Precondition {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Precondition {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Layout drift
/// - [`Error::Unsupported`] - A structure shape outside the mirrored engine build was encountered
///   (unknown precode discriminator, reflection-emit importer, type-desc handle). These signal that
///   the running engine does not match the build profile and abort the current operation.
///
/// ## Lookup failures
/// - [`Error::InvalidToken`] - A metadata token with row index zero or past the table's row count.
///   Recoverable, callers usually treat it as "not found".
///
/// ## Programmer errors
/// - [`Error::Precondition`] - An operation was requested on a structure that cannot satisfy it,
///   e.g. asking for the non-vtable slot of a descriptor that has none.
///
/// ## Host process
/// - [`Error::ImageNotFound`] - The engine image is not loaded in this process
/// - [`Error::Os`] - A virtual memory primitive failed
/// - [`Error::GoblinErr`] - The in-memory image headers could not be parsed
/// - [`Error::EngineCall`] - An engine-internal function returned a failing HRESULT
///
/// # Examples
///
/// ```rust,no_run
/// use clrlive::{Engine, Error};
///
/// match Engine::global() {
///     Ok(engine) => println!("engine at {}", engine.image().base),
///     Err(Error::ImageNotFound(name)) => eprintln!("{} is not loaded", name),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A structure was found in a shape this build profile does not mirror.
    ///
    /// The error includes the source location where the unsupported shape was detected, as the
    /// message alone is rarely enough to tell which overlay drifted.
    #[error("Unsupported - {file}:{line}: {message}")]
    Unsupported {
        /// The message to be printed for the Unsupported error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The row index of a metadata token is zero or exceeds the table's row count.
    ///
    /// The associated [`Token`] is the token that failed to resolve.
    #[error("Invalid metadata token - {0}")]
    InvalidToken(Token),

    /// An operation was requested that the target structure cannot satisfy.
    #[error("Precondition violated - {file}:{line}: {message}")]
    Precondition {
        /// The message to be printed for the Precondition error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The engine image could not be located in the current process.
    ///
    /// The associated value is the image name that was searched for.
    #[error("No loaded engine image matching '{0}' in this process")]
    ImageNotFound(String),

    /// A virtual memory primitive of the host OS failed.
    #[error("{0}")]
    Os(#[from] std::io::Error),

    /// Error from the goblin crate while parsing in-memory image headers.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// An engine-internal function reported failure.
    ///
    /// The associated value is the returned HRESULT.
    #[error("Engine call failed with HRESULT 0x{0:08x}")]
    EngineCall(i32),

    /// Failed to lock target.
    ///
    /// Only the precode heap is guarded by a lock, this occurs when that lock was poisoned.
    #[error("Failed to lock target")]
    LockError,
}
