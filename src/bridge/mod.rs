//! From host reflection objects to engine structures.
//!
//! The hosting application only sees its own reflection objects. Their private fields carry the
//! engine handles, a method descriptor for methods and a type handle for types, which is all this
//! crate needs as a starting point.
//!
//! ```rust,no_run
//! use clrlive::{bridge::HostMethod, layout::Address, Engine};
//!
//! let engine = Engine::global()?;
//! let object = Address(0x0000_01d2_3456_7890);
//! let method = unsafe { HostMethod::classify(engine, object, "RuntimeMethodInfo")? };
//! println!("{:?}", method.method_desc()?.current_entry_point()?);
//! # Ok::<(), clrlive::Error>(())
//! ```

mod handle;
mod types;

pub use handle::{DynamicMethod, HostMethod, RuntimeMethodInfo, RuntimeMethodStub};
pub use types::{ObjectArray, RuntimeTypeObject, TypeHandle, TYPE_DESC_TAG};
