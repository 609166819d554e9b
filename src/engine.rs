//! The engine context every overlay is created from.
//!
//! An [`Engine`] pairs the resolved engine image with the [`BuildProfile`] describing the
//! running build. It owns the process-wide state this crate keeps on the engine's behalf: the
//! memoized pre-compilation thunk address and the heap for stubs created by this crate.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use clrlive::{Engine, EngineConfig};
//!
//! // The lazily initialized process-wide context
//! let engine = Engine::global()?;
//! println!("{} at {}", engine.profile().name, engine.image().base);
//!
//! // An explicit one, with tiered compilation treated as disabled
//! let engine = Engine::init(EngineConfig {
//!     tiered_compilation: false,
//!     ..EngineConfig::default()
//! })?;
//! for assembly in engine.app_domain()?.assemblies() {
//!     println!("{:?}", assembly.module().and_then(|m| m.simple_name()));
//! }
//! # Ok::<(), clrlive::Error>(())
//! ```

use std::sync::{Mutex, OnceLock};

use tracing::debug;

use crate::{
    layout::{
        Address, AppDomain, Assembly, BuildProfile, MethodDesc, MethodDescChunk, MethodTable,
        Module, NET8_X64,
    },
    metadata::import::MdImport,
    precode::{Precode, PrecodeHeap, PrecodeType},
    probe::{default_image_name, io, resolve_image, EngineImage},
    Error, Result,
};

static GLOBAL: OnceLock<Engine> = OnceLock::new();

/// Settings of an [`Engine`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// File name of the engine image to resolve
    pub image_name: String,
    /// Layout of the running engine build
    pub profile: &'static BuildProfile,
    /// Mirrors the engine's global tiered compilation switch
    pub tiered_compilation: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            image_name: default_image_name().to_string(),
            profile: &NET8_X64,
            tiered_compilation: true,
        }
    }
}

/// The engine a set of overlays belongs to.
#[derive(Debug)]
pub struct Engine {
    image: EngineImage,
    profile: &'static BuildProfile,
    pre_stub: Address,
    tiered_compilation: bool,
    precode_heap: Mutex<PrecodeHeap>,
}

impl Engine {
    /// Resolves the engine image named in `config` and creates a context for it
    ///
    /// # Errors
    /// Returns [`Error::ImageNotFound`] if the image is not loaded in this process.
    pub fn init(config: EngineConfig) -> Result<Self> {
        let image = resolve_image(&config.image_name)?;
        Ok(unsafe { Engine::with_image(image, config) })
    }

    /// Creates a context for an already resolved image.
    ///
    /// `config.image_name` is not used.
    ///
    /// # Safety
    /// `image` must describe a loaded engine of the build described by `config.profile`. Every
    /// image-relative offset of the profile is trusted to be valid inside it.
    #[must_use]
    pub unsafe fn with_image(image: EngineImage, config: EngineConfig) -> Self {
        let profile = config.profile;
        let pre_stub = image.at(profile.image.pre_stub);
        debug!(
            base = %image.base,
            profile = profile.name,
            %pre_stub,
            tiered_compilation = config.tiered_compilation,
            "created engine context"
        );

        Engine {
            image,
            profile,
            pre_stub,
            tiered_compilation: config.tiered_compilation,
            precode_heap: Mutex::new(PrecodeHeap::new(profile)),
        }
    }

    /// The process-wide context, initialized with [`EngineConfig::default`] on first use
    ///
    /// # Errors
    /// Returns any error of [`Engine::init`]. A failed initialization is retried on the next call.
    pub fn global() -> Result<&'static Engine> {
        if let Some(engine) = GLOBAL.get() {
            return Ok(engine);
        }

        let engine = Engine::init(EngineConfig::default())?;
        Ok(GLOBAL.get_or_init(|| engine))
    }

    /// The resolved engine image
    #[must_use]
    pub fn image(&self) -> EngineImage {
        self.image
    }

    /// The build profile overlays read their layout from
    #[must_use]
    pub fn profile(&self) -> &'static BuildProfile {
        self.profile
    }

    /// Address of the pre-compilation thunk
    #[must_use]
    pub fn pre_stub(&self) -> Address {
        self.pre_stub
    }

    /// Whether tiered compilation is enabled
    #[must_use]
    pub fn tiered_compilation(&self) -> bool {
        self.tiered_compilation
    }

    /// Allocates a new stub of `kind` from the crate's precode heap.
    ///
    /// The stub's code is written, its data record is zeroed.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the heap lock is poisoned, or any error of
    /// [`PrecodeHeap::allocate`].
    pub fn allocate_precode(&self, kind: PrecodeType) -> Result<Precode<'_>> {
        let address = self
            .precode_heap
            .lock()
            .map_err(|_| Error::LockError)?
            .allocate(kind)?;

        Ok(unsafe { Precode::new(self, address) })
    }

    /// The process-wide app domain
    ///
    /// # Errors
    /// Returns [`Error::Precondition`] if the engine has not created it yet.
    pub fn app_domain(&self) -> Result<AppDomain<'_>> {
        let global = self.image.at(self.profile.image.app_domain);
        match unsafe { io::read_ptr(global) }.non_null() {
            Some(address) => Ok(unsafe { AppDomain::new(self, address) }),
            None => Err(precondition_error!("The app domain is not created yet")),
        }
    }

    /// Overlays a method descriptor
    ///
    /// # Safety
    /// See the overlay constructors, `address` must be a live method descriptor.
    #[must_use]
    pub unsafe fn method_desc(&self, address: Address) -> MethodDesc<'_> {
        unsafe { MethodDesc::new(self, address) }
    }

    /// Overlays a method descriptor chunk
    ///
    /// # Safety
    /// `address` must be a live method descriptor chunk.
    #[must_use]
    pub unsafe fn method_desc_chunk(&self, address: Address) -> MethodDescChunk<'_> {
        unsafe { MethodDescChunk::new(self, address) }
    }

    /// Overlays a method table
    ///
    /// # Safety
    /// `address` must be a live method table.
    #[must_use]
    pub unsafe fn method_table(&self, address: Address) -> MethodTable<'_> {
        unsafe { MethodTable::new(self, address) }
    }

    /// Overlays a module
    ///
    /// # Safety
    /// `address` must be a live module.
    #[must_use]
    pub unsafe fn module(&self, address: Address) -> Module<'_> {
        unsafe { Module::new(self, address) }
    }

    /// Overlays an assembly
    ///
    /// # Safety
    /// `address` must be a live assembly.
    #[must_use]
    pub unsafe fn assembly(&self, address: Address) -> Assembly<'_> {
        unsafe { Assembly::new(self, address) }
    }

    /// Overlays a precode by its entry point
    ///
    /// # Safety
    /// `address` must be the entry point of a live stub with its data page mapped.
    #[must_use]
    pub unsafe fn precode(&self, address: Address) -> Precode<'_> {
        unsafe { Precode::new(self, address) }
    }

    /// Overlays a metadata importer
    ///
    /// # Safety
    /// `address` must be a live read-only importer.
    #[must_use]
    pub unsafe fn md_import(&self, address: Address) -> MdImport<'_> {
        unsafe { MdImport::new(self, address) }
    }
}
