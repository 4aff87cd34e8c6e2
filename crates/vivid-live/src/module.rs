//! The chain-module ABI and its loader.
//!
//! A chain project is a `cdylib` crate whose `lib.rs` defines `setup` and
//! `update` and exports them with [`vivid_chain!`]. The host resolves the
//! exported symbols by fixed name, checks the ABI version, and drives the
//! chain through `extern "C-unwind"` entry points — `C` for a stable
//! symbol surface, `-unwind` so a panicking operator propagates to the
//! host's containment instead of aborting at the boundary. The chain
//! itself is created and destroyed *inside the module* (allocator and
//! vtables belong to the module's code), crossing the boundary only as an
//! opaque pointer.
//!
//! Drop order is the one hard rule: every [`LoadedChain`] must be dropped
//! before its [`ChainModule`], and the module before a replacement is
//! loaded. [`HotReload`](crate::HotReload) sequences this.

use std::path::{Path, PathBuf};

use vivid_core::{Chain, Context};

use crate::error::LiveError;

/// ABI version stamped into every chain module by [`vivid_chain!`].
///
/// Bumped whenever the `Chain`/`Context` layout or the entry-point
/// signatures change.
pub const ABI_VERSION: u32 = 1;

/// Exports the chain entry points under the fixed symbol names the
/// hot-reload loader resolves.
///
/// ```rust,ignore
/// use vivid_live::vivid_chain;
///
/// fn setup(ctx: &mut Context) -> Chain { /* build the chain */ }
/// fn update(chain: &mut Chain, ctx: &mut Context) { chain.process(ctx); }
///
/// vivid_chain!(setup, update);
/// ```
#[macro_export]
macro_rules! vivid_chain {
    ($setup:path, $update:path) => {
        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn vivid_abi_version() -> u32 {
            $crate::ABI_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C-unwind" fn vivid_setup(ctx: &mut $crate::Context) -> *mut $crate::Chain {
            let chain: $crate::Chain = $setup(ctx);
            Box::into_raw(Box::new(chain))
        }

        /// # Safety
        ///
        /// `chain` must be a live pointer returned by `vivid_setup` from
        /// this same module.
        #[unsafe(no_mangle)]
        pub unsafe extern "C-unwind" fn vivid_update(
            chain: *mut $crate::Chain,
            ctx: &mut $crate::Context,
        ) {
            let chain = unsafe { &mut *chain };
            $update(chain, ctx);
        }

        /// # Safety
        ///
        /// `chain` must be a live pointer returned by `vivid_setup` from
        /// this same module, not used again afterwards.
        #[unsafe(no_mangle)]
        pub unsafe extern "C-unwind" fn vivid_drop(chain: *mut $crate::Chain) {
            drop(unsafe { Box::from_raw(chain) });
        }
    };
}

type AbiVersionFn = extern "C-unwind" fn() -> u32;
type SetupFn = extern "C-unwind" fn(&mut Context) -> *mut Chain;
type UpdateFn = unsafe extern "C-unwind" fn(*mut Chain, &mut Context);
type DropFn = unsafe extern "C-unwind" fn(*mut Chain);

/// A loaded chain module.
///
/// Holds the dynamic library open; the extracted function pointers stay
/// valid exactly as long as this value lives.
pub struct ChainModule {
    // Field order matters: `_lib` must drop last.
    setup: SetupFn,
    update: UpdateFn,
    drop_chain: DropFn,
    path: PathBuf,
    _lib: libloading::Library,
}

impl ChainModule {
    /// Loads a compiled chain artifact and resolves its entry points.
    ///
    /// # Safety
    ///
    /// Loading a dynamic library runs its initializers, and the resolved
    /// symbols are trusted to match the [`vivid_chain!`] signatures. Both
    /// hold for artifacts produced from the same workspace toolchain,
    /// which is the only thing the hot-reload pipeline loads.
    pub unsafe fn load(path: &Path) -> Result<Self, LiveError> {
        let lib = unsafe { libloading::Library::new(path) }.map_err(|err| {
            LiveError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }
        })?;

        let abi_version: AbiVersionFn = unsafe { Self::symbol(&lib, path, b"vivid_abi_version")? };
        let found = abi_version();
        if found != ABI_VERSION {
            return Err(LiveError::AbiMismatch {
                expected: ABI_VERSION,
                found,
            });
        }

        let setup: SetupFn = unsafe { Self::symbol(&lib, path, b"vivid_setup")? };
        let update: UpdateFn = unsafe { Self::symbol(&lib, path, b"vivid_update")? };
        let drop_chain: DropFn = unsafe { Self::symbol(&lib, path, b"vivid_drop")? };

        tracing::info!(path = %path.display(), "chain module loaded");
        Ok(Self {
            setup,
            update,
            drop_chain,
            path: path.to_path_buf(),
            _lib: lib,
        })
    }

    unsafe fn symbol<T: Copy>(
        lib: &libloading::Library,
        path: &Path,
        name: &[u8],
    ) -> Result<T, LiveError> {
        let symbol = unsafe { lib.get::<T>(name) }.map_err(|err| LiveError::LoadFailed {
            path: path.to_path_buf(),
            message: format!("missing symbol {}: {err}", String::from_utf8_lossy(name)),
        })?;
        Ok(*symbol)
    }

    /// The artifact this module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the module's `setup`, returning the chain it built.
    ///
    /// The returned [`LoadedChain`] must be dropped before this module.
    pub fn setup(&self, ctx: &mut Context) -> LoadedChain {
        LoadedChain {
            ptr: (self.setup)(ctx),
            update: self.update,
            drop_chain: self.drop_chain,
        }
    }
}

/// A chain owned by a loaded module.
///
/// Destruction runs inside the module (`vivid_drop`), so the module's
/// allocator frees what it allocated.
pub struct LoadedChain {
    ptr: *mut Chain,
    update: UpdateFn,
    drop_chain: DropFn,
}

impl LoadedChain {
    /// The chain, for processing and inspection on the host side.
    pub fn chain_mut(&mut self) -> &mut Chain {
        // Valid by construction: ptr came from vivid_setup and is dropped
        // exactly once, in Drop.
        unsafe {
            &mut *self.ptr
        }
    }

    /// Shared view of the chain.
    pub fn chain(&self) -> &Chain {
        unsafe {
            &*self.ptr
        }
    }

    /// Runs the module's per-frame `update`.
    pub fn update(&mut self, ctx: &mut Context) {
        unsafe {
            (self.update)(self.ptr, ctx);
        }
    }
}

impl Drop for LoadedChain {
    fn drop(&mut self) {
        unsafe {
            (self.drop_chain)(self.ptr);
        }
    }
}
