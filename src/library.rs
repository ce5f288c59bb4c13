//! Locating and loading the SDK library.
//!
//! A [`Resolver`] tries, in order: an explicit path, the package-local
//! `lib/` directory, the file named by the `ZWO_ASI_LIB` environment
//! variable, and finally the platform's own library search by name. The
//! first library that loads is kept for the life of the resolver; later
//! calls return it without touching the loader again. A failed attempt
//! leaves the resolver empty so it can be retried.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock, PoisonError};

use tracing::{debug, info, warn};

use crate::error::{AsiError, Result};
use crate::ffi::AsiSdk;

/// Environment variable naming an SDK library file.
pub const LIBRARY_ENV_VAR: &str = "ZWO_ASI_LIB";

/// Base name of the SDK library.
pub const LIBRARY_NAME: &str = "ASICamera2";

/// File names to look for in a directory, in the order they are tried.
#[must_use]
pub fn candidate_file_names(base: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{base}.dll")]
    } else if cfg!(target_os = "macos") {
        vec![format!("lib{base}.dylib"), format!("{base}.dylib")]
    } else {
        vec![format!("lib{base}.so"), format!("{base}.so")]
    }
}

/// Where a [`Resolver`] looks for the SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Directory holding a bundled `lib/` folder; `None` skips that step.
    pub package_dir: Option<PathBuf>,
    /// Environment variable consulted after the package directory.
    pub env_var: String,
    /// Library base name, without platform prefix or extension.
    pub library_name: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverConfig {
    /// Configuration rooted at the directory of the running executable.
    #[must_use]
    pub fn new() -> Self {
        let package_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self {
            package_dir,
            env_var: LIBRARY_ENV_VAR.to_owned(),
            library_name: LIBRARY_NAME.to_owned(),
        }
    }

    /// Set the package directory.
    #[must_use]
    pub fn with_package_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.package_dir = dir;
        self
    }

    /// Set the environment variable name.
    #[must_use]
    pub fn with_env_var(mut self, name: &str) -> Self {
        name.clone_into(&mut self.env_var);
        self
    }

    /// Set the library base name.
    #[must_use]
    pub fn with_library_name(mut self, name: &str) -> Self {
        name.clone_into(&mut self.library_name);
        self
    }

    /// Existing files in the package `lib/` directory.
    fn package_candidates(&self) -> Vec<PathBuf> {
        let Some(dir) = &self.package_dir else {
            return Vec::new();
        };
        let lib_dir = dir.join("lib");
        candidate_file_names(&self.library_name)
            .into_iter()
            .map(|name| lib_dir.join(name))
            .filter(|path| path.is_file())
            .collect()
    }

    /// The environment override, if set and pointing at an existing file.
    fn env_candidate(&self) -> Option<PathBuf> {
        let value = env::var_os(&self.env_var)?;
        let path = PathBuf::from(value);
        if path.is_file() {
            Some(path)
        } else {
            debug!(var = %self.env_var, path = %path.display(), "environment library path does not exist");
            None
        }
    }

    /// Bare file name handed to the platform search path.
    fn system_name(&self) -> OsString {
        libloading::library_filename(&self.library_name)
    }
}

/// Turns a library location into a bound SDK handle.
pub trait SdkLoader {
    /// The handle produced by a successful load.
    type Sdk;

    /// Load the library at `path`, which may be a bare name for system search.
    fn load(&self, path: &Path) -> Result<Self::Sdk>;
}

/// Loads the real SDK through `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl SdkLoader for NativeLoader {
    type Sdk = AsiSdk;

    fn load(&self, path: &Path) -> Result<AsiSdk> {
        AsiSdk::load(path)
    }
}

/// One-time SDK resolution with a retryable failure path.
pub struct Resolver<L: SdkLoader = NativeLoader> {
    config: ResolverConfig,
    loader: L,
    sdk: OnceLock<L::Sdk>,
    init_lock: Mutex<()>,
}

impl Resolver<NativeLoader> {
    /// Resolver for the real SDK.
    #[must_use]
    pub const fn new(config: ResolverConfig) -> Self {
        Self::with_loader(config, NativeLoader)
    }
}

impl<L: SdkLoader> Resolver<L> {
    /// Resolver using a custom loader.
    #[must_use]
    pub const fn with_loader(config: ResolverConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            sdk: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The loaded SDK, if resolution has succeeded.
    #[must_use]
    pub fn get(&self) -> Option<&L::Sdk> {
        self.sdk.get()
    }

    /// Whether resolution has succeeded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.sdk.get().is_some()
    }

    /// Resolve the SDK, loading it on the first successful call.
    ///
    /// With `explicit` set, only that path is tried and it must exist.
    /// Once loaded, `explicit` is ignored and the existing handle returned.
    ///
    /// # Errors
    ///
    /// - `LibraryNotFound` if no candidate exists or the system search fails
    /// - `LibraryLoad` if a found file cannot be loaded
    /// - `SymbolBinding` if the library lacks an entry point
    pub fn resolve(&self, explicit: Option<&Path>) -> Result<&L::Sdk> {
        if let Some(sdk) = self.sdk.get() {
            return Ok(sdk);
        }

        let _guard = self
            .init_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(sdk) = self.sdk.get() {
            return Ok(sdk);
        }

        let sdk = self.load_first(explicit)?;
        Ok(self.sdk.get_or_init(|| sdk))
    }

    fn load_first(&self, explicit: Option<&Path>) -> Result<L::Sdk> {
        if let Some(path) = explicit {
            if !path.is_file() {
                return Err(AsiError::LibraryNotFound(path.display().to_string()));
            }
            return self.load_found(path);
        }

        if let Some(path) = self.config.package_candidates().into_iter().next() {
            debug!(path = %path.display(), "trying package library");
            return self.load_found(&path);
        }

        if let Some(path) = self.config.env_candidate() {
            debug!(path = %path.display(), var = %self.config.env_var, "trying library from environment");
            return self.load_found(&path);
        }

        let name = self.config.system_name();
        debug!(name = ?name, "trying system library search");
        match self.loader.load(Path::new(&name)) {
            Ok(sdk) => {
                info!(name = ?name, "loaded ASI SDK from system search path");
                Ok(sdk)
            }
            Err(AsiError::LibraryLoad { source, .. }) => {
                debug!(error = %source, "system library search failed");
                Err(AsiError::LibraryNotFound(format!(
                    "{} not found in {}/lib, ${} or the system library path",
                    self.config.library_name,
                    self.config
                        .package_dir
                        .as_deref()
                        .map_or_else(|| "<no package dir>".to_owned(), |dir| dir.display().to_string()),
                    self.config.env_var,
                )))
            }
            Err(err) => Err(err),
        }
    }

    fn load_found(&self, path: &Path) -> Result<L::Sdk> {
        let sdk = self.loader.load(path)?;
        info!(path = %path.display(), "loaded ASI SDK");
        Ok(sdk)
    }

    /// Resolve from the default locations, logging instead of returning failure.
    pub fn try_resolve(&self) -> Option<&L::Sdk> {
        match self.resolve(None) {
            Ok(sdk) => Some(sdk),
            Err(err) => {
                warn!(error = %err, "ASI SDK not loaded; call init() once it is available");
                None
            }
        }
    }
}

static GLOBAL: OnceLock<Resolver> = OnceLock::new();

/// The process-wide resolver, configured from the running executable.
#[must_use]
pub fn global() -> &'static Resolver {
    GLOBAL.get_or_init(|| Resolver::new(ResolverConfig::new()))
}

/// Resolve the process-wide SDK handle.
///
/// Safe to call repeatedly; after the first success this is a lookup.
///
/// # Errors
///
/// See [`Resolver::resolve`].
pub fn init(path: Option<&Path>) -> Result<&'static AsiSdk> {
    global().resolve(path)
}

/// Best-effort process-wide resolution; failures are logged at warn level.
pub fn try_init() -> Option<&'static AsiSdk> {
    global().try_resolve()
}
