//! Handler loader: resolves the configured entry point once at startup.
//!
//! The handler source is a native shared library exporting the symbols
//! described in `fnhost-sdk`. Loading never fails outward: a missing file
//! installs [`EchoHandler`], any other problem installs
//! [`FailedLoadHandler`].

use crate::function::handler::{EchoHandler, FailedLoadHandler, Handler, HandlerError};
use crate::http::InvocationEvent;
use fnhost_sdk::{FnOwned, FnSlice, Outcome};
use libloading::Library;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Export looked up when the configured one is missing.
pub const DEFAULT_EXPORT: &str = "handler";

type EntryFn = unsafe extern "C" fn(FnSlice) -> FnOwned;
type FreeFn = unsafe extern "C" fn(FnOwned);

/// Parsed `<module>.<export>` specifier.
///
/// Only the export name matters; the module qualifier is kept for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub module: Option<String>,
    pub export: String,
}

impl EntryPoint {
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let (module, export) = match spec.rsplit_once('.') {
            Some((module, export)) => (Some(module.to_string()), export),
            None => (None, spec),
        };
        let export = if export.is_empty() {
            DEFAULT_EXPORT
        } else {
            export
        };
        Self {
            module,
            export: export.to_string(),
        }
    }

    /// Symbols to try, in order.
    fn candidates(&self) -> Vec<&str> {
        let mut names = vec![self.export.as_str()];
        if self.export != DEFAULT_EXPORT {
            names.push(DEFAULT_EXPORT);
        }
        names
    }
}

impl std::fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{}.{}", module, self.export),
            None => write!(f, "{}", self.export),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load library '{path}': {source}")]
    Library {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("handler '{export}' not found in '{path}'")]
    MissingExport { path: PathBuf, export: String },
    #[error("handler '{0}' has no '{0}_free' companion symbol")]
    MissingFree(String),
}

/// Which kind of handler ended up installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// The configured library was loaded and resolved.
    Loaded,
    /// No handler source was present.
    Echo,
    /// Loading failed; every request gets the load error.
    Failed,
}

pub struct LoadedHandler {
    pub handler: Arc<dyn Handler>,
    pub kind: HandlerKind,
}

impl std::fmt::Debug for LoadedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedHandler")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A handler living in a dynamically loaded library.
pub struct NativeHandler {
    export: String,
    entry: EntryFn,
    free: FreeFn,
    // Keeps `entry` and `free` valid.
    _library: Library,
}

impl NativeHandler {
    pub fn open(path: &Path, entry_point: &EntryPoint) -> Result<Self, LoadError> {
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Library {
            path: path.to_path_buf(),
            source,
        })?;

        let mut resolved = None;
        for name in entry_point.candidates() {
            match unsafe { library.get::<EntryFn>(name.as_bytes()) } {
                Ok(symbol) => {
                    resolved = Some((name.to_string(), *symbol));
                    break;
                }
                Err(e) => warn!("Export '{}' not resolved: {}", name, e),
            }
        }
        let (export, entry) = resolved.ok_or_else(|| LoadError::MissingExport {
            path: path.to_path_buf(),
            export: entry_point.export.clone(),
        })?;

        let free_name = format!("{}_free", export);
        let free = unsafe { library.get::<FreeFn>(free_name.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|_| LoadError::MissingFree(export.clone()))?;

        Ok(Self {
            export,
            entry,
            free,
            _library: library,
        })
    }

    pub fn export(&self) -> &str {
        &self.export
    }
}

impl Handler for NativeHandler {
    fn call(&self, event: InvocationEvent) -> Result<Value, HandlerError> {
        let request = fnhost_sdk::encode_event(&event)?;

        let owned = unsafe {
            (self.entry)(FnSlice {
                ptr: request.as_ptr(),
                len: request.len(),
            })
        };
        if owned.ptr.is_null() && owned.len != 0 {
            return Err(HandlerError::Wire("null response pointer".to_string()));
        }

        let bytes = if owned.len == 0 {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(owned.ptr, owned.len).to_vec() }
        };
        // The buffer was allocated by the library, so it is freed there.
        unsafe { (self.free)(owned) };

        match fnhost_sdk::decode_outcome(&bytes)? {
            Outcome::Ok(value) => Ok(value),
            Outcome::Err(message) => Err(HandlerError::Failed(message)),
        }
    }
}

/// Loads the handler once from a configured location.
#[derive(Debug, Clone)]
pub struct HandlerLoader {
    code_path: PathBuf,
    entry_point: EntryPoint,
}

impl HandlerLoader {
    pub fn new(code_path: impl Into<PathBuf>, entry_point: &str) -> Self {
        Self {
            code_path: code_path.into(),
            entry_point: EntryPoint::parse(entry_point),
        }
    }

    pub fn load(&self) -> LoadedHandler {
        if !self.code_path.exists() {
            info!(
                "No function code found at {}, using echo handler",
                self.code_path.display()
            );
            return LoadedHandler {
                handler: Arc::new(EchoHandler),
                kind: HandlerKind::Echo,
            };
        }

        match NativeHandler::open(&self.code_path, &self.entry_point) {
            Ok(native) => {
                info!(
                    "Function loaded successfully: {} (export '{}')",
                    self.entry_point,
                    native.export()
                );
                LoadedHandler {
                    handler: Arc::new(native),
                    kind: HandlerKind::Loaded,
                }
            }
            Err(e) => {
                error!("Error loading function: {}", e);
                LoadedHandler {
                    handler: Arc::new(FailedLoadHandler::new(e.to_string())),
                    kind: HandlerKind::Failed,
                }
            }
        }
    }
}
