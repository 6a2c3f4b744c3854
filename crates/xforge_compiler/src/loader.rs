//! Load contexts for emitted module images.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::image::{self, TypeImage};
use crate::references::{ModuleReference, NativeLibrary};

/// An isolated context holding one loaded module.
///
/// Every compilation loads into its own context; types from different
/// contexts never share state. The context stays alive while any handle or
/// instance refers to it, but once unloaded it refuses to construct or run
/// anything.
pub struct LoadContext {
    name: String,
    types: Vec<Arc<TypeImage>>,
    by_full_name: HashMap<String, usize>,
    references: Vec<ModuleReference>,
    loaded_at: DateTime<Utc>,
    unloaded: AtomicBool,
}

impl LoadContext {
    /// Deserialize `bytes` into a fresh context.
    pub fn load(bytes: &[u8], references: Vec<ModuleReference>) -> Result<CompiledModule, LoadError> {
        let image = image::read(bytes)?;
        let types: Vec<Arc<TypeImage>> = image.types.into_iter().map(Arc::new).collect();
        let by_full_name = types
            .iter()
            .enumerate()
            .map(|(index, ty)| (ty.full_name.clone(), index))
            .collect();

        info!(
            "Loaded module {} ({} types, {} bytes)",
            image.name,
            types.len(),
            bytes.len()
        );

        Ok(CompiledModule {
            context: Arc::new(LoadContext {
                name: image.name,
                types,
                by_full_name,
                references,
                loaded_at: Utc::now(),
                unloaded: AtomicBool::new(false),
            }),
        })
    }
}

/// Handle to a loaded module. Clones share the same context.
#[derive(Clone)]
pub struct CompiledModule {
    context: Arc<LoadContext>,
}

impl CompiledModule {
    /// Unique unit name, `DynamicModule_<uuid>`.
    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.context.loaded_at
    }

    pub fn is_loaded(&self) -> bool {
        !self.context.unloaded.load(Ordering::Acquire)
    }

    /// Release the load context.
    ///
    /// Returns `false` if it was already unloaded. Other modules, including
    /// ones that reference this one, stay loaded.
    pub fn unload(&self) -> bool {
        let first = !self.context.unloaded.swap(true, Ordering::AcqRel);
        if first {
            info!("Unloaded module {}", self.context.name);
        }
        first
    }

    pub fn same_module(&self, other: &CompiledModule) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }

    pub fn type_count(&self) -> usize {
        self.context.types.len()
    }

    /// Any type by exact full name, regardless of visibility.
    pub(crate) fn type_by_full_name(&self, full_name: &str) -> Option<Arc<TypeImage>> {
        self.context
            .by_full_name
            .get(full_name)
            .map(|&index| Arc::clone(&self.context.types[index]))
    }

    pub(crate) fn exported_types(&self) -> impl Iterator<Item = &Arc<TypeImage>> {
        self.context.types.iter().filter(|ty| ty.public)
    }

    pub(crate) fn native_library(&self, name: &str) -> Option<&NativeLibrary> {
        self.context.references.iter().find_map(|r| match r {
            ModuleReference::Native(library) if library.name() == name => Some(library.as_ref()),
            _ => None,
        })
    }

    pub(crate) fn referenced_module(&self, name: &str) -> Option<&CompiledModule> {
        let module = self.context.references.iter().find_map(|r| match r {
            ModuleReference::Module(module) if module.name() == name => Some(module),
            _ => None,
        });
        if module.is_none() {
            debug!("Module {} has no reference named {}", self.context.name, name);
        }
        module
    }
}

impl fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModule")
            .field("name", &self.context.name)
            .field("types", &self.context.types.len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
