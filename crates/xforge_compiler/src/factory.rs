//! Instantiation of compiled types by name.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{InstantiationError, RuntimeError};
use crate::image::TypeImage;
use crate::loader::CompiledModule;
use crate::runtime::{Instance, Interpreter};
use crate::value::Value;

/// Public shape of an exported type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub name: String,
    pub full_name: String,
    pub namespace: Option<String>,
    pub constructors: Vec<usize>,
    pub methods: Vec<MethodDescriptor>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub arity: usize,
}

impl From<&TypeImage> for TypeDescriptor {
    fn from(ty: &TypeImage) -> Self {
        Self {
            name: ty.name.clone(),
            full_name: ty.full_name.clone(),
            namespace: ty.namespace.clone(),
            constructors: ty.constructor_arities(),
            methods: ty
                .methods
                .iter()
                .filter(|m| m.public)
                .map(|m| MethodDescriptor {
                    name: m.name.clone(),
                    arity: m.params.len(),
                })
                .collect(),
            fields: ty
                .fields
                .iter()
                .filter(|f| f.public)
                .map(|f| f.name.clone())
                .collect(),
        }
    }
}

/// Creates instances of types from a loaded module.
pub struct InstanceFactory;

impl InstanceFactory {
    /// Create an instance, or `None` when the type is missing, no constructor
    /// accepts `args`, construction fails, or the module is unloaded.
    pub fn create_instance(module: &CompiledModule, type_name: &str, args: &[Value]) -> Option<Instance> {
        match Self::try_create_instance(module, type_name, args) {
            Ok(instance) => Some(instance),
            Err(e) => {
                debug!("No instance of {} from {}: {}", type_name, module.name(), e);
                None
            }
        }
    }

    /// Create an instance, reporting why none could be produced.
    ///
    /// Lookup tries the exact full name across all types first, then the
    /// first exported type whose simple or full name matches.
    pub fn try_create_instance(
        module: &CompiledModule,
        type_name: &str,
        args: &[Value],
    ) -> Result<Instance, InstantiationError> {
        if !module.is_loaded() {
            return Err(InstantiationError::Unloaded(module.name().to_string()));
        }

        let ty = Self::resolve(module, type_name)
            .ok_or_else(|| InstantiationError::TypeNotFound(type_name.to_string()))?;
        let full_name = ty.full_name.clone();

        match Interpreter::new().construct(module, ty, args) {
            Ok(instance) => {
                debug!("Created instance of {}", full_name);
                Ok(instance)
            }
            Err(RuntimeError::NoMatchingConstructor { type_name, arity }) => {
                Err(InstantiationError::NoMatchingConstructor { type_name, arity })
            }
            Err(RuntimeError::ModuleUnloaded(name)) => Err(InstantiationError::Unloaded(name)),
            Err(source) => {
                warn!("Constructor of {} failed: {}", full_name, source);
                Err(InstantiationError::ConstructorFailed {
                    type_name: full_name,
                    source,
                })
            }
        }
    }

    /// Descriptors for the module's public types, in declaration order.
    pub fn list_exported_types(module: &CompiledModule) -> Vec<TypeDescriptor> {
        module
            .exported_types()
            .map(|ty| TypeDescriptor::from(ty.as_ref()))
            .collect()
    }

    fn resolve(module: &CompiledModule, type_name: &str) -> Option<Arc<TypeImage>> {
        module.type_by_full_name(type_name).or_else(|| {
            module
                .exported_types()
                .find(|ty| ty.name == type_name || ty.full_name == type_name)
                .cloned()
        })
    }
}
