//! Process-scoped table of lazy lookup functions.
//!
//! Registration happens once, through [`LazyRegistryBuilder`], before any
//! entry resolves a lazy field. [`LazyRegistryBuilder::build`] freezes the
//! table into a shared [`LazyRegistry`] handle that entries and the codec
//! keep for the rest of the process.

use std::{any::Any, fmt, sync::Arc};

use hashbrown::HashMap;

use crate::{
    entry::Entry,
    error::{EntryError, PluginError, RegistryError},
    value::{Value, ValueMap},
};

/// Arguments stored with a lazy attachment, handed to the function on call.
#[derive(Debug, Clone, Copy)]
pub struct LazyCall<'a> {
    /// Positional arguments.
    pub args: &'a [Value],
    /// Keyword arguments.
    pub kwargs: &'a ValueMap,
}

impl<'a> LazyCall<'a> {
    /// Positional argument at `idx`.
    pub fn arg(&self, idx: usize) -> Option<&'a Value> {
        self.args.get(idx)
    }

    /// Keyword argument named `name`.
    pub fn kwarg(&self, name: &str) -> Option<&'a Value> {
        self.kwargs.get(name)
    }
}

type FreeFn = dyn Fn(&mut Entry, &LazyCall<'_>) -> Result<(), PluginError> + Send + Sync;
type MethodFn =
    dyn Fn(&(dyn Any + Send + Sync), &mut Entry, &LazyCall<'_>) -> Result<(), PluginError> + Send + Sync;

/// A deferred computation that fills entry fields.
#[derive(Clone)]
pub enum LazyFunction {
    /// Plain function.
    Free(Arc<FreeFn>),
    /// Method of a plugin class, bound to the live plugin instance on call.
    Method {
        /// Name of the owning plugin class.
        class: String,
        /// Type check against a looked-up instance.
        accepts: fn(&(dyn Any + Send + Sync)) -> bool,
        /// Erased method body.
        func: Arc<MethodFn>,
    },
}

impl LazyFunction {
    /// Wraps a plain function.
    pub fn free<F>(func: F) -> Self
    where
        F: Fn(&mut Entry, &LazyCall<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        Self::Free(Arc::new(func))
    }

    /// Wraps a method of plugin type `P` registered under class name `class`.
    pub fn method<P, F>(class: impl Into<String>, func: F) -> Self
    where
        P: Any + Send + Sync,
        F: Fn(&P, &mut Entry, &LazyCall<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        let erased: Arc<MethodFn> =
            Arc::new(move |instance, entry, call| match instance.downcast_ref::<P>() {
                Some(plugin) => func(plugin, entry, call),
                None => Err(PluginError::new("plugin instance has an unexpected type")),
            });
        Self::Method {
            class: class.into(),
            accepts: accepts_instance::<P>,
            func: erased,
        }
    }

    /// Owning plugin class, for methods.
    pub fn owning_class(&self) -> Option<&str> {
        match self {
            Self::Free(_) => None,
            Self::Method { class, .. } => Some(class),
        }
    }

    fn same_function(&self, other: &LazyFunction) -> bool {
        match (self, other) {
            (Self::Free(a), Self::Free(b)) => Arc::ptr_eq(a, b),
            (Self::Method { func: a, .. }, Self::Method { func: b, .. }) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn accepts_instance<P: Any + Send + Sync>(instance: &(dyn Any + Send + Sync)) -> bool {
    instance.is::<P>()
}

impl fmt::Debug for LazyFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Free(_) => f.write_str("LazyFunction::Free"),
            Self::Method { class, .. } => write!(f, "LazyFunction::Method({class})"),
        }
    }
}

/// Lookup of live plugin singletons by class name.
pub trait PluginLookup: Send + Sync {
    /// Returns the instance of `class_name`, if one is loaded.
    fn lookup(&self, class_name: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// In-memory [`PluginLookup`] keyed by class name.
#[derive(Default)]
pub struct PluginInstances {
    instances: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl PluginInstances {
    /// Empty lookup table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `instance` as the singleton of `class_name`.
    pub fn insert<P: Any + Send + Sync>(&mut self, class_name: impl Into<String>, instance: P) {
        self.instances.insert(class_name.into(), Arc::new(instance));
    }
}

impl PluginLookup for PluginInstances {
    fn lookup(&self, class_name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.instances.get(class_name).cloned()
    }
}

/// Id of a registered lazy function, returned from registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LazyFuncHandle {
    id: String,
}

impl LazyFuncHandle {
    /// Registered id.
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Reference to a lazy function when attaching lazy fields.
#[derive(Debug, Clone)]
pub enum LazyFuncRef {
    /// By registered id.
    Id(String),
    /// By handle returned from registration.
    Handle(LazyFuncHandle),
    /// By function value; must be the same function that was registered.
    Function(LazyFunction),
}

impl From<&str> for LazyFuncRef {
    fn from(value: &str) -> Self {
        Self::Id(value.to_string())
    }
}

impl From<String> for LazyFuncRef {
    fn from(value: String) -> Self {
        Self::Id(value)
    }
}

impl From<LazyFuncHandle> for LazyFuncRef {
    fn from(value: LazyFuncHandle) -> Self {
        Self::Handle(value)
    }
}

impl From<&LazyFuncHandle> for LazyFuncRef {
    fn from(value: &LazyFuncHandle) -> Self {
        Self::Handle(value.clone())
    }
}

impl From<LazyFunction> for LazyFuncRef {
    fn from(value: LazyFunction) -> Self {
        Self::Function(value)
    }
}

impl From<&LazyFunction> for LazyFuncRef {
    fn from(value: &LazyFunction) -> Self {
        Self::Function(value.clone())
    }
}

/// Initialization-phase registry.
#[derive(Default)]
pub struct LazyRegistryBuilder {
    functions: HashMap<String, LazyFunction>,
    plugins: Option<Arc<dyn PluginLookup>>,
}

impl LazyRegistryBuilder {
    /// Empty builder without plugin lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plugin lookup used to bind method lazy functions.
    pub fn with_plugins(mut self, plugins: Arc<dyn PluginLookup>) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Registers `function` under `id`.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        function: LazyFunction,
    ) -> Result<LazyFuncHandle, RegistryError> {
        let id = id.into();
        if self.functions.contains_key(&id) {
            return Err(RegistryError::DuplicateRegistration(id));
        }
        self.functions.insert(id.clone(), function);
        Ok(LazyFuncHandle { id })
    }

    /// Registers a plain function.
    pub fn register_fn<F>(&mut self, id: impl Into<String>, func: F) -> Result<LazyFuncHandle, RegistryError>
    where
        F: Fn(&mut Entry, &LazyCall<'_>) -> Result<(), PluginError> + Send + Sync + 'static,
    {
        self.register(id, LazyFunction::free(func))
    }

    /// Freezes the registry.
    pub fn build(self) -> Arc<LazyRegistry> {
        Arc::new(LazyRegistry {
            functions: self.functions,
            plugins: self.plugins,
        })
    }
}

/// Frozen lazy function registry shared by entries.
#[derive(Default)]
pub struct LazyRegistry {
    functions: HashMap<String, LazyFunction>,
    plugins: Option<Arc<dyn PluginLookup>>,
}

impl LazyRegistry {
    /// Registry with no functions.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// True when `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    /// Function registered under `id`.
    pub fn get(&self, id: &str) -> Option<&LazyFunction> {
        self.functions.get(id)
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Maps a function reference to its registered id.
    pub fn resolve_ref(&self, func: &LazyFuncRef) -> Result<String, RegistryError> {
        match func {
            LazyFuncRef::Id(id) => self.known_id(id),
            LazyFuncRef::Handle(handle) => self.known_id(handle.id()),
            LazyFuncRef::Function(function) => self
                .functions
                .iter()
                .find(|(_, registered)| registered.same_function(function))
                .map(|(id, _)| id.clone())
                .ok_or_else(|| RegistryError::UnregisteredLazyFunction(format!("{function:?}"))),
        }
    }

    fn known_id(&self, id: &str) -> Result<String, RegistryError> {
        if self.contains(id) {
            Ok(id.to_string())
        } else {
            Err(RegistryError::UnregisteredLazyFunction(id.to_string()))
        }
    }

    pub(crate) fn bind(&self, id: &str) -> Result<BoundLazyFn, EntryError> {
        let function = self
            .functions
            .get(id)
            .ok_or_else(|| RegistryError::UnregisteredLazyFunction(id.to_string()))?;

        match function {
            LazyFunction::Free(func) => Ok(BoundLazyFn::Free(func.clone())),
            LazyFunction::Method {
                class,
                accepts,
                func,
            } => {
                let instance = self
                    .plugins
                    .as_ref()
                    .and_then(|plugins| plugins.lookup(class))
                    .filter(|instance| accepts(instance.as_ref()))
                    .ok_or_else(|| EntryError::UnboundLazyFunction {
                        func_id: id.to_string(),
                        class: class.clone(),
                    })?;
                Ok(BoundLazyFn::Method(instance, func.clone()))
            }
        }
    }
}

impl fmt::Debug for LazyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.functions.keys().collect();
        ids.sort();
        f.debug_struct("LazyRegistry")
            .field("functions", &ids)
            .field("plugins", &self.plugins.is_some())
            .finish()
    }
}

pub(crate) enum BoundLazyFn {
    Free(Arc<FreeFn>),
    Method(Arc<dyn Any + Send + Sync>, Arc<MethodFn>),
}

impl BoundLazyFn {
    pub(crate) fn call(&self, entry: &mut Entry, call: &LazyCall<'_>) -> Result<(), PluginError> {
        match self {
            Self::Free(func) => func(entry, call),
            Self::Method(instance, func) => func(instance.as_ref(), entry, call),
        }
    }
}
