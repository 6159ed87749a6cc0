//! Lazy field attachments, the function registry and the resolver.

/// Lazy attachment descriptors.
pub mod attachment;
/// Lazy function registry and plugin binding.
pub mod registry;
mod resolver;

pub use attachment::LazyAttachment;
pub use registry::{
    LazyCall, LazyFuncHandle, LazyFuncRef, LazyFunction, LazyRegistry, LazyRegistryBuilder,
    PluginInstances, PluginLookup,
};
