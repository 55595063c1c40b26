//! The initialized pipeline runtime.
//!
//! A [`Runtime`] is proof that the operation table has been built.
//! Processors and the analysis helpers take one by reference, so nothing
//! can dispatch an operation before initialization has finished.

use std::sync::Arc;

use tracing::debug;

use crate::operations::register_builtins;
use crate::registry::OperationRegistry;

/// Shared, read-only operation table.
///
/// Cloning is cheap; every clone points at the same registry.
#[derive(Debug, Clone)]
pub struct Runtime {
    registry: Arc<OperationRegistry>,
}

impl Runtime {
    /// Build a runtime with every built-in operation registered.
    #[must_use]
    pub fn init() -> Self {
        let mut registry = OperationRegistry::new();
        register_builtins(&mut registry);
        Self::from_registry(registry)
    }

    /// Freeze a caller-assembled registry, for example the built-ins plus
    /// custom operations.
    #[must_use]
    pub fn from_registry(registry: OperationRegistry) -> Self {
        debug!(operations = ?registry.operation_names(), "runtime ready");
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The frozen operation table.
    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::ImageHandle;
    use crate::types::GrayImage;

    #[test]
    fn init_registers_builtins() {
        let runtime = Runtime::init();
        assert!(runtime.registry().has_operation("warp"));
        assert_eq!(runtime.registry().operation_names().len(), 14);
    }

    #[test]
    fn clones_share_the_registry() {
        let a = Runtime::init();
        let b = a.clone();
        assert!(std::ptr::eq(a.registry(), b.registry()));
    }

    #[test]
    fn custom_operations_survive_freezing() {
        let mut registry = OperationRegistry::new();
        register_builtins(&mut registry);
        registry.register("identity", |image, _| Ok(image), None);
        let runtime = Runtime::from_registry(registry);
        assert!(runtime.registry().has_operation("identity"));
        assert!(runtime.registry().has_operation("grayscale"));
    }

    #[test]
    fn runtime_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Runtime>();

        let runtime = Runtime::init();
        let handle = std::thread::spawn(move || {
            runtime
                .registry()
                .execute(
                    "invert",
                    ImageHandle::from_gray(GrayImage::new(2, 2)),
                    crate::registry::Options::new(),
                )
                .is_ok()
        });
        assert!(handle.join().unwrap_or(false));
    }
}
