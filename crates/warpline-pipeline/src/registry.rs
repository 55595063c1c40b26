//! Name-keyed operation dispatch.
//!
//! The [`OperationRegistry`] decouples operation definitions from the
//! code that invokes them. Each entry maps a name to an execution
//! function, an optional default-options factory, and the list of
//! option fields the caller must always supply.
//!
//! # Options
//!
//! Options cross the registry boundary as a flat JSON object
//! ([`Options`]). Executing an operation shallow-merges the caller's
//! fields over the defaults (caller wins key by key; array values are
//! replaced whole, never element-wise). Typed operations
//! ([`Operation`]) then deserialize the merged record into their own
//! options struct, so type safety is recovered at the call site while
//! storage stays type-erased.
//!
//! # Validation before execution
//!
//! [`OperationRegistry::prepare`] performs every check that does not
//! need pixels (lookup, required fields, deserialization) and returns a
//! [`PreparedOperation`]. Only [`PreparedOperation::run`] consumes the
//! image handle, so a validation failure never costs the caller its
//! image.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::handle::ImageHandle;
use crate::types::{OperationError, PipelineError};

/// Flat key/value option record at the type-erased boundary.
pub type Options = serde_json::Map<String, Value>;

/// Produces the default option record for an operation.
pub type DefaultOptionsFn = fn() -> Options;

/// Output of one executed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResult {
    /// The new image; the input handle has been released.
    pub image: ImageHandle,
    /// Width of `image` in pixels.
    pub width: u32,
    /// Height of `image` in pixels.
    pub height: u32,
}

impl OperationResult {
    fn new(image: ImageHandle) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            image,
        }
    }
}

/// A statically typed operation that can be registered by type.
///
/// Implementors describe their name, their options struct, which option
/// fields are mandatory, and how to transform an image.
pub trait Operation {
    /// Registry key.
    const NAME: &'static str;

    /// Option fields the caller must always supply. When non-empty, no
    /// defaults are merged for this operation.
    const REQUIRED: &'static [&'static str] = &[];

    /// Strongly typed options.
    type Options: Serialize + DeserializeOwned + Send + 'static;

    /// Default options, or `None` for required-options operations.
    fn default_options() -> Option<Self::Options>;

    /// Consume `image` and produce the transformed image.
    ///
    /// # Errors
    ///
    /// Returns an [`OperationError`] when an option value is outside the
    /// range the kernel accepts or the kernel itself cannot proceed.
    fn apply(image: ImageHandle, options: Self::Options) -> Result<ImageHandle, OperationError>;
}

type Kernel = Box<dyn FnOnce(ImageHandle) -> Result<ImageHandle, OperationError> + Send>;
type Binder = Arc<dyn Fn(&str, Options) -> Result<Kernel, PipelineError> + Send + Sync>;

#[derive(Clone)]
struct Descriptor {
    bind: Binder,
    defaults: Option<DefaultOptionsFn>,
    required: &'static [&'static str],
}

/// An operation whose options have been validated and bound, ready to
/// consume an image.
#[must_use = "a prepared operation does nothing until run"]
pub struct PreparedOperation {
    name: String,
    kernel: Kernel,
}

impl PreparedOperation {
    /// Name of the operation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Consume `image` and run the operation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Execution`] carrying the operation name
    /// if the kernel fails. The input image is released either way.
    pub fn run(self, image: ImageHandle) -> Result<OperationResult, PipelineError> {
        let Self { name, kernel } = self;
        kernel(image)
            .map(OperationResult::new)
            .map_err(|source| PipelineError::Execution {
                operation: name,
                source,
            })
    }
}

impl fmt::Debug for PreparedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedOperation")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Table of named operations.
///
/// Registration needs `&mut self`; once the table is shared (see
/// [`crate::Runtime`]) it is read-only and safe for concurrent readers.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    entries: HashMap<String, Descriptor>,
    order: Vec<String>,
}

impl OperationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) an operation from a plain execution
    /// function.
    ///
    /// The function receives the merged option record as-is and is
    /// responsible for interpreting it. Re-registering a name replaces
    /// its execution function and defaults; the name keeps its original
    /// position in [`operation_names`](Self::operation_names).
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        execute: F,
        defaults: Option<DefaultOptionsFn>,
    ) where
        F: Fn(ImageHandle, &Options) -> Result<ImageHandle, OperationError>
            + Send
            + Sync
            + 'static,
    {
        let execute = Arc::new(execute);
        let bind: Binder = Arc::new(
            move |_name: &str, options: Options| -> Result<Kernel, PipelineError> {
                let execute = Arc::clone(&execute);
                let kernel: Kernel = Box::new(move |image| (*execute)(image, &options));
                Ok(kernel)
            },
        );
        self.insert(
            name.into(),
            Descriptor {
                bind,
                defaults,
                required: &[],
            },
        );
    }

    /// Register (or overwrite) a typed [`Operation`].
    pub fn register_operation<O: Operation + 'static>(&mut self) {
        let bind: Binder = Arc::new(|name: &str, options: Options| -> Result<Kernel, PipelineError> {
            let typed: O::Options =
                serde_json::from_value(Value::Object(options)).map_err(|err| {
                    PipelineError::InvalidParameter {
                        operation: name.to_owned(),
                        message: err.to_string(),
                    }
                })?;
            let kernel: Kernel = Box::new(move |image| O::apply(image, typed));
            Ok(kernel)
        });
        let defaults = O::default_options().map(|_| typed_defaults::<O> as DefaultOptionsFn);
        self.insert(
            O::NAME.to_owned(),
            Descriptor {
                bind,
                defaults,
                required: O::REQUIRED,
            },
        );
    }

    fn insert(&mut self, name: String, descriptor: Descriptor) {
        if self.entries.insert(name.clone(), descriptor).is_none() {
            self.order.push(name);
        }
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn has_operation(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in insertion order.
    #[must_use]
    pub fn operation_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// The default option record for `name` (empty when the operation
    /// has no defaults).
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OperationNotFound`] if `name` is not
    /// registered.
    pub fn default_options(&self, name: &str) -> Result<Options, PipelineError> {
        let descriptor = self.descriptor(name)?;
        Ok(descriptor.defaults.map(|f| f()).unwrap_or_default())
    }

    /// Shallow-merge `options` over the defaults for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OperationNotFound`] if `name` is not
    /// registered.
    pub fn merged_options(&self, name: &str, options: Options) -> Result<Options, PipelineError> {
        let mut merged = self.default_options(name)?;
        merged.extend(options);
        Ok(merged)
    }

    /// Validate `options` for `name` and bind them, without touching any
    /// image.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::OperationNotFound`] if `name` is not
    /// registered, [`PipelineError::MissingParameter`] if a required
    /// field is absent (or `null`), and
    /// [`PipelineError::InvalidParameter`] if the merged record does not
    /// match the operation's options type.
    pub fn prepare(&self, name: &str, options: Options) -> Result<PreparedOperation, PipelineError> {
        let descriptor = self.descriptor(name)?;
        let mut merged = descriptor.defaults.map(|f| f()).unwrap_or_default();
        merged.extend(options);

        if let Some(parameter) = descriptor
            .required
            .iter()
            .find(|field| merged.get(**field).is_none_or(Value::is_null))
        {
            return Err(PipelineError::MissingParameter {
                operation: name.to_owned(),
                parameter: (*parameter).to_owned(),
            });
        }

        let kernel = (*descriptor.bind)(name, merged)?;
        Ok(PreparedOperation {
            name: name.to_owned(),
            kernel,
        })
    }

    /// Run `name` against `image` with `options` merged over the
    /// defaults.
    ///
    /// Validation happens before the kernel runs; the handle is released
    /// whether the call succeeds or fails.
    ///
    /// # Errors
    ///
    /// Any error from [`prepare`](Self::prepare), or
    /// [`PipelineError::Execution`] if the kernel fails.
    #[instrument(level = "debug", skip(self, image, options))]
    pub fn execute(
        &self,
        name: &str,
        image: ImageHandle,
        options: Options,
    ) -> Result<OperationResult, PipelineError> {
        let prepared = self.prepare(name, options)?;
        let result = prepared.run(image)?;
        debug!(width = result.width, height = result.height, "operation complete");
        Ok(result)
    }

    fn descriptor(&self, name: &str) -> Result<&Descriptor, PipelineError> {
        self.entries
            .get(name)
            .ok_or_else(|| PipelineError::OperationNotFound(name.to_owned()))
    }
}

impl fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.order)
            .finish()
    }
}

fn typed_defaults<O: Operation>() -> Options {
    match O::default_options().map(serde_json::to_value) {
        Some(Ok(Value::Object(map))) => map,
        _ => Options::new(),
    }
}

/// Convert a typed options value into a flat [`Options`] record.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] if `options` does not
/// serialize to a JSON object.
pub fn to_options<T: Serialize>(operation: &str, options: &T) -> Result<Options, PipelineError> {
    match serde_json::to_value(options) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Options::new()),
        Ok(other) => Err(PipelineError::InvalidParameter {
            operation: operation.to_owned(),
            message: format!("options must be an object, got {other}"),
        }),
        Err(err) => Err(PipelineError::InvalidParameter {
            operation: operation.to_owned(),
            message: err.to_string(),
        }),
    }
}
