//! Compile-time macros
//!
//! A macro is an annotation with a registered [`MacroImplementation`]. When
//! the driver meets an annotated class, function or expression it looks the
//! annotation up in the [`MacroRegistry`] and calls
//! [`MacroImplementation::expand`] with a [`TransformTarget`] borrowing it.
//! The implementation never edits the tree: it returns
//! [`TransformOperation`]s, built through a [`TransformFactory`], which the
//! driver applies in a single merge step.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = MacroRegistry::global();
//! let product = registry.lookup("Product")?;
//! let ctx = MacroContext::new(&session, annotation, ExpansionMode::Lenient);
//! let operations = product.expand(TransformTarget::Class { class, container: &path }, &ctx)?;
//! ```

mod builtins;
mod context;
mod error;
mod factory;
pub mod registry;
mod target;

#[cfg(test)]
mod fixture;

pub use builtins::{Decorator, Factory, HelloClassTransform, Immutable, Increment, Log, Product};
pub use context::{ExpansionMode, MacroContext};
pub use error::{ConfigurationError, MacroError};
pub use factory::{Generated, TransformFactory};
pub use registry::{MacroRegistry, RegistryBuilder};
pub use target::{AttachMode, TransformOperation, TransformTarget};

/// A macro implementation
pub trait MacroImplementation: Send + Sync {
    /// Annotation name the macro is registered under
    fn id(&self) -> &'static str;

    /// Expands one annotated declaration into edit operations
    ///
    /// # Errors
    ///
    /// Fails when a quoted fragment does not resolve or the target is not
    /// supported; other macros of the unit keep running.
    fn expand(
        &self,
        target: TransformTarget<'_>,
        ctx: &MacroContext<'_>,
    ) -> Result<Vec<TransformOperation>, MacroError>;
}
