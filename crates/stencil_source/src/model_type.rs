// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Identity of the model type a template is compiled against.

use std::{fmt, sync::Arc};

/// How a model type is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ModelKind {
    /// A nominal type with a stable name.
    Named,
    /// A structurally anonymous type: its shape is known only from a serialized value.
    Anonymous,
    /// A duck-typed model whose members are looked up by name at run time.
    Dynamic,
}

/// Identifies the type of model a template is compiled for.
///
/// Two model types are equal when both their names and kinds are equal, so a nominal type that
/// happens to be called `DynamicObject` is still distinct from [`ModelType::dynamic`].
///
/// # Examples
///
/// ```
/// use stencil_source::{ModelKind, ModelType};
///
/// let person = ModelType::named("Person");
/// assert_eq!(person.kind(), ModelKind::Named);
/// assert!(!person.is_dynamic());
///
/// assert!(ModelType::dynamic().is_dynamic());
/// assert_eq!(ModelType::dynamic().name(), ModelType::DYNAMIC_PLACEHOLDER);
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ModelType {
    name: Arc<str>,
    kind: ModelKind,
}

impl ModelType {
    /// Name of the placeholder type used for every dynamically typed model.
    pub const DYNAMIC_PLACEHOLDER: &'static str = "DynamicObject";

    /// Creates a nominal model type.
    #[must_use]
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Named,
        }
    }

    /// Creates a nominal model type named after the Rust type `T`.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::named(std::any::type_name::<T>())
    }

    /// Creates a model type for a structurally anonymous value.
    #[must_use]
    pub fn anonymous(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Anonymous,
        }
    }

    /// The placeholder type shared by all dynamically typed models.
    #[must_use]
    pub fn dynamic() -> Self {
        Self {
            name: Arc::from(Self::DYNAMIC_PLACEHOLDER),
            kind: ModelKind::Dynamic,
        }
    }

    /// The type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type's shape.
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    /// Returns `true` for anonymous and dynamic types, which compiled templates can only access
    /// by member name.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, ModelKind::Anonymous | ModelKind::Dynamic)
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind, self.name)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
