// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc};

use serde::Serialize;
use serde_json::{Map, Value};
use stencil_source::ModelType;
use thiserror::Error;

use crate::{Error, Result};

/// A member that a template asked for but the model does not have.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("model '{model}' has no member '{member}'")]
pub struct MissingMember {
    /// The member path that was requested, e.g. `Address.City`.
    pub member: String,
    /// Name of the model's type.
    pub model: String,
}

/// A model with a nominal type whose members are read by name.
///
/// ```
/// use serde_json::Value;
/// use stencil::TemplateModel;
///
/// #[derive(Debug)]
/// struct Person {
///     forename: String,
/// }
///
/// impl TemplateModel for Person {
///     fn member(&self, name: &str) -> Option<Value> {
///         match name {
///             "Forename" => Some(Value::from(self.forename.as_str())),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait TemplateModel: Debug + Send + Sync {
    /// The type templates are compiled for when rendering this model.
    fn model_type(&self) -> ModelType {
        ModelType::of::<Self>()
    }

    /// Returns the member called `name`, or `None` if there is no such member.
    fn member(&self, name: &str) -> Option<Value>;
}

/// A typed model captured by serializing a value once.
#[derive(Debug)]
struct SerializedModel {
    model_type: ModelType,
    value: Value,
}

impl TemplateModel for SerializedModel {
    fn model_type(&self) -> ModelType {
        self.model_type.clone()
    }

    fn member(&self, name: &str) -> Option<Value> {
        self.value.get(name).cloned()
    }
}

/// A duck-typed model: a name-indexed map of members.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DynamicModel {
    members: Map<String, Value>,
    allow_missing_members: bool,
}

impl DynamicModel {
    /// Creates a model with the given members.
    #[must_use]
    pub fn new(members: Map<String, Value>) -> Self {
        Self {
            members,
            allow_missing_members: false,
        }
    }

    /// When enabled, reading a member that does not exist yields `null` instead of failing.
    #[must_use]
    pub fn with_allow_missing_members(mut self, allow: bool) -> Self {
        self.allow_missing_members = allow;
        self
    }

    /// Whether missing members read as `null`.
    #[must_use]
    pub fn allows_missing_members(&self) -> bool {
        self.allow_missing_members
    }

    /// Adds or replaces a member.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.members.insert(name.into(), value.into());
    }

    /// Reads a member.
    ///
    /// # Errors
    ///
    /// Returns [`MissingMember`] if there is no such member and missing members are not allowed.
    pub fn get_member(&self, name: &str) -> std::result::Result<Value, MissingMember> {
        match self.members.get(name) {
            Some(value) => Ok(value.clone()),
            None if self.allow_missing_members => Ok(Value::Null),
            None => Err(MissingMember {
                member: name.to_string(),
                model: ModelType::DYNAMIC_PLACEHOLDER.to_string(),
            }),
        }
    }
}

impl FromIterator<(String, Value)> for DynamicModel {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The data a template renders.
///
/// Compiled templates read members uniformly through [`get_member`](Self::get_member),
/// whichever way the model was supplied.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub enum Model {
    /// No model.
    #[default]
    None,
    /// A model with a nominal type.
    Typed(Arc<dyn TemplateModel>),
    /// A duck-typed model.
    Dynamic(DynamicModel),
    /// A structurally anonymous value with no shared named type.
    Anonymous {
        /// The synthesized type of the value.
        model_type: ModelType,
        /// The value itself.
        value: Value,
    },
}

impl Model {
    /// Wraps a typed model.
    pub fn typed(model: impl TemplateModel + 'static) -> Self {
        Self::Typed(Arc::new(model))
    }

    /// Captures `value` as a typed model whose type is the Rust type `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn serialized<T: Serialize>(value: &T) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self::Typed(Arc::new(SerializedModel {
            model_type: ModelType::of::<T>(),
            value: serde_json::to_value(value)?,
        })))
    }

    /// Captures `value` as an anonymous model.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn anonymous<T: Serialize>(value: &T) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self::Anonymous {
            model_type: ModelType::anonymous(std::any::type_name::<T>()),
            value: serde_json::to_value(value)?,
        })
    }

    /// The type of this model, or `None` when there is no model.
    #[must_use]
    pub fn model_type(&self) -> Option<ModelType> {
        match self {
            Self::None => None,
            Self::Typed(model) => Some(model.model_type()),
            Self::Dynamic(_) => Some(ModelType::dynamic()),
            Self::Anonymous { model_type, .. } => Some(model_type.clone()),
        }
    }

    /// Reads a top-level member.
    ///
    /// # Errors
    ///
    /// Returns [`MissingMember`] if the model has no such member.
    pub fn get_member(&self, name: &str) -> std::result::Result<Value, MissingMember> {
        let found = match self {
            Self::None => None,
            Self::Typed(model) => model.member(name),
            Self::Dynamic(model) => return model.get_member(name),
            Self::Anonymous { value, .. } => value.get(name).cloned(),
        };
        found.ok_or_else(|| self.missing(name))
    }

    /// Reads a member path such as `["Address", "City"]`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingMember`] naming the path up to the first missing segment.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> std::result::Result<Value, MissingMember> {
        let Some((first, rest)) = path.split_first() else {
            return Err(self.missing(""));
        };

        let mut value = self.get_member(first.as_ref())?;
        for (depth, segment) in rest.iter().enumerate() {
            value = match value.get(segment.as_ref()) {
                Some(next) => next.clone(),
                None if self.allows_missing_members() => return Ok(Value::Null),
                None => {
                    let member = path.iter().take(depth + 2).map(AsRef::as_ref).collect::<Vec<_>>().join(".");
                    return Err(self.missing(&member));
                }
            };
        }
        Ok(value)
    }

    fn allows_missing_members(&self) -> bool {
        matches!(self, Self::Dynamic(model) if model.allows_missing_members())
    }

    fn missing(&self, member: &str) -> MissingMember {
        MissingMember {
            member: member.to_string(),
            model: self.model_type().map_or_else(|| "none".to_string(), |t| t.name().to_string()),
        }
    }
}

/// Member under which a permissive policy exposes an anonymous model that is not an object.
pub const SCALAR_MEMBER: &str = "Value";

/// Decides what happens to dynamic and anonymous models.
///
/// Under [`Permissive`](Self::Permissive), an anonymous model that serializes to something other
/// than an object, such as a number or a list, is exposed as the single member [`SCALAR_MEMBER`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelPolicy {
    /// Reject dynamic and anonymous models with [`Error::UnsupportedModelType`].
    Strict,
    /// Accept them, exposing their members through a [`DynamicModel`].
    Permissive {
        /// Whether reading a missing member yields `null` instead of failing.
        allow_missing_members: bool,
    },
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self::Permissive {
            allow_missing_members: false,
        }
    }
}

impl ModelPolicy {
    /// Applies the policy to a model before it reaches any compiled template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedModelType`] when a strict policy meets a dynamic or anonymous
    /// model.
    pub fn apply(self, model: Model) -> Result<Model> {
        match (self, model) {
            (Self::Strict, model @ (Model::Dynamic(_) | Model::Anonymous { .. })) => {
                let rejected = model.model_type().unwrap_or_else(ModelType::dynamic);
                Err(Error::UnsupportedModelType {
                    type_name: rejected.name().to_string(),
                    kind: rejected.kind(),
                })
            }
            (Self::Permissive { allow_missing_members }, Model::Dynamic(model)) => {
                Ok(Model::Dynamic(model.with_allow_missing_members(allow_missing_members)))
            }
            (Self::Permissive { allow_missing_members }, Model::Anonymous { value, .. }) => {
                let members = match value {
                    Value::Object(members) => members,
                    other => {
                        tracing::debug!(model.kind = "anonymous", "model.scalar_wrapped");
                        let mut members = Map::new();
                        members.insert(SCALAR_MEMBER.to_string(), other);
                        members
                    }
                };
                Ok(Model::Dynamic(
                    DynamicModel::new(members).with_allow_missing_members(allow_missing_members),
                ))
            }
            (_, model) => Ok(model),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::Serialize;
    use serde_json::json;
    use static_assertions::assert_impl_all;

    use stencil_source::ModelKind;

    use super::*;

    #[derive(Serialize)]
    struct Person {
        #[serde(rename = "Forename")]
        forename: String,
        #[serde(rename = "Address")]
        address: Address,
    }

    #[derive(Serialize)]
    struct Address {
        #[serde(rename = "City")]
        city: String,
    }

    fn person() -> Model {
        Model::serialized(&Person {
            forename: "Matt".to_string(),
            address: Address {
                city: "Leeds".to_string(),
            },
        })
        .unwrap()
    }

    #[test]
    fn thread_safe_types() {
        assert_impl_all!(Model: Send, Sync, Clone);
        assert_impl_all!(MissingMember: Send, Sync);
    }

    #[test]
    fn serialized_model_is_named_after_rust_type() {
        let model = person();
        let model_type = model.model_type().unwrap();

        assert_eq!(model_type.kind(), ModelKind::Named);
        assert!(model_type.name().ends_with("Person"));
        assert_eq!(model.get_member("Forename").unwrap(), json!("Matt"));
    }

    #[test]
    fn nested_paths_resolve() {
        assert_eq!(person().get_path(&["Address", "City"]).unwrap(), json!("Leeds"));
    }

    #[test]
    fn missing_nested_member_names_path() {
        let error = person().get_path(&["Address", "Street"]).unwrap_err();
        assert_eq!(error.member, "Address.Street");
    }

    #[test]
    fn no_model_has_no_members() {
        let error = Model::None.get_member("Anything").unwrap_err();
        assert_eq!(error.model, "none");
    }

    #[test]
    fn dynamic_model_honours_missing_member_toggle() {
        let strict: DynamicModel = [("Name".to_string(), json!("x"))].into_iter().collect();
        assert!(strict.get_member("Other").is_err());

        let lenient = strict.with_allow_missing_members(true);
        assert_eq!(lenient.get_member("Other").unwrap(), Value::Null);
        assert_eq!(Model::Dynamic(lenient).get_path(&["Name", "Deeper"]).unwrap(), Value::Null);
    }

    #[test]
    fn strict_policy_rejects_anonymous_and_dynamic() {
        let anonymous = Model::anonymous(&json!({ "Name": "x" })).unwrap();
        let error = ModelPolicy::Strict.apply(anonymous).unwrap_err();
        assert!(matches!(
            error,
            Error::UnsupportedModelType {
                kind: ModelKind::Anonymous,
                ..
            }
        ));

        let dynamic = Model::Dynamic(DynamicModel::default());
        let error = ModelPolicy::Strict.apply(dynamic).unwrap_err();
        assert!(matches!(
            error,
            Error::UnsupportedModelType {
                kind: ModelKind::Dynamic,
                ..
            }
        ));
    }

    #[test]
    fn strict_policy_accepts_typed_models() {
        let model = ModelPolicy::Strict.apply(person()).unwrap();
        assert!(matches!(model, Model::Typed(_)));
    }

    #[test]
    fn permissive_policy_wraps_anonymous_models() {
        let anonymous = Model::anonymous(&json!({ "Name": "x" })).unwrap();
        let policy = ModelPolicy::Permissive {
            allow_missing_members: true,
        };

        let model = policy.apply(anonymous).unwrap();

        assert_eq!(model.model_type(), Some(ModelType::dynamic()));
        assert_eq!(model.get_member("Name").unwrap(), json!("x"));
        assert_eq!(model.get_member("Missing").unwrap(), Value::Null);
    }

    #[test]
    fn permissive_policy_keeps_scalar_anonymous_models() {
        let anonymous = Model::anonymous(&[1, 2, 3]).unwrap();

        let model = ModelPolicy::default().apply(anonymous).unwrap();

        assert_eq!(model.get_member(SCALAR_MEMBER).unwrap(), json!([1, 2, 3]));
        assert!(model.get_member("Other").is_err());
    }
}
