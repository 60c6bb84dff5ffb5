// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Template identity and template source resolution.
//!
//! This crate defines the vocabulary shared by the template compilation cache:
//!
//! - [`TemplateKey`]: the identity of "a named template resolved in a context". The
//!   [`unique_key_string`](TemplateKey::unique_key_string) of a key is the primary cache index.
//! - [`ModelType`]: the identity of the model type a template is compiled against.
//! - [`TemplateSource`]: raw template text plus its provenance.
//! - [`TemplateManager`]: resolves keys to sources. Three strategies are provided:
//!   [`DelegateTemplateManager`] (by name, with runtime-supplied templates),
//!   [`ResolvePathTemplateManager`] (by filesystem path) and [`EmbeddedTemplateManager`]
//!   (from templates compiled into the binary).
//!
//! # Example
//!
//! ```
//! use stencil_source::{DelegateTemplateManager, ResolveKind, TemplateManager, TemplateSource};
//!
//! let manager = DelegateTemplateManager::new();
//! let key = manager.get_key("greeting", ResolveKind::Global, None);
//! manager.add_dynamic(key.as_ref(), TemplateSource::new("Hello @Model.Name"))?;
//!
//! let source = manager.resolve(key.as_ref())?;
//! assert_eq!(source.template(), "Hello @Model.Name");
//! # Ok::<(), stencil_source::Error>(())
//! ```

mod error;
mod key;
mod manager;
mod model_type;
mod source;

#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use key::{
    FullPathTemplateKey, FullPathWithModifiedTimeTemplateKey, NameOnlyTemplateKey, ResolveContext, ResolveKind, SharedKey,
    TemplateKey,
};
#[doc(inline)]
pub use manager::{DelegateTemplateManager, EmbeddedTemplateManager, ResolvePathTemplateManager, TemplateManager};
#[doc(inline)]
pub use model_type::{ModelKind, ModelType};
#[doc(inline)]
pub use source::TemplateSource;
