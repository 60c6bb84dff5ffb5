// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", test))]
pub(crate) const ENGINE_NAME: &str = "engine.name";

#[cfg(any(feature = "metrics", test))]
pub(crate) const ENGINE_OPERATION: &str = "engine.operation";

#[cfg(any(feature = "metrics", test))]
pub(crate) const ENGINE_ACTIVITY: &str = "engine.activity";

#[cfg(test)]
pub(crate) const ENGINE_EVENT: &str = "engine.event";

#[cfg(test)]
pub(crate) const TEMPLATE_KEY: &str = "template.key";

#[cfg(test)]
pub(crate) const ENGINE_DURATION: &str = "engine.duration_ns";
