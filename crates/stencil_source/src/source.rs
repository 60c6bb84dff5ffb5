// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Raw template text together with where it was loaded from.
///
/// Cloning is cheap: the text is shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateSource {
    template: Arc<str>,
    file_path: Option<PathBuf>,
}

impl TemplateSource {
    /// Creates a source from text that was not loaded from a file.
    #[must_use]
    pub fn new(template: impl Into<Arc<str>>) -> Self {
        Self {
            template: template.into(),
            file_path: None,
        }
    }

    /// Creates a source for text loaded from `file_path`.
    #[must_use]
    pub fn from_file(template: impl Into<Arc<str>>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            template: template.into(),
            file_path: Some(file_path.into()),
        }
    }

    /// The template text.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The file the template was loaded from, if any.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Returns a short excerpt of the text around `line` (1-based), for error messages.
    #[must_use]
    pub fn snippet(&self, line: Option<usize>) -> String {
        const CONTEXT_LINES: usize = 2;

        let lines: Vec<&str> = self.template.lines().collect();
        let center = line.unwrap_or(1).max(1) - 1;
        let start = center.saturating_sub(CONTEXT_LINES);
        let end = (center + CONTEXT_LINES + 1).min(lines.len());

        lines.get(start..end).map(|l| l.join("\n")).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_centers_on_line() {
        let source = TemplateSource::new("a\nb\nc\nd\ne\nf\ng");
        assert_eq!(source.snippet(Some(4)), "b\nc\nd\ne\nf");
        assert_eq!(source.snippet(None), "a\nb\nc");
    }

    #[test]
    fn snippet_out_of_range_is_empty() {
        let source = TemplateSource::new("only");
        assert_eq!(source.snippet(Some(40)), "");
    }

    #[test]
    fn from_file_keeps_path() {
        let source = TemplateSource::from_file("x", "/views/x.cshtml");
        assert_eq!(source.file_path(), Some(Path::new("/views/x.cshtml")));
        assert_eq!(TemplateSource::new("x").file_path(), None);
    }
}
