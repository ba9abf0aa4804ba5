//! Console line filtering capability interface.
//!
//! Filters are external collaborators (highlighters, hyperlinkers) that
//! annotate raw output lines. The core only defines the capability trait
//! and an ordered pipeline; lines reach the pipeline unmodified, one per
//! line, in arrival order.

/// A clickable region inside an annotated line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpan {
    /// Byte offset of the span start within the line.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    /// Navigation target (URL, file location) the span points at.
    pub target: String,
}

/// A console line after filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedLine {
    /// The original line text, unmodified.
    pub text: String,
    /// Annotations contributed by the consuming filter.
    pub links: Vec<LinkSpan>,
}

impl AnnotatedLine {
    /// A line with no annotations.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
        }
    }
}

/// Capability interface implemented by console filter collaborators.
pub trait ConsoleFilter: Send + Sync {
    /// Inspect one raw line. Returning `Some` consumes the line and stops
    /// the pipeline; `None` passes it to the next filter.
    fn consumes_line(&self, line: &str) -> Option<AnnotatedLine>;
}

/// Ordered filter pipeline. The first filter that consumes a line wins;
/// unconsumed lines pass through as plain annotated lines.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn ConsoleFilter>>,
}

impl FilterPipeline {
    /// Empty pipeline (pure passthrough).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter; order of insertion is order of application.
    pub fn push(&mut self, filter: Box<dyn ConsoleFilter>) {
        self.filters.push(filter);
    }

    /// Run one raw line through the pipeline.
    #[must_use]
    pub fn apply(&self, line: &str) -> AnnotatedLine {
        for filter in &self.filters {
            if let Some(annotated) = filter.consumes_line(line) {
                return annotated;
            }
        }
        AnnotatedLine::plain(line)
    }
}
