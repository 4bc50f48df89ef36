//! # Output events produced by units of work and by the orchestrator.
//!
//! [`OutputEvent`] is a closed sum type with one case per output channel:
//! - **Success**: the raw value produced by a unit
//! - **Structured**: [`ErrorRecord`], [`InformationRecord`], [`ProgressRecord`]
//! - **Textual**: debug, verbose and warning messages
//!
//! Every item in the shared queue is an [`Output`]: the event plus the identity of
//! the unit that emitted it (`None` for scheduling-level events).
//!
//! ## Ordering guarantees
//! Events of one unit keep their emission order. Events of different units
//! interleave arbitrarily.
//!
//! ## Example
//! ```rust
//! use parapipe::{ErrorCategory, ErrorRecord, OutputEvent, OutputKind};
//!
//! let ev: OutputEvent<u32> = OutputEvent::Error(
//!     ErrorRecord::new("UnitFailed", ErrorCategory::NotSpecified, "boom"),
//! );
//! assert_eq!(ev.kind(), OutputKind::Error);
//! assert!(!ev.is_terminal_success());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::time::SystemTime;

/// Identity of one unit of work, unique within its orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u64);

impl UnitId {
    /// Raw numeric value (1-based, assigned in dispatch order).
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// Tag of an [`OutputEvent`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Success,
    Error,
    Debug,
    Information,
    Progress,
    Verbose,
    Warning,
}

impl OutputKind {
    /// Returns a short stable label (lowercase) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            OutputKind::Success => "success",
            OutputKind::Error => "error",
            OutputKind::Debug => "debug",
            OutputKind::Information => "information",
            OutputKind::Progress => "progress",
            OutputKind::Verbose => "verbose",
            OutputKind::Warning => "warning",
        }
    }
}

/// Broad classification of an [`ErrorRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No specific category.
    NotSpecified,
    /// A required resource (an execution context) could not be obtained.
    ResourceUnavailable,
    /// The invocation deadline was reached.
    OperationTimeout,
}

/// Structured error payload of [`OutputEvent::Error`].
///
/// - `error_id`: stable identifier (`UnitFailed`, `UnitPanicked`, `ProcessingTask`, ...)
/// - `category`: broad classification
/// - `message`: human-readable description
/// - `target`: optional description of the input the error relates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub error_id: Cow<'static, str>,
    pub category: ErrorCategory,
    pub message: String,
    pub target: Option<String>,
}

impl ErrorRecord {
    /// Creates a record without a target.
    pub fn new(
        error_id: impl Into<Cow<'static, str>>,
        category: ErrorCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_id: error_id.into(),
            category,
            message: message.into(),
            target: None,
        }
    }

    /// Attaches a target description.
    #[inline]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error_id, self.message)
    }
}

/// Structured payload of [`OutputEvent::Information`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationRecord {
    pub message: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub at: SystemTime,
}

impl InformationRecord {
    /// Creates a record stamped with the current wall-clock time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            tags: Vec::new(),
            at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[inline]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Structured payload of [`OutputEvent::Progress`].
///
/// `percent_complete` is clamped to `0..=100`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub activity_id: u32,
    pub activity: String,
    pub status: String,
    pub percent_complete: Option<u8>,
    pub completed: bool,
}

impl ProgressRecord {
    pub fn new(activity_id: u32, activity: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            activity_id,
            activity: activity.into(),
            status: status.into(),
            percent_complete: None,
            completed: false,
        }
    }

    #[inline]
    pub fn with_percent(mut self, percent: u8) -> Self {
        self.percent_complete = Some(percent.min(100));
        self
    }

    /// Marks the activity as finished.
    #[inline]
    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }
}

/// One output item, tagged by channel.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent<T> {
    Success(T),
    Error(ErrorRecord),
    Debug(String),
    Information(InformationRecord),
    Progress(ProgressRecord),
    Verbose(String),
    Warning(String),
}

impl<T> OutputEvent<T> {
    /// Returns the channel tag.
    pub fn kind(&self) -> OutputKind {
        match self {
            OutputEvent::Success(_) => OutputKind::Success,
            OutputEvent::Error(_) => OutputKind::Error,
            OutputEvent::Debug(_) => OutputKind::Debug,
            OutputEvent::Information(_) => OutputKind::Information,
            OutputEvent::Progress(_) => OutputKind::Progress,
            OutputEvent::Verbose(_) => OutputKind::Verbose,
            OutputEvent::Warning(_) => OutputKind::Warning,
        }
    }

    #[inline]
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, OutputEvent::Success(_))
    }

    /// Returns the success value, if any.
    pub fn into_success(self) -> Option<T> {
        match self {
            OutputEvent::Success(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the error record, if any.
    pub fn as_error(&self) -> Option<&ErrorRecord> {
        match self {
            OutputEvent::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Item of the shared output queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Output<T> {
    /// Unit that emitted the event; `None` for scheduling-level events.
    pub unit: Option<UnitId>,
    pub event: OutputEvent<T>,
}

impl<T> Output<T> {
    #[inline]
    pub fn kind(&self) -> OutputKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_clamped() {
        let p = ProgressRecord::new(1, "copy", "working").with_percent(250);
        assert_eq!(p.percent_complete, Some(100));
        assert!(!p.completed);
        assert!(p.completed().completed);
    }

    #[test]
    fn test_kind_matches_variant() {
        let events: Vec<OutputEvent<()>> = vec![
            OutputEvent::Success(()),
            OutputEvent::Debug("d".into()),
            OutputEvent::Information(InformationRecord::new("i").with_tag("t")),
            OutputEvent::Progress(ProgressRecord::new(0, "a", "s")),
            OutputEvent::Verbose("v".into()),
            OutputEvent::Warning("w".into()),
        ];
        let labels: Vec<&str> = events.iter().map(|e| e.kind().as_label()).collect();
        assert_eq!(
            labels,
            ["success", "debug", "information", "progress", "verbose", "warning"]
        );
    }

    #[test]
    fn test_error_record_display() {
        let rec = ErrorRecord::new("ProcessingTask", ErrorCategory::ResourceUnavailable, "no engine")
            .with_target("input #3");
        assert_eq!(rec.to_string(), "[ProcessingTask] no engine");
        assert_eq!(rec.target.as_deref(), Some("input #3"));
    }
}
