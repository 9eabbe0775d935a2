//! Observable non-fatal warnings
//!
//! Data-quality and terminology issues are reported here rather than through
//! errors: the operation proceeds, but the condition must stay visible. The
//! default sink is `log::warn!`; tests can capture warnings on the current
//! thread with [`capture`] to assert on them.

use std::cell::RefCell;

/// A non-fatal condition worth surfacing to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Filter keys or column requests that match no declared field
    UnknownAttributes { names: Vec<String> },
    /// A timezone-naive timestamp was interpreted in an assumed zone
    NaiveTimestampAssumed { zone: String },
    /// A timestamp-to-date cast discarded a non-midnight time component
    LossyDateCast,
    /// A declared field was present on the wire but its value failed to extract
    ExtractionFailed { attribute: String, detail: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownAttributes { names } => {
                write!(
                    f,
                    "Following parameters are not in our terminology: {}",
                    names.join(", ")
                )
            }
            Warning::NaiveTimestampAssumed { zone } => {
                write!(
                    f,
                    "Trying to parse non-timezone-aware timestamp, assuming {}.",
                    zone
                )
            }
            Warning::LossyDateCast => {
                write!(
                    f,
                    "Casting timestamp to date, this operation will lose time-of-day information."
                )
            }
            Warning::ExtractionFailed { attribute, detail } => {
                write!(f, "Could not extract value for '{}': {}", attribute, detail)
            }
        }
    }
}

thread_local! {
    static CAPTURE: RefCell<Option<Vec<Warning>>> = const { RefCell::new(None) };
}

/// Emit a warning to the active sink
///
/// Inside a [`capture`] scope on this thread the warning is collected;
/// otherwise it goes to `log::warn!`.
pub fn emit(warning: Warning) {
    CAPTURE.with(|capture| {
        let mut capture = capture.borrow_mut();
        match capture.as_mut() {
            Some(collected) => collected.push(warning),
            None => log::warn!("{}", warning),
        }
    });
}

/// Run `f`, collecting all warnings emitted on this thread during the call
pub fn capture<T>(f: impl FnOnce() -> T) -> (T, Vec<Warning>) {
    CAPTURE.with(|capture| {
        let previous = capture.borrow_mut().replace(Vec::new());
        let result = f();
        let collected = capture
            .borrow_mut()
            .take()
            .unwrap_or_default();
        *capture.borrow_mut() = previous;
        (result, collected)
    })
}
