//! Engine failure classification.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineFault;

/// Null/undefined member-access phrasing emitted by canvas engines.
static NULL_ACCESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(cannot (read|set) propert(y|ies)\b.*\b(of )?(null|undefined)|(null|undefined) is not an object|\bis (null|undefined)\b|null (pointer|reference|handle))",
    )
    .expect("Invalid null-access regex")
});

/// How a failure relates to the wrapped engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Null/undefined access inside the engine.
    NullReference,
    /// Other engine-originated failure.
    EngineTransient,
    /// Not recognizably from the engine.
    NotEngine,
}

impl FailureKind {
    /// Whether the coordinator should attempt recovery for this kind.
    #[must_use]
    pub fn is_engine_related(self) -> bool {
        !matches!(self, Self::NotEngine)
    }
}

/// Whether `text` reads like a null/undefined member access.
#[must_use]
pub fn is_null_access(text: &str) -> bool {
    NULL_ACCESS.is_match(text)
}

/// Classify `fault` against an engine's internal module names.
///
/// Engine-related when the message or stack matches null-access phrasing or
/// mentions one of `signatures`. Only the message decides `NullReference`.
#[must_use]
pub fn classify(fault: &EngineFault, signatures: &[String]) -> FailureKind {
    let message = fault.message();
    let stack = fault.stack().unwrap_or_default();

    if is_null_access(message) {
        return FailureKind::NullReference;
    }

    let mentions_engine = |text: &str| {
        let text = text.to_ascii_lowercase();
        signatures
            .iter()
            .filter(|s| !s.is_empty())
            .any(|s| text.contains(&s.to_ascii_lowercase()))
    };

    if is_null_access(stack) || mentions_engine(message) || mentions_engine(stack) {
        FailureKind::EngineTransient
    } else {
        FailureKind::NotEngine
    }
}
