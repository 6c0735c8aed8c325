use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `FailureSource` values.
pub enum FailureSource {
    Stage,
    Llm,
    Routing,
}

impl FailureSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stage => "stage",
            Self::Llm => "llm",
            Self::Routing => "routing",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `FailureKind` values.
pub enum FailureKind {
    Exception,
    Timeout,
    RoutingError,
    LlmError,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exception => "exception",
            Self::Timeout => "timeout",
            Self::RoutingError => "routing_error",
            Self::LlmError => "llm_error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Immutable record of one recoverable internal error, accumulated for the
/// whole turn. Failures are captured and handled locally; they never escape
/// the turn as errors.
pub struct FailureEvent {
    pub source: FailureSource,
    pub component: String,
    pub kind: FailureKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureEvent {
    pub fn new(
        source: FailureSource,
        component: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            component: component.into(),
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn stage_exception(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureSource::Stage, component, FailureKind::Exception, message)
    }

    pub fn llm_error(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureSource::Llm, component, FailureKind::LlmError, message)
    }

    pub fn routing_error(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            FailureSource::Routing,
            component,
            FailureKind::RoutingError,
            message,
        )
    }

    pub fn routing_timeout(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FailureSource::Routing, component, FailureKind::Timeout, message)
    }
}
