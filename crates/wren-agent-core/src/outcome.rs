use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `FinishReason` values.
pub enum FinishReason {
    Normal,
    Error,
    IterationLimit,
}

impl FinishReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Error => "error",
            Self::IterationLimit => "iteration_limit",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
/// Delivery record produced by response routing. `attempted` is set once a
/// transport call was made; `sent_text` only when it succeeded.
pub struct RoutingOutcome {
    pub attempted: bool,
    pub sent_text: bool,
    pub error: Option<String>,
}

impl RoutingOutcome {
    pub fn sent() -> Self {
        Self {
            attempted: true,
            sent_text: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            attempted: true,
            sent_text: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Final disposition of one turn. Produced at most once; the feedback
/// guarantee consults the routing part as its single source of truth.
pub struct TurnOutcome {
    pub finish_reason: FinishReason,
    pub routing: Option<RoutingOutcome>,
}

impl TurnOutcome {
    pub fn new(finish_reason: FinishReason) -> Self {
        Self {
            finish_reason,
            routing: None,
        }
    }

    pub fn with_routing(mut self, routing: RoutingOutcome) -> Self {
        self.routing = Some(routing);
        self
    }

    pub fn sent_text(&self) -> bool {
        self.routing
            .as_ref()
            .is_some_and(|routing| routing.sent_text)
    }
}
