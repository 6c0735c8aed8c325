use anyhow::Result;
use async_trait::async_trait;

use crate::context::TurnContext;

#[async_trait]
/// Trait contract for `PipelineStage` behavior.
///
/// Stages are the pluggable units of turn processing. The loop runs every
/// enabled, applicable stage in ascending `order()` once per iteration and
/// treats a returned error as a recoverable failure of that stage alone;
/// the turn continues with the next stage.
pub trait PipelineStage: Send + Sync {
    /// Stable component name used in logs and failure events.
    fn name(&self) -> &str;

    /// Position in the pipeline; lower runs earlier. Ties keep
    /// registration order.
    fn order(&self) -> i32;

    /// Administrative switch. Disabled stages are skipped without side
    /// effects.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Per-context applicability check. Returning false skips the stage
    /// for this iteration without counting as a failure.
    fn should_process(&self, context: &TurnContext) -> bool {
        let _ = context;
        true
    }

    /// Runs the stage, mutating the shared turn context.
    async fn process(&self, context: &mut TurnContext) -> Result<()>;
}

/// Sorts stages by ascending order, keeping registration order for ties.
pub(crate) fn sort_stages(
    stages: Vec<std::sync::Arc<dyn PipelineStage>>,
) -> Vec<std::sync::Arc<dyn PipelineStage>> {
    let mut sorted = stages;
    sorted.sort_by_key(|stage| stage.order());
    sorted
}
