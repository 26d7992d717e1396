use std::future::Future;

use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

/// Span grouping every agent run of one named workflow under a fresh
/// trace id.
pub fn workflow_span(name: &str) -> Span {
    let trace_id = Uuid::new_v4();
    info_span!("workflow", workflow = %name, trace_id = %trace_id)
}

/// Runs `future` inside a [`workflow_span`], logging when it starts and ends.
pub async fn traced<F>(name: &str, future: F) -> F::Output
where
    F: Future,
{
    let span = workflow_span(name);
    async move {
        info!(event_name = "workflow.started", "workflow started");
        let output = future.await;
        info!(event_name = "workflow.finished", "workflow finished");
        output
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::traced;

    #[tokio::test]
    async fn traced_returns_inner_output() {
        let output = traced("Parallel cold emails", async { 3 + 4 }).await;
        assert_eq!(output, 7);
    }
}
