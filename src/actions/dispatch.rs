//! Applies one declared action to the live turn.

use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::{ActionContext, ActionRegistry, ActionResult};
use crate::decider::ActionRequest;
use crate::session::Session;

/// Executes one [`ActionRequest`] and reports what actually happened.
///
/// Session-internal requests are applied inline to the working session;
/// `invoke` routes through the registry. Structural flow edits are honored
/// only for privileged sessions and are pinned to the flow version the
/// deciding pass observed; on success the context's pin moves forward so a
/// later edit in the same turn applies cleanly.
///
/// This function is total: every failure mode, including a navigation
/// target the flow does not know, comes back as a failed [`ActionResult`]
/// for the feedback pass to report.
#[instrument(skip_all, fields(kind = request.kind()))]
pub async fn dispatch(
    request: &ActionRequest,
    registry: &ActionRegistry,
    ctx: &mut ActionContext<'_>,
) -> ActionResult {
    match request {
        ActionRequest::UpdateAnswer { key, value } => {
            ctx.session.set_answer(key.clone(), value.clone());
            debug!(answer = %key, "answer recorded");
            ActionResult::ok_with(format!("answer `{key}` recorded"))
        }
        ActionRequest::GoToNode { node } => {
            if ctx.flow.snapshot().contains(node) {
                ctx.session.move_to(node.clone());
                ActionResult::ok_with(format!("moved to `{node}`"))
            } else {
                ActionResult::fail(format!("unknown node `{node}`"))
            }
        }
        ActionRequest::Escalate { reason } => {
            ctx.session
                .metadata
                .insert(Session::ESCALATED_KEY.into(), Value::Bool(true));
            if let Some(reason) = reason {
                ctx.session.metadata.insert(
                    Session::ESCALATION_REASON_KEY.into(),
                    Value::String(reason.clone()),
                );
            }
            ActionResult::ok_with("conversation flagged for human follow-up")
        }
        ActionRequest::RestartSession => {
            let entry = ctx.flow.snapshot().entry().clone();
            ctx.session.restart(entry.clone());
            ActionResult::ok_with(format!("session restarted at `{entry}`"))
        }
        ActionRequest::EditFlow { edits } => {
            if !ctx.privileged {
                return ActionResult::fail("flow edits require a privileged session");
            }
            match ctx.flow.apply_versioned(ctx.flow_version, edits) {
                Ok(graph) => {
                    ctx.flow_version = graph.version();
                    ActionResult::ok_with(format!("flow updated to version {}", graph.version()))
                        .with_payload(json!({
                            "version": graph.version(),
                            "warnings": graph.warnings().len(),
                        }))
                }
                Err(source) => ActionResult::fail(source.to_string()),
            }
        }
        ActionRequest::Invoke { name, params } => {
            registry.execute(name, params.clone(), ctx).await
        }
    }
}
