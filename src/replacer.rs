//! SCP Replacement
//!
//! Swaps one service control policy for another on a node without ever
//! leaving it with zero SCPs attached.
//!
//! ## Ordering
//!
//! | detach policy attached | SCP count | calls                  |
//! |------------------------|-----------|------------------------|
//! | no                     | any       | attach                 |
//! | yes                    | 1         | attach, then detach    |
//! | yes                    | > 1       | detach, then attach    |
//!
//! Attaching first when the old policy is the only one avoids the window in
//! which the node would have no SCP, which Organizations rejects. With more
//! than one attached, detaching first keeps room under the five-SCP limit.
//!
//! The two calls are not atomic. A failure between them is returned as is and
//! the node keeps whatever state the first call produced; re-running converges.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::organizations::PolicyClient;
use crate::types::{AttachmentSnapshot, NodeId, PolicyId, PolicyPair, ScpError};

/// Whether attach/detach calls are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Live,
    DryRun,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Self::DryRun
        } else {
            Self::Live
        }
    }
}

/// Call ordering chosen from the attachment snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPlan {
    AttachOnly,
    AttachThenDetach,
    DetachThenAttach,
}

/// One attach or detach step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "policy_id", rename_all = "snake_case")]
pub enum PolicyAction {
    Attach(PolicyId),
    Detach(PolicyId),
}

impl PolicyAction {
    pub fn policy(&self) -> &PolicyId {
        match self {
            PolicyAction::Attach(id) | PolicyAction::Detach(id) => id,
        }
    }
}

impl std::fmt::Display for PolicyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyAction::Attach(id) => write!(f, "attach {}", id),
            PolicyAction::Detach(id) => write!(f, "detach {}", id),
        }
    }
}

impl ReplacementPlan {
    /// Steps for this plan, in execution order
    pub fn actions(&self, pair: &PolicyPair) -> Vec<PolicyAction> {
        let attach = PolicyAction::Attach(pair.attach.clone());
        let detach = PolicyAction::Detach(pair.detach.clone());
        match self {
            ReplacementPlan::AttachOnly => vec![attach],
            ReplacementPlan::AttachThenDetach => vec![attach, detach],
            ReplacementPlan::DetachThenAttach => vec![detach, attach],
        }
    }
}

/// Result of one replacement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceOutcome {
    pub target: NodeId,
    pub plan: ReplacementPlan,
    pub actions: Vec<PolicyAction>,
    pub dry_run: bool,
    pub policies_before: Vec<String>,
}

/// Choose the call ordering for a snapshot.
///
/// Exactly one attached policy that is also the one being detached is the
/// only case that needs attach-before-detach.
pub fn plan_replacement(snapshot: &AttachmentSnapshot, pair: &PolicyPair) -> ReplacementPlan {
    if !snapshot.contains(&pair.detach) {
        ReplacementPlan::AttachOnly
    } else if snapshot.len() == 1 {
        ReplacementPlan::AttachThenDetach
    } else {
        ReplacementPlan::DetachThenAttach
    }
}

/// Replace `pair.detach` with `pair.attach` on `target`.
pub async fn replace_scp<C>(
    client: &C,
    target: &NodeId,
    pair: &PolicyPair,
    mode: ExecutionMode,
) -> Result<ReplaceOutcome, ScpError>
where
    C: PolicyClient + ?Sized,
{
    let snapshot = client.list_policies_for_target(target).await?;
    let plan = plan_replacement(&snapshot, pair);
    let actions = plan.actions(pair);

    info!(
        node = %target,
        scp_count = snapshot.len(),
        plan = ?plan,
        "Planned SCP replacement"
    );

    for action in &actions {
        if mode == ExecutionMode::DryRun {
            info!(node = %target, "Dry run: would {}", action);
            continue;
        }
        apply(client, target, action).await?;
    }

    Ok(ReplaceOutcome {
        target: target.clone(),
        plan,
        actions,
        dry_run: mode == ExecutionMode::DryRun,
        policies_before: snapshot.ids().into_iter().map(str::to_string).collect(),
    })
}

async fn apply<C>(client: &C, target: &NodeId, action: &PolicyAction) -> Result<(), ScpError>
where
    C: PolicyClient + ?Sized,
{
    let result = match action {
        PolicyAction::Attach(policy) => client.attach_policy(policy, target).await,
        PolicyAction::Detach(policy) => client.detach_policy(policy, target).await,
    };

    match result {
        Ok(()) => {
            info!(node = %target, policy = %action.policy(), "Completed {}", action);
            Ok(())
        }
        Err(ScpError::PolicyOperation(err)) if err.is_already_done() => {
            warn!(
                node = %target,
                policy = %action.policy(),
                code = err.code.as_deref().unwrap_or_default(),
                "Skipped {}: already in requested state",
                action
            );
            Ok(())
        }
        Err(err) => Err(err),
    }
}
