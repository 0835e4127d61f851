//! Matching a dispatch against the recent-runs listing.
//!
//! The dispatch endpoint is fire-and-forget, so the run it created has to be
//! recognised afterwards. A run qualifies when it belongs to the workflow, was
//! triggered by `workflow_dispatch` on the same ref, was created no earlier
//! than the dispatch time minus a clock-skew allowance, and (when known) was
//! started by the same user and carries the dispatch fingerprint in its title.
//! Among qualifying runs the earliest-created one not already claimed by
//! another dispatch wins.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::domain::run::{RunId, RunSummary};
use crate::domain::workflow::WorkflowRef;

const DISPATCH_EVENT: &str = "workflow_dispatch";

/// What a listed run must look like to be the result of a given dispatch.
#[derive(Debug, Clone)]
pub struct MatchCriteria<'a> {
    pub workflow: &'a WorkflowRef,
    pub git_ref: &'a str,
    pub not_before: DateTime<Utc>,
    pub actor: Option<&'a str>,
    pub token: Option<&'a str>,
}

impl MatchCriteria<'_> {
    #[must_use]
    pub fn matches(&self, run: &RunSummary) -> bool {
        if !self.workflow.matches(run.workflow_id, &run.path) {
            return false;
        }
        if run.event != DISPATCH_EVENT || run.created_at < self.not_before {
            return false;
        }
        if run
            .head_branch
            .as_deref()
            .is_some_and(|branch| branch != self.git_ref)
        {
            return false;
        }
        if let (Some(actor), Some(run_actor)) = (self.actor, run.actor.as_deref())
            && actor != run_actor
        {
            return false;
        }
        match self.token {
            Some(token) => run.title.as_deref().is_some_and(|t| t.contains(token)),
            None => true,
        }
    }
}

/// Earliest-created matching run that nobody has claimed yet.
///
/// Ties on creation time go to the lower run id so the choice does not depend
/// on listing order.
#[must_use]
pub fn select_earliest<'r>(
    runs: &'r [RunSummary],
    criteria: &MatchCriteria<'_>,
    claimed: &HashSet<RunId>,
) -> Option<&'r RunSummary> {
    runs.iter()
        .filter(|run| !claimed.contains(&run.id) && criteria.matches(run))
        .min_by_key(|run| (run.created_at, run.id))
}
