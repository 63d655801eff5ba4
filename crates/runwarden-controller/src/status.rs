//! Overall run phase from per-stage phases.

use runwarden_types::{Phase, WorkflowRunStatus};

/// Aggregate stage phases into one run phase.
///
/// Precedence:
/// 1. no stages: `Pending`
/// 2. any `Running`: `Running`, even next to a `Failed` stage
/// 3. all `Succeeded`: `Succeeded`
/// 4. any `Failed`: `Failed`
/// 5. some `Succeeded` with the rest `Pending`: `Running`; all `Pending`: `Pending`
///
/// Only the multiset of phases matters; stage names and dependencies do not.
pub fn overall_phase<I>(phases: I) -> Phase
where
    I: IntoIterator<Item = Phase>,
{
    let mut total = 0usize;
    let mut succeeded = 0usize;
    let mut failed = false;

    for phase in phases {
        total += 1;
        match phase {
            Phase::Running => return Phase::Running,
            Phase::Succeeded => succeeded += 1,
            Phase::Failed => failed = true,
            Phase::Pending => {}
        }
    }

    if total == 0 {
        Phase::Pending
    } else if succeeded == total {
        Phase::Succeeded
    } else if failed {
        Phase::Failed
    } else if succeeded > 0 {
        Phase::Running
    } else {
        Phase::Pending
    }
}

/// [`overall_phase`] over a run's recorded stages.
pub fn run_phase(status: &WorkflowRunStatus) -> Phase {
    overall_phase(status.stages.values().map(|stage| stage.phase))
}
