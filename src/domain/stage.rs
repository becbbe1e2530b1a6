//! Per-stage and per-job status tracking (`state.json`).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageName;

/// Per-stage status. Transition invariant: a stage may enter `Running` only if
/// every earlier stage is `Completed` or `Skipped`; resetting a stage to
/// `Pending` also resets every later stage to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn is_terminal_success(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Skipped)
    }
}

/// Overall job status, derived from stage statuses but also persisted so a
/// corrupt-state reconstruction doesn't have to recompute it speculatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
}

/// Detail recorded for a single stage inside `state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for StageRecord {
    fn default() -> Self {
        Self {
            status: StageStatus::Pending,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }
}

/// The full contents of `state.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub status: JobStatus,
    pub stages: BTreeMap<StageName, StageRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    pub fn new(now: DateTime<Utc>) -> Self {
        let mut stages = BTreeMap::new();
        for stage in StageName::ORDER {
            stages.insert(stage, StageRecord::default());
        }
        Self { status: JobStatus::Created, stages, created_at: now, updated_at: now }
    }

    pub fn record(&self, stage: StageName) -> &StageRecord {
        self.stages.get(&stage).expect("stages map covers StageName::ORDER")
    }

    /// Every earlier stage is `Completed` or `Skipped`.
    pub fn prior_stages_done(&self, stage: StageName) -> bool {
        StageName::ORDER[..stage.index()]
            .iter()
            .all(|s| self.record(*s).status.is_terminal_success())
    }

    pub fn begin_stage(&mut self, stage: StageName, now: DateTime<Utc>) {
        let rec = self.stages.get_mut(&stage).expect("stages map covers StageName::ORDER");
        rec.status = StageStatus::Running;
        rec.started_at = Some(now);
        rec.finished_at = None;
        rec.error = None;
        self.status = JobStatus::Running;
        self.updated_at = now;
    }

    pub fn complete_stage(&mut self, stage: StageName, now: DateTime<Utc>) {
        let rec = self.stages.get_mut(&stage).expect("stages map covers StageName::ORDER");
        rec.status = StageStatus::Completed;
        rec.finished_at = Some(now);
        self.updated_at = now;
        if stage == StageName::Shelve {
            self.status = JobStatus::Completed;
        }
    }

    pub fn skip_stage(&mut self, stage: StageName, reason: impl Into<String>, now: DateTime<Utc>) {
        let rec = self.stages.get_mut(&stage).expect("stages map covers StageName::ORDER");
        rec.status = StageStatus::Skipped;
        rec.finished_at = Some(now);
        rec.error = Some(reason.into());
        self.updated_at = now;
    }

    pub fn fail_stage(&mut self, stage: StageName, error: impl Into<String>, now: DateTime<Utc>) {
        let rec = self.stages.get_mut(&stage).expect("stages map covers StageName::ORDER");
        rec.status = StageStatus::Failed;
        rec.finished_at = Some(now);
        rec.error = Some(error.into());
        self.status = JobStatus::Failed;
        self.updated_at = now;
    }

    /// Reset `from` and every later stage to `Pending`, per the retry/continue contract.
    pub fn reset_from(&mut self, from: StageName, now: DateTime<Utc>) {
        for stage in &StageName::ORDER[from.index()..] {
            self.stages.insert(*stage, StageRecord::default());
        }
        self.status = JobStatus::Created;
        self.updated_at = now;
    }

    /// The first stage that is not `Completed`/`Skipped`, used as the default
    /// `--from-stage` for `jobs retry`.
    pub fn first_incomplete_stage(&self) -> StageName {
        StageName::ORDER
            .into_iter()
            .find(|s| !self.record(*s).status.is_terminal_success())
            .unwrap_or(StageName::Shelve)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_from_clears_downstream_stages() {
        let now = Utc::now();
        let mut state = JobState::new(now);
        for stage in StageName::ORDER {
            state.complete_stage(stage, now);
        }
        state.reset_from(StageName::Refine, now);
        assert_eq!(state.record(StageName::Ingest).status, StageStatus::Completed);
        assert_eq!(state.record(StageName::Scribe).status, StageStatus::Completed);
        assert_eq!(state.record(StageName::Refine).status, StageStatus::Pending);
        assert_eq!(state.record(StageName::Generate).status, StageStatus::Pending);
        assert_eq!(state.record(StageName::Shelve).status, StageStatus::Pending);
    }

    #[test]
    fn first_incomplete_stage_skips_completed_and_skipped() {
        let now = Utc::now();
        let mut state = JobState::new(now);
        state.complete_stage(StageName::Ingest, now);
        state.skip_stage(StageName::Scribe, "skip-transcript", now);
        assert_eq!(state.first_incomplete_stage(), StageName::Refine);
    }
}
