//! Run-wide counters.
//!
//! Owned by the coordinating task; workers never touch it. Counters for
//! earlier runs are rebuilt from the checkpoint, so nothing here is
//! persisted on its own.

use std::fmt;

use serde::Serialize;

use wheelfix_schema::{Outcome, StepStatus};

use crate::checkpoint::Checkpoint;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Artifacts handled by this run, recorded or errored.
    pub total: usize,
    pub audit_success: usize,
    pub audit_failed: usize,
    pub pip_success: usize,
    pub pip_failed: usize,
    pub pip_skipped: usize,
    pub no_elf: usize,
    pub native_repaired: usize,
    pub already_processed: usize,
    pub newly_processed: usize,
    /// Artifacts that raised instead of producing an outcome.
    pub errors: usize,
}

impl RunSummary {
    /// Counters as of the loaded checkpoint, before any new work.
    pub fn replay(checkpoint: &Checkpoint) -> Self {
        let mut summary = Self::default();
        for outcome in checkpoint.outcomes() {
            summary.fold(outcome);
        }
        summary.already_processed = checkpoint.len();
        summary
    }

    /// Count one outcome recorded by this run.
    pub fn record(&mut self, outcome: &Outcome) {
        self.fold(outcome);
        self.total += 1;
        self.newly_processed += 1;
    }

    /// Count one artifact that raised and was left unrecorded.
    pub fn record_error(&mut self) {
        self.total += 1;
        self.errors += 1;
    }

    /// Every artifact with an outcome, from any run.
    pub fn overall_total(&self) -> usize {
        self.already_processed + self.newly_processed
    }

    fn fold(&mut self, outcome: &Outcome) {
        match outcome.repair.status {
            StepStatus::Success => self.audit_success += 1,
            StepStatus::Failed | StepStatus::Skipped => self.audit_failed += 1,
        }
        match outcome.install.status {
            StepStatus::Success => self.pip_success += 1,
            StepStatus::Failed => self.pip_failed += 1,
            StepStatus::Skipped => self.pip_skipped += 1,
        }
        if outcome.is_platform_independent() {
            self.no_elf += 1;
        } else if outcome.is_natively_repaired() {
            self.native_repaired += 1;
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== SUMMARY =====")?;
        for (key, value) in [
            ("total", self.total),
            ("audit_success", self.audit_success),
            ("audit_failed", self.audit_failed),
            ("pip_success", self.pip_success),
            ("pip_failed", self.pip_failed),
            ("pip_skipped", self.pip_skipped),
            ("no_elf", self.no_elf),
            ("native_repaired", self.native_repaired),
            ("already_processed", self.already_processed),
            ("newly_processed", self.newly_processed),
            ("errors", self.errors),
            ("overall_total", self.overall_total()),
        ] {
            writeln!(f, "{key}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheelfix_schema::StepResult;
    use wheelfix_schema::outcome::{MSG_NO_BINARY_CONTENT, MSG_PLATFORM_INDEPENDENT};

    fn outcome(wheel: &str, repair: StepResult, install: StepResult) -> Outcome {
        Outcome {
            wheel: wheel.into(),
            repair,
            install,
            native_libraries: Vec::new(),
        }
    }

    #[test]
    fn test_replay_reconciles_with_checkpoint() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cp = Checkpoint::load(tmp.path()).unwrap();
        let ok = || StepResult::success("");
        cp.merge(outcome("a-1-cp311-cp311-linux_ppc64le.whl", ok(), ok()));
        cp.merge(outcome(
            "b-1-cp311-cp311-linux_ppc64le.whl",
            StepResult::success(MSG_NO_BINARY_CONTENT),
            StepResult::failed("x"),
        ));
        cp.merge(Outcome::repair_failed("c-1-cp311-cp311-linux_ppc64le.whl", "boom"));
        cp.merge(Outcome::repair_failed("d-1-cp311-cp311-linux_ppc64le.whl", "boom"));
        cp.merge(outcome(
            "e-1-py3-none-any.whl",
            StepResult::success(MSG_PLATFORM_INDEPENDENT),
            StepResult::skipped(),
        ));
        // row written by earlier tooling
        cp.merge(outcome(
            "f-1-py3-none-any.whl",
            StepResult::success("no-arch wheel (auditwheel skipped)"),
            StepResult::skipped(),
        ));

        let summary = RunSummary::replay(&cp);
        assert_eq!(summary.audit_success, 4);
        assert_eq!(summary.audit_failed, 2);
        assert_eq!(summary.pip_success, 1);
        assert_eq!(summary.pip_failed, 1);
        assert_eq!(summary.pip_skipped, 4);
        assert_eq!(summary.no_elf, 3);
        assert_eq!(summary.native_repaired, 1);
        assert_eq!(summary.already_processed, 6);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.newly_processed, 0);
    }

    #[test]
    fn test_record_and_display() {
        let mut summary = RunSummary::default();
        summary.already_processed = 2;
        summary.record(&outcome("a.whl", StepResult::success(""), StepResult::success("")));
        summary.record_error();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.newly_processed, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.overall_total(), 3);

        let text = summary.to_string();
        assert!(text.starts_with("===== SUMMARY =====\ntotal: 2\n"));
        assert!(text.contains("native_repaired: 1\n"));
        assert!(text.ends_with("overall_total: 3\n"));
    }
}
