//! Job completion reporting
//!
//! Renders per-stage done/failed tallies from the ledger and decides the
//! process exit status against the configured failure tolerance.

use crate::ledger::{Ledger, LedgerResult, Stage, StageCounts};

/// Completion summary for one job
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: String,
    pub stages: Vec<(Stage, StageCounts)>,
}

impl JobReport {
    /// Builds a report from the ledger's current counts
    pub fn from_ledger<L: Ledger>(job: &str, ledger: &L) -> LedgerResult<Self> {
        let mut stages = Vec::new();
        for stage in Stage::all_stages() {
            stages.push((stage, ledger.stage_counts(stage)?));
        }
        Ok(Self {
            job: job.to_string(),
            stages,
        })
    }

    pub fn total_done(&self) -> u64 {
        self.stages.iter().map(|(_, c)| c.done).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.stages.iter().map(|(_, c)| c.failed_terminal).sum()
    }

    /// Returns true if every stage settled (nothing pending or in progress)
    pub fn is_settled(&self) -> bool {
        self.stages.iter().all(|(_, c)| c.is_settled())
    }

    /// Returns true when terminal failures exceed the configured tolerance
    pub fn exceeds_tolerance(&self, tolerance: u64) -> bool {
        self.total_failed() > tolerance
    }

    /// Renders the report as printable text
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== Job '{}' ===\n", self.job));
        for (stage, counts) in &self.stages {
            out.push_str(&format!(
                "  {:<11} {:>5} done  {:>5} failed  {:>5} pending  {:>5} in progress\n",
                format!("{}:", stage),
                counts.done,
                counts.failed_terminal,
                counts.pending,
                counts.in_progress
            ));
        }
        out.push_str(&format!(
            "  total: {} done, {} failed\n",
            self.total_done(),
            self.total_failed()
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, SqliteLedger};

    fn ledger_with_work() -> SqliteLedger {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.begin_job("report-test", "h", "c", false).unwrap();

        ledger.add_work(Stage::Discovery, "kw").unwrap();
        ledger.claim(Stage::Discovery, "kw").unwrap();
        ledger.mark_done(Stage::Discovery, "kw").unwrap();

        for url in ["a", "b", "c"] {
            ledger.add_work(Stage::Crawl, url).unwrap();
            ledger.claim(Stage::Crawl, url).unwrap();
        }
        ledger.mark_done(Stage::Crawl, "a").unwrap();
        ledger.mark_done(Stage::Crawl, "b").unwrap();
        ledger.mark_failed(Stage::Crawl, "c", "blocked").unwrap();

        ledger
    }

    #[test]
    fn test_report_counts() {
        let ledger = ledger_with_work();
        let report = JobReport::from_ledger("report-test", &ledger).unwrap();

        assert_eq!(report.total_done(), 3);
        assert_eq!(report.total_failed(), 1);
        assert!(report.is_settled());
    }

    #[test]
    fn test_tolerance() {
        let ledger = ledger_with_work();
        let report = JobReport::from_ledger("report-test", &ledger).unwrap();

        assert!(report.exceeds_tolerance(0));
        assert!(!report.exceeds_tolerance(1));
        assert!(!report.exceeds_tolerance(5));
    }

    #[test]
    fn test_render_mentions_every_stage() {
        let ledger = ledger_with_work();
        let report = JobReport::from_ledger("report-test", &ledger).unwrap();
        let text = report.render();

        for stage in Stage::all_stages() {
            assert!(text.contains(&stage.to_string()), "missing {}", stage);
        }
        assert!(text.contains("3 done"));
    }

    #[test]
    fn test_unsettled_report() {
        let mut ledger = SqliteLedger::open_in_memory().unwrap();
        ledger.begin_job("unsettled", "h", "c", false).unwrap();
        ledger.add_work(Stage::Crawl, "pending-url").unwrap();

        let report = JobReport::from_ledger("unsettled", &ledger).unwrap();
        assert!(!report.is_settled());
    }
}
