use std::path::PathBuf;

use uuid::Uuid;

use crate::core::{deadline::Deadline, verdict::Verdict};

#[derive(Clone, Debug)]
pub struct JudgeRequest {
    /// Argument vector of the competitor's already-built program.
    pub solution_cmd: Vec<String>,
    pub interactor_cmd: Vec<String>,
    pub input_path: PathBuf,
    pub answer_path: Option<PathBuf>,
    pub time_limit_ms: u64,
    /// Advisory only, containment is enforced outside this crate.
    pub memory_limit_mb: u64,
    pub test_name: String,
    pub query_budget: QueryBudget,
    pub idle_limit_ms: Option<u64>,
}

/// Where the per-case query limit comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum QueryBudget {
    /// Fixed for every case, never asks the interactor.
    Static(u32),
    /// Asked once, with the first case's answer, and reused.
    Global,
    /// Asked before every case.
    #[default]
    PerCase,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Language {
    GnuCpp,
    Python,
    Java,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub index: usize,
    pub input: String,
    pub answer: String,
}

impl TestCase {
    /// 1-based number used in verdict messages.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

/// Mutable state of one judging call.
///
/// The first verdict other than `Accepted` sticks; only the watchdog may
/// replace it, with `TimeLimitExceeded`.
#[derive(Clone, Debug)]
pub struct InteractionSession {
    pub id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub case_index: usize,
    pub query_count: u32,
    pub query_budget: u32,
    pub got_answer: bool,
    pub verdict: Verdict,
    pub message: String,
}

impl InteractionSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: chrono::Utc::now(),
            case_index: 0,
            query_count: 0,
            query_budget: 0,
            got_answer: false,
            verdict: Verdict::Accepted,
            message: String::new(),
        }
    }

    pub fn begin_case(&mut self, index: usize, query_budget: u32) {
        self.case_index = index;
        self.query_count = 0;
        self.query_budget = query_budget;
        self.got_answer = false;
    }

    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn accept(&mut self, message: String) {
        self.got_answer = true;
        self.message = message;
    }

    pub fn reject(&mut self, verdict: Verdict, message: String) {
        if !self.is_accepted() {
            tracing::debug!(
                "Ignoring {} ({}), verdict is already {}",
                verdict,
                message,
                self.verdict
            );
            return;
        }
        tracing::debug!("Verdict set to {}: {}", verdict, message);
        self.verdict = verdict;
        self.message = message;
    }

    pub fn force_time_limit(&mut self, deadline: &Deadline) {
        self.verdict = Verdict::TimeLimitExceeded;
        self.message = format!("Time limit of {} ms exceeded", deadline.limit_ms());
    }
}

impl Default for InteractionSession {
    fn default() -> Self {
        Self::new()
    }
}
