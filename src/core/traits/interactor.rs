use crate::core::{deadline::Deadline, verdict::Verdict};

/// Reference program of an interactive problem. Each call is independent
/// and sees only the answer payload of the current test case.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Interactor: std::fmt::Debug + Send + Sync {
    async fn fetch_query_budget(
        &self,
        answer: &str,
        deadline: &Deadline,
    ) -> Result<u32, InteractorError>;

    async fn answer_query(
        &self,
        answer: &str,
        query: &str,
        deadline: &Deadline,
    ) -> Result<String, InteractorError>;

    async fn check_answer(
        &self,
        answer: &str,
        claim: &str,
        deadline: &Deadline,
    ) -> Result<Judgement, InteractorError>;
}

/// Interactor's opinion on a final answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Judgement {
    /// Either `Accepted` or `WrongAnswer`.
    pub verdict: Verdict,
    pub message: String,
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum InteractorError {
    #[error("could not run the interactor: {msg}")]
    Launch { msg: String },
    #[error("interactor timed out after {ms} ms")]
    TimedOut { ms: u64 },
    #[error("judging deadline reached while waiting for the interactor")]
    DeadlineExceeded,
    #[error("interactor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("interactor returned an unreadable query budget {output:?}")]
    BadBudget { output: String },
}
