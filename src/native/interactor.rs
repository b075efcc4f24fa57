use std::process::ExitStatus;
use std::time::Duration;

use crate::{
    constants::{BUDGET_REQUEST, BUDGET_TIMEOUT, CHECK_TIMEOUT, DIAGNOSTIC_LIMIT, QUERY_TIMEOUT},
    core::{
        deadline::Deadline,
        traits::interactor::{InteractorError, Interactor, Judgement},
        verdict::{Verdict, truncate},
    },
    native::process::{Completed, ProcessError, ProcessHandle},
};

/// Runs a fresh interactor process for every call.
///
/// The interactor reads the case's answer line, then one command line: the
/// budget request, a `?` query or a `!` answer.
#[derive(Clone, Debug)]
pub struct ProcessInteractor {
    command: Vec<String>,
}

impl ProcessInteractor {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    async fn invoke(
        &self,
        answer: &str,
        line: &str,
        timeout: Duration,
        deadline: &Deadline,
    ) -> Result<Completed, InteractorError> {
        let input = format!("{}\n{}\n", answer, line);
        tracing::debug!("Interactor input: {:?}", input);

        let result =
            ProcessHandle::communicate(&self.command, &input, deadline.capped(timeout)).await;
        match result {
            Ok(done) => {
                tracing::debug!("Interactor finished with {}: {:?}", done.status, done.stdout);
                Ok(done)
            }
            Err(ProcessError::TimedOut) if deadline.expired() => {
                Err(InteractorError::DeadlineExceeded)
            }
            Err(ProcessError::TimedOut) => {
                tracing::error!("Interactor timed out after {:?}", timeout);
                Err(InteractorError::TimedOut {
                    ms: timeout.as_millis() as u64,
                })
            }
            Err(e) => {
                tracing::error!("Interactor failed: {}", e);
                Err(InteractorError::Launch { msg: e.to_string() })
            }
        }
    }
}

#[async_trait::async_trait]
impl Interactor for ProcessInteractor {
    #[tracing::instrument(skip_all)]
    async fn fetch_query_budget(
        &self,
        answer: &str,
        deadline: &Deadline,
    ) -> Result<u32, InteractorError> {
        let done = self.invoke(answer, BUDGET_REQUEST, BUDGET_TIMEOUT, deadline).await?;
        ensure_success(&done)?;

        let output = done.stdout.trim();
        output.parse().map_err(|_| InteractorError::BadBudget {
            output: truncate(output, DIAGNOSTIC_LIMIT),
        })
    }

    #[tracing::instrument(skip(self, answer, deadline))]
    async fn answer_query(
        &self,
        answer: &str,
        query: &str,
        deadline: &Deadline,
    ) -> Result<String, InteractorError> {
        let done = self.invoke(answer, query, QUERY_TIMEOUT, deadline).await?;
        ensure_success(&done)?;
        Ok(done.stdout.trim().to_string())
    }

    #[tracing::instrument(skip(self, answer, deadline))]
    async fn check_answer(
        &self,
        answer: &str,
        claim: &str,
        deadline: &Deadline,
    ) -> Result<Judgement, InteractorError> {
        let done = self.invoke(answer, claim, CHECK_TIMEOUT, deadline).await?;
        let message = done.stdout.trim().to_string();
        Ok(Judgement {
            verdict: classify(&message, done.status),
            message,
        })
    }
}

fn ensure_success(done: &Completed) -> Result<(), InteractorError> {
    if done.status.success() {
        return Ok(());
    }
    tracing::error!("Interactor exited with {}: {}", done.status, done.stderr);
    Err(InteractorError::Failed {
        status: done.status.to_string(),
        stderr: truncate(done.stderr.trim(), DIAGNOSTIC_LIMIT),
    })
}

/// Reads the interactor's verdict on a final answer. Keywords win over the
/// exit status: "accepted"/`AC` first, then "wrong"/`WA`.
pub fn classify(output: &str, status: ExitStatus) -> Verdict {
    let upper = output.to_uppercase();
    if upper.contains("ACCEPTED") || output.eq_ignore_ascii_case("AC") {
        Verdict::Accepted
    } else if upper.contains("WRONG") || output.eq_ignore_ascii_case("WA") {
        Verdict::WrongAnswer
    } else if status.success() {
        Verdict::Accepted
    } else {
        Verdict::WrongAnswer
    }
}
