use std::time::Duration;

use crate::{
    constants::{ECHO_LIMIT, EXIT_GRACE, NO_ANSWER_MSG},
    core::{
        deadline::Deadline,
        domain::{InteractionSession, TestCase},
        traits::interactor::{InteractorError, Interactor, Judgement},
        verdict::{Verdict, runtime_error_message, truncate},
    },
    native::process::{ProcessError, ProcessHandle},
};

enum Step {
    Continue,
    Stop,
}

/// Drives the competitor through the query/answer grammar for one test case.
///
/// Lines starting with `?` are queries forwarded to the interactor, a line
/// starting with `!` is the final answer of the case, empty lines are
/// ignored and anything else is a protocol violation. Every fault lands in
/// the session; whenever the competitor cannot go on it is killed.
pub struct Interaction<'a> {
    pub process: &'a mut ProcessHandle,
    pub interactor: &'a dyn Interactor,
    pub session: &'a mut InteractionSession,
    pub deadline: &'a Deadline,
    pub idle_limit: Option<Duration>,
    pub test_name: &'a str,
}

impl Interaction<'_> {
    #[tracing::instrument(skip_all, fields(case = case.number()))]
    pub async fn run(&mut self, case: &TestCase) {
        while let Some(line) = self.next_line(case).await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!("Competitor: {}", line);

            let step = if line.starts_with('?') {
                self.on_query(case, line).await
            } else if line.starts_with('!') {
                self.on_answer(case, line).await
            } else {
                let message = format!(
                    "Output must start with '?' or '!', got: {}",
                    truncate(line, ECHO_LIMIT)
                );
                self.stop(Verdict::ProtocolViolation, message).await
            };

            if let Step::Stop = step {
                return;
            }
        }
    }

    async fn next_line(&mut self, case: &TestCase) -> Option<String> {
        let until = match self.idle_limit {
            Some(idle) => self.deadline.capped(idle),
            None => self.deadline.at(),
        };

        match self.process.read_line(until).await {
            Ok(Some(line)) => Some(line),
            Ok(None) => {
                self.on_disconnect(case).await;
                None
            }
            Err(ProcessError::TimedOut) if self.deadline.expired() => {
                self.time_out().await;
                None
            }
            Err(ProcessError::TimedOut) => {
                let idle = self.idle_limit.unwrap_or_default();
                let message = format!(
                    "No output for {} ms on test case {}",
                    idle.as_millis(),
                    case.number()
                );
                self.stop(Verdict::IdlenessLimitExceeded, message).await;
                None
            }
            Err(e) => {
                self.stop(Verdict::RuntimeError, e.to_string()).await;
                None
            }
        }
    }

    async fn on_query(&mut self, case: &TestCase, query: &str) -> Step {
        self.session.query_count += 1;
        if self.session.query_count > self.session.query_budget {
            let message = format!(
                "{}: query limit of {} exceeded on test case {}",
                self.test_name,
                self.session.query_budget,
                case.number()
            );
            return self.stop(Verdict::QueryLimitExceeded, message).await;
        }

        match self.interactor.answer_query(&case.answer, query, self.deadline).await {
            Ok(response) => {
                tracing::debug!("Interactor: {}", response);
                self.reply(case, &response).await
            }
            Err(InteractorError::DeadlineExceeded) => self.time_out().await,
            Err(e) => {
                let message = format!(
                    "Interactor failed while answering a query on test case {}: {}",
                    case.number(),
                    e
                );
                self.stop(Verdict::GraderError, message).await
            }
        }
    }

    async fn reply(&mut self, case: &TestCase, response: &str) -> Step {
        let error = match self.process.write_line(response, self.deadline.at()).await {
            Ok(()) => return Step::Continue,
            Err(ProcessError::TimedOut) => return self.time_out().await,
            Err(e) => e,
        };

        // The competitor stopped reading. Exiting cleanly at this point is an
        // ordinary end of interaction, just without an answer.
        match self.process.wait(self.deadline.capped(EXIT_GRACE)).await {
            Ok(status) if status.success() => {
                self.stop(Verdict::RuntimeError, no_answer(case)).await
            }
            Ok(status) => {
                let stderr = self.process.stderr().await;
                self.stop(Verdict::RuntimeError, runtime_error_message(status, &stderr))
                    .await
            }
            Err(_) => {
                let message = format!("Failed to send response to the program: {}", error);
                self.stop(Verdict::RuntimeError, message).await
            }
        }
    }

    async fn on_answer(&mut self, case: &TestCase, claim: &str) -> Step {
        match self.interactor.check_answer(&case.answer, claim, self.deadline).await {
            Ok(Judgement {
                verdict: Verdict::Accepted,
                message,
            }) => {
                tracing::info!("Test case {} accepted", case.number());
                self.session.accept(message);
            }
            Ok(Judgement { verdict, message }) => {
                self.session.got_answer = true;
                let message = format!("{} on test case {}: {}", verdict, case.number(), message);
                self.session.reject(verdict, message);
            }
            Err(InteractorError::DeadlineExceeded) => {
                self.time_out().await;
            }
            Err(e) => {
                let message = format!(
                    "Checking the answer on test case {} failed: {}",
                    case.number(),
                    e
                );
                self.session.reject(Verdict::CheckerError, message);
            }
        }
        Step::Stop
    }

    async fn on_disconnect(&mut self, case: &TestCase) {
        match self.process.wait(self.deadline.capped(EXIT_GRACE)).await {
            Ok(status) if !status.success() => {
                let stderr = self.process.stderr().await;
                self.stop(Verdict::RuntimeError, runtime_error_message(status, &stderr))
                    .await;
            }
            Err(ProcessError::TimedOut) if self.deadline.expired() => {
                self.time_out().await;
            }
            _ => {
                self.stop(Verdict::RuntimeError, no_answer(case)).await;
            }
        }
    }

    async fn stop(&mut self, verdict: Verdict, message: String) -> Step {
        tracing::info!("Stopping interaction: {}: {}", verdict, message);
        self.session.reject(verdict, message);
        self.process.kill().await;
        Step::Stop
    }

    async fn time_out(&mut self) -> Step {
        tracing::info!("Deadline of {} ms reached", self.deadline.limit_ms());
        self.session.force_time_limit(self.deadline);
        self.process.kill().await;
        Step::Stop
    }
}

fn no_answer(case: &TestCase) -> String {
    format!("{} on test case {}", NO_ANSWER_MSG, case.number())
}
