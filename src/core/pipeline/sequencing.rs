use std::time::Duration;

use crate::{
    core::{
        deadline::Deadline,
        domain::{InteractionSession, QueryBudget, TestCase},
        pipeline::interacting::Interaction,
        testdata,
        traits::interactor::{InteractorError, Interactor},
        verdict::Verdict,
    },
    native::process::{ProcessError, ProcessHandle},
};

/// Runs the test cases of one request, in order, against a single
/// competitor process. Later cases depend on where the competitor stopped
/// reading, so cases never run concurrently and the first failure ends the
/// sequence.
#[derive(Debug)]
pub struct Sequencer<'a> {
    pub interactor: &'a dyn Interactor,
    pub query_budget: &'a QueryBudget,
    pub idle_limit: Option<Duration>,
    pub test_name: &'a str,
}

impl Sequencer<'_> {
    #[tracing::instrument(skip_all, fields(cases = cases.len()))]
    pub async fn run(
        &self,
        process: &mut ProcessHandle,
        cases: &[TestCase],
        session: &mut InteractionSession,
        deadline: &Deadline,
    ) {
        let block = testdata::initial_block(cases);
        match process.write_until(block.as_bytes(), deadline.at()).await {
            Ok(()) => {}
            Err(ProcessError::TimedOut) => {
                session.force_time_limit(deadline);
                process.kill().await;
                return;
            }
            // Whatever happened to the competitor shows up on its output.
            Err(e) => tracing::warn!("Failed to send test input: {}", e),
        }

        let mut global_budget = None;
        for case in cases {
            let Some(budget) = self
                .query_budget_for(case, &mut global_budget, process, session, deadline)
                .await
            else {
                return;
            };
            tracing::debug!("Test case {} has a budget of {} queries", case.number(), budget);
            session.begin_case(case.index, budget);

            Interaction {
                process: &mut *process,
                interactor: self.interactor,
                session: &mut *session,
                deadline,
                idle_limit: self.idle_limit,
                test_name: self.test_name,
            }
            .run(case)
            .await;

            if !session.is_accepted() || !session.got_answer {
                tracing::info!("Stopped at test case {}: {}", case.number(), session.verdict);
                return;
            }
        }

        if cases.len() > 1 {
            session.message = format!("All {} test case(s) passed", cases.len());
        }
    }

    async fn query_budget_for(
        &self,
        case: &TestCase,
        global_budget: &mut Option<u32>,
        process: &mut ProcessHandle,
        session: &mut InteractionSession,
        deadline: &Deadline,
    ) -> Option<u32> {
        let fetched = match self.query_budget {
            QueryBudget::Static(budget) => return Some(*budget),
            QueryBudget::Global if global_budget.is_some() => return *global_budget,
            QueryBudget::Global | QueryBudget::PerCase => {
                self.interactor.fetch_query_budget(&case.answer, deadline).await
            }
        };

        match fetched {
            Ok(budget) => {
                if *self.query_budget == QueryBudget::Global {
                    *global_budget = Some(budget);
                }
                Some(budget)
            }
            Err(InteractorError::DeadlineExceeded) => {
                session.force_time_limit(deadline);
                process.kill().await;
                None
            }
            Err(e) => {
                tracing::error!("Failed to obtain query budget: {}", e);
                let message = format!(
                    "Failed to obtain query budget for test case {}: {}",
                    case.number(),
                    e
                );
                session.reject(Verdict::GraderError, message);
                process.kill().await;
                None
            }
        }
    }
}
