use std::time::Duration;

use tracing::Instrument;

use crate::{
    constants::EXIT_GRACE,
    core::{
        deadline::Deadline,
        domain::{InteractionSession, JudgeRequest},
        pipeline::sequencing::Sequencer,
        testdata,
        traits::interactor::Interactor,
        verdict::{self, JudgeOutcome, Verdict, runtime_error_message},
    },
    native::{interactor::ProcessInteractor, process::ProcessHandle},
};

/// Judges one request with a process-backed interactor.
pub async fn judge(request: &JudgeRequest) -> JudgeOutcome {
    let interactor = ProcessInteractor::new(request.interactor_cmd.clone());
    judge_with(request, &interactor).await
}

/// Judges one request. Nothing outlives the call: the competitor is always
/// dead by the time this returns.
pub async fn judge_with(request: &JudgeRequest, interactor: &dyn Interactor) -> JudgeOutcome {
    let deadline = Deadline::start(Duration::from_millis(request.time_limit_ms));
    let mut session = InteractionSession::new();
    let span = tracing::info_span!("judge", session = %session.id, test = %request.test_name);

    async {
        tracing::info!(
            "Judging started at {} with a limit of {} ms ({} MB advisory)",
            session.started_at,
            request.time_limit_ms,
            request.memory_limit_mb
        );
        run(request, interactor, &mut session, &deadline).await;

        let outcome = verdict::conclude(&session, &deadline);
        tracing::info!(
            "Judging finished: {} in {} ms: {}",
            outcome.verdict,
            outcome.elapsed_ms,
            outcome.message
        );
        outcome
    }
    .instrument(span)
    .await
}

async fn run(
    request: &JudgeRequest,
    interactor: &dyn Interactor,
    session: &mut InteractionSession,
    deadline: &Deadline,
) {
    let cases = match testdata::load(&request.input_path, request.answer_path.as_deref()).await {
        Ok(cases) => cases,
        Err(e) => {
            tracing::error!("Bad test data: {}", e);
            session.reject(Verdict::GraderError, e.to_string());
            return;
        }
    };

    let mut process = match ProcessHandle::spawn(&request.solution_cmd) {
        Ok(process) => process,
        Err(e) => {
            tracing::error!("Failed to start the solution: {}", e);
            session.reject(Verdict::GraderError, e.to_string());
            return;
        }
    };

    let sequencer = Sequencer {
        interactor,
        query_budget: &request.query_budget,
        idle_limit: request.idle_limit_ms.map(Duration::from_millis),
        test_name: &request.test_name,
    };

    // Watchdog: the whole sequence is dropped the moment the deadline passes,
    // wherever it is blocked.
    let watched = tokio::time::timeout_at(
        deadline.at(),
        sequencer.run(&mut process, &cases, session, deadline),
    )
    .await;

    if watched.is_err() || deadline.expired() {
        session.force_time_limit(deadline);
    } else if session.is_accepted() && session.got_answer {
        settle(&mut process, session, deadline).await;
    }
    process.kill().await;
}

/// After the last accepted answer the competitor gets a short grace period
/// to exit. A crash seen in that window overturns the verdict; a competitor
/// still running afterwards is stopped and keeps its verdict.
async fn settle(
    process: &mut ProcessHandle,
    session: &mut InteractionSession,
    deadline: &Deadline,
) {
    process.close_stdin();
    match process.wait(deadline.capped(EXIT_GRACE)).await {
        Ok(status) if status.success() => {}
        Ok(status) => {
            let stderr = process.stderr().await;
            session.reject(Verdict::RuntimeError, runtime_error_message(status, &stderr));
        }
        Err(e) => tracing::debug!("Solution still running after the last answer: {}", e),
    }
}
