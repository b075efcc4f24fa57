use std::fmt;
use std::process::ExitStatus;

use serde::Serialize;

use crate::{
    constants::{DIAGNOSTIC_LIMIT, NO_ANSWER_MSG},
    core::{deadline::Deadline, domain::InteractionSession},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Protocol Violation")]
    ProtocolViolation,
    #[serde(rename = "Query Limit Exceeded")]
    QueryLimitExceeded,
    #[serde(rename = "Idleness Limit Exceeded")]
    IdlenessLimitExceeded,
    #[serde(rename = "Grader Error")]
    GraderError,
    #[serde(rename = "Checker Error")]
    CheckerError,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::ProtocolViolation => "Protocol Violation",
            Verdict::QueryLimitExceeded => "Query Limit Exceeded",
            Verdict::IdlenessLimitExceeded => "Idleness Limit Exceeded",
            Verdict::GraderError => "Grader Error",
            Verdict::CheckerError => "Checker Error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one judging call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JudgeOutcome {
    pub verdict: Verdict,
    pub message: String,
    pub elapsed_ms: u64,
}

/// Packages the session state into the final triple.
///
/// A time-limit verdict always reports exactly the limit. An otherwise
/// clean session that never saw an answer is a runtime error.
pub fn conclude(session: &InteractionSession, deadline: &Deadline) -> JudgeOutcome {
    let (verdict, message) = match session.verdict {
        Verdict::Accepted if !session.got_answer => (Verdict::RuntimeError, NO_ANSWER_MSG.into()),
        verdict => (verdict, session.message.clone()),
    };

    let elapsed_ms = match verdict {
        Verdict::TimeLimitExceeded => deadline.limit_ms(),
        _ => deadline.elapsed_ms(),
    };

    JudgeOutcome {
        verdict,
        message,
        elapsed_ms,
    }
}

/// Keeps at most `limit` characters of `text`.
pub fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Message for a competitor that died: its stderr if it wrote any,
/// otherwise the exit status.
pub fn runtime_error_message(status: ExitStatus, stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("Program terminated with {}", status)
    } else {
        truncate(stderr, DIAGNOSTIC_LIMIT)
    }
}
