use std::time::Duration;

pub const BUDGET_TIMEOUT: Duration = Duration::from_secs(1);
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(1);
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Control line asking the interactor for the query budget of a case.
pub const BUDGET_REQUEST: &str = "MAX_QUERIES";

/// Answer payload used when the answer file is absent or inconsistent.
pub const MISSING_ANSWER: &str = "0";

pub const DEFAULT_STATIC_BUDGET: u32 = 10_000;

/// Limit (in characters) for diagnostics such as competitor stderr.
pub const DIAGNOSTIC_LIMIT: usize = 1000;
/// Limit (in characters) for echoing a malformed competitor line.
pub const ECHO_LIMIT: usize = 100;

/// How long a process that closed its pipes gets to report an exit status.
pub const EXIT_GRACE: Duration = Duration::from_millis(100);
pub const STDERR_CAPTURE_BYTES: usize = 64 * 1024;

pub const NO_ANSWER_MSG: &str = "Program exited without submitting an answer";
