/// Judging logic that knows nothing about how processes are started.
pub mod deadline;
pub mod domain;
pub mod pipeline;
pub mod testdata;
pub mod traits;
pub mod verdict;
