/// Native module contains implementations of core traits
/// that drive real OS processes through pipes and process groups,
/// plus the problem directory conventions used to find them.
pub mod interactor;
pub mod problem;
pub mod process;
