pub mod interacting;
pub mod judging;
pub mod sequencing;
