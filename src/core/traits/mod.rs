pub mod interactor;
