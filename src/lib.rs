pub mod constants;
pub mod core;
pub mod native;

#[cfg(test)]
mod testing;
