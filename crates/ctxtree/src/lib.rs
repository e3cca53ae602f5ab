pub mod app;
pub mod cli;
pub mod domain;
pub mod infra;

/// Install logging for the given `-v` count.
pub fn init(verbosity: u8) {
    infra::logging::init(verbosity);
}
