pub mod build_airports;
pub mod trace_all;
pub mod update;

pub use build_airports::handle_build_airports;
pub use trace_all::handle_trace_all;
pub use update::handle_update;
