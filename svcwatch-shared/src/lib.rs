pub mod run_state;
pub mod service_spec;
