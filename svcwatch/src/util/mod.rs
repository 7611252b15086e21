pub mod command;
pub mod logging;
pub mod shutdown;
