pub mod event_bus;
pub mod sweeper;
pub mod tokens;
