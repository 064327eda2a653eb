pub mod control;
pub mod scheduler;
pub mod sink;
pub mod transport;
