pub mod broker;
pub mod message;
pub mod store;
pub mod waiters;
