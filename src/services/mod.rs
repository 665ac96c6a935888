pub mod api;
pub mod appointments;
pub mod catalog;
pub mod channel;
pub mod notifications;
pub mod recommendations;
pub mod session;
pub mod stomp;
