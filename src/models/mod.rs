pub mod appointment;
pub mod common;
pub mod complaint;
pub mod notice;
pub mod notification;
pub mod property;
pub mod society;
pub mod user;
pub mod visitor;
