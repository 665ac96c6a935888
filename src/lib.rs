//! Client orchestration for the OneGate society portal: REST access, the
//! signed-in session, live invalidations and the appointment workflow.

pub mod config;
pub mod error;
pub mod models;
pub mod portal;
pub mod services;
pub mod tasks;

pub use config::Config;
pub use error::{ApiError, AppointmentError, ChannelError, PortalError, RequestError, SessionError};
pub use portal::Portal;
