//! Port traits at the boundary between the screening core and its collaborators.

pub mod config_port;
pub mod data_port;
pub mod report_port;
pub mod universe_port;
