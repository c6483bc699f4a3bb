pub mod app_sink;
pub mod capture_config;
pub mod infrastructure;
pub mod pipeline_controller;
pub mod pipeline_description;
pub mod pipeline_error;
pub mod pipeline_state;
pub mod session_logger;
pub mod source_descriptor;
