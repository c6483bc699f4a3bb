pub mod domain;
pub mod frame_adapter;
pub mod infrastructure;
