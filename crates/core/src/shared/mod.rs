pub mod constants;
pub mod detection_buffer;
pub mod event_bus;
pub mod frame;
pub mod pixel_format;
pub mod rect;
pub mod resource_resolver;
