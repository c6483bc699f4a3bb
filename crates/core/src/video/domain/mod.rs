pub mod image_writer;
pub mod raw_sample;
pub mod stream_source;
