pub mod threaded_pipeline;
