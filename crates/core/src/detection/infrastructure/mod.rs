pub mod face_store;
pub mod haar_cascade;
pub mod haar_cascade_loader;
pub mod integral_image;
