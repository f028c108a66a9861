pub mod appearance;
pub mod controls;
pub mod face_details;
pub mod image_uploader;
pub mod live_view;
pub mod model_loader;
