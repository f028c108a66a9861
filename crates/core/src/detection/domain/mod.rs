pub mod detection_provider;
pub mod face_detection;
