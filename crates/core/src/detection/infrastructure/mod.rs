pub mod execution_provider;
pub mod math;
pub mod model_manifest;
pub mod model_resolver;
pub mod onnx_face_provider;
