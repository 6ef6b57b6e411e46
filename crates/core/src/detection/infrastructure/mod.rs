pub mod blazeface;
pub mod execution_provider;
pub mod face_mesh_detector;
pub mod math;
pub mod onnx_detector_factory;
