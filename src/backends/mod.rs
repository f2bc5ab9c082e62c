//! Inference backend implementations
//!
//! Production inference runs through the ONNX Runtime backend; tests use the
//! deterministic mock predictor.

#[cfg(feature = "onnx")]
pub mod onnx;

pub mod test_utils;

#[cfg(feature = "onnx")]
pub use onnx::SamOnnxPredictor;
