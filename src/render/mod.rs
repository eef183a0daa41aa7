//! Rendering pipeline.

pub mod frame;
pub mod overlay;
pub mod renderer;

pub use frame::{Frame, Line, Span};
