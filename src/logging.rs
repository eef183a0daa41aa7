//! Render/debug logging helpers (Phase 0 skeleton).
//!
//! TODO: implement log sinks for PI_TUI_DEBUG / PI_DEBUG_REDRAW.

#[derive(Debug, Default)]
pub struct RenderLogger;

#[derive(Debug, Default)]
pub struct DebugLogger;
