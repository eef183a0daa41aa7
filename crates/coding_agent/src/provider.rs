//! Provider contract re-exports used by `coding_agent`.

pub use agent_provider::{
    CancelSignal, ProviderInitError, ProviderProfile, RunEvent, RunMessage, RunProvider,
    RunRequest, ToolCallRequest, ToolDefinition, ToolResult,
};
