//! Core interfaces and types (Phase 0 skeleton).

pub mod terminal;
pub mod component;
pub mod input;
pub mod input_event;
pub mod output;
pub mod cursor;
pub mod text;
pub mod keybindings;
pub mod autocomplete;
pub mod editor_component;
pub mod fuzzy;
pub mod terminal_image;
