//! Optional higher-level widgets (Phase 8).

pub mod container;
pub mod r#box;
pub mod cancellable_loader;
pub mod editor;
pub mod image;
pub mod input;
pub mod loader;
pub mod markdown;
pub mod settings_list;
pub mod select_list;
pub mod spacer;
pub mod text;
pub mod truncated_text;

pub use container::Container;
pub use r#box::Box;
pub use cancellable_loader::CancellableLoader;
pub use editor::{Editor, EditorOptions, EditorTheme};
pub use image::{Image, ImageOptions, ImageTheme};
pub use input::Input;
pub use loader::Loader;
pub use markdown::{DefaultTextStyle, Markdown, MarkdownTheme};
pub use settings_list::{SettingItem, SettingsList, SettingsListOptions, SettingsListTheme};
pub use select_list::{SelectItem, SelectList, SelectListTheme};
pub use spacer::Spacer;
pub use text::Text;
pub use truncated_text::TruncatedText;
