//! Desktop collaborators: global hotkey, preset selection, notifications.

pub mod feedback;
pub mod hotkey;
pub mod selection;

pub use feedback::DesktopFeedback;
pub use hotkey::{parse_hotkey, HotkeyBridge};
pub use selection::PresetSelection;
