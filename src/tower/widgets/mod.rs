mod help_modal;
mod project_selector;
mod text_prompt;
mod window_list;

pub use help_modal::HelpModal;
pub use project_selector::ProjectSelector;
pub use text_prompt::{PromptPurpose, TextPrompt};
pub use window_list::{WindowEntry, WindowList};
