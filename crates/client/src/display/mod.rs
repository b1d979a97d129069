//! Presentation helpers for the console's list and detail views.
//!
//! Everything here is pure: values in, display strings and tones out.

pub mod address;
pub mod diagnosis;
pub mod flow;
pub mod node;
pub mod tunnel;

pub use address::*;
pub use diagnosis::*;
pub use flow::*;
pub use node::*;
pub use tunnel::*;

/// Semantic color of a chip, badge or progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Default,
    Primary,
    Secondary,
    Success,
    Warning,
    Danger,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Default => "default",
            Tone::Primary => "primary",
            Tone::Secondary => "secondary",
            Tone::Success => "success",
            Tone::Warning => "warning",
            Tone::Danger => "danger",
        }
    }
}

/// A label with its tone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub tone: Tone,
}

impl Badge {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}
