//! Overlay control protocol.
//!
//! Messages arrive as loosely-typed lists of the shape
//! `[key, command, ...args]`. This module turns such a list into a typed
//! [`OverlayCommand`] in a single step so the registry never touches raw
//! atoms. A message that cannot be decoded is dropped as a whole.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single loosely-typed value of a remote message list.
///
/// The engine only ever sends floats and symbols. Untagged serde form lets
/// scripts write `["k", "move", 10, 20]` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Atom {
    Float(f32),
    Symbol(String),
}

impl Atom {
    pub fn as_float(&self) -> Option<f32> {
        match self {
            Atom::Float(value) => Some(*value),
            Atom::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Atom::Symbol(value) => Some(value.as_str()),
            Atom::Float(_) => None,
        }
    }
}

impl From<f32> for Atom {
    fn from(value: f32) -> Self {
        Atom::Float(value)
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::Symbol(value.to_string())
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::Symbol(value)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Float(value) => write!(f, "{}", value),
            Atom::Symbol(value) => write!(f, "{}", value),
        }
    }
}

/// Overlay control command decoded from a message.
///
/// `Text` is context dependent: it creates a text overlay for an unseen key
/// and replaces the text of an existing one.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OverlayCommand {
    Load { path: String },
    Text { value: String },
    Move { x: f32, y: f32 },
    Visible { flag: bool },
    Size { value: f32 },
    Unknown { verb: String },
}

impl OverlayCommand {
    /// Whether this command may create an overlay for an unseen key.
    pub fn creates(&self) -> bool {
        matches!(self, OverlayCommand::Load { .. } | OverlayCommand::Text { .. })
    }
}

/// A fully decoded overlay message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayMessage {
    pub key: String,
    #[serde(flatten)]
    pub command: OverlayCommand,
}

/// Threshold above which a `visible` argument turns the overlay on.
pub const VISIBLE_THRESHOLD: f32 = 0.5;

/// Decode one message list.
///
/// Returns `None` when the key or verb is missing or not a symbol, or when
/// a known verb carries an argument of the wrong type or too few arguments.
/// Unrecognized verbs decode to [`OverlayCommand::Unknown`]; the caller
/// decides what to do with them. Extra trailing arguments are ignored.
pub fn decode(args: &[Atom]) -> Option<OverlayMessage> {
    let key = args.first()?.as_symbol()?;
    let verb = args.get(1)?.as_symbol()?;
    let rest = &args[2..];

    let command = match verb {
        "load" => OverlayCommand::Load {
            path: symbol_at(rest, 0)?,
        },
        "text" => OverlayCommand::Text {
            value: symbol_at(rest, 0)?,
        },
        "move" => OverlayCommand::Move {
            x: float_at(rest, 0)?,
            y: float_at(rest, 1)?,
        },
        "visible" => OverlayCommand::Visible {
            flag: float_at(rest, 0)? > VISIBLE_THRESHOLD,
        },
        "size" => OverlayCommand::Size {
            value: float_at(rest, 0)?,
        },
        other => OverlayCommand::Unknown {
            verb: other.to_string(),
        },
    };

    Some(OverlayMessage {
        key: key.to_string(),
        command,
    })
}

fn float_at(args: &[Atom], index: usize) -> Option<f32> {
    args.get(index)?.as_float()
}

fn symbol_at(args: &[Atom], index: usize) -> Option<String> {
    args.get(index)?.as_symbol().map(str::to_string)
}

#[cfg(test)]
mod tests;
