//! Step and option identifiers
//!
//! Identifiers are structured labels rather than bare strings so that a
//! recipe can name options by the parameters they were built from, e.g. a
//! tuple `("lr", 3)` or an integer window size.
//!
//! # Design Decision
//!
//! [`Label`] deliberately has no floating point variant: identifiers must be
//! `Eq + Hash + Ord` and must serialize identically on every machine so that
//! cache keys stay stable. Encode real-valued parameters as text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label reserved for the virtual root every input step hangs from.
pub const ROOT_LABEL: &str = "ROOT";

/// A hashable, totally ordered, serializable identifier value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Text(String),
    Int(i64),
    Bool(bool),
    Tuple(Vec<Label>),
}

impl Label {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Label::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(text) => f.write_str(text),
            Label::Int(n) => write!(f, "{n}"),
            Label::Bool(b) => write!(f, "{b}"),
            Label::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Text(text) => write!(f, "{text:?}"),
            Label::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item:?}")?;
                }
                f.write_str(")")
            }
            other => write!(f, "{other}"),
        }
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label::Text(value.to_owned())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label::Text(value)
    }
}

impl From<&String> for Label {
    fn from(value: &String) -> Self {
        Label::Text(value.clone())
    }
}

impl From<i64> for Label {
    fn from(value: i64) -> Self {
        Label::Int(value)
    }
}

impl From<i32> for Label {
    fn from(value: i32) -> Self {
        Label::Int(i64::from(value))
    }
}

impl From<u32> for Label {
    fn from(value: u32) -> Self {
        Label::Int(i64::from(value))
    }
}

impl From<bool> for Label {
    fn from(value: bool) -> Self {
        Label::Bool(value)
    }
}

impl From<Vec<Label>> for Label {
    fn from(items: Vec<Label>) -> Self {
        Label::Tuple(items)
    }
}

impl<A: Into<Label>, B: Into<Label>> From<(A, B)> for Label {
    fn from((a, b): (A, B)) -> Self {
        Label::Tuple(vec![a.into(), b.into()])
    }
}

macro_rules! label_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Label);

        impl $name {
            pub fn new(label: impl Into<Label>) -> Self {
                Self(label.into())
            }

            pub fn label(&self) -> &Label {
                &self.0
            }

            /// Returns the text if this identifier is a plain string
            pub fn as_text(&self) -> Option<&str> {
                self.0.as_text()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl From<Label> for $name {
            fn from(label: Label) -> Self {
                Self(label)
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> Self {
                id.clone()
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.into())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value.into())
            }
        }

        impl From<&String> for $name {
            fn from(value: &String) -> Self {
                Self(value.into())
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value.into())
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value.into())
            }
        }

        impl From<bool> for $name {
            fn from(value: bool) -> Self {
                Self(value.into())
            }
        }
    };
}

label_newtype!(
    /// Identifies a step within a graph
    ///
    /// ```
    /// use hodos::StepId;
    ///
    /// let step = StepId::from("tokenize");
    /// assert_eq!(step.to_string(), "tokenize");
    /// assert!(!step.is_root());
    /// ```
    StepId
);

label_newtype!(
    /// Identifies one interchangeable implementation of a step
    OptionId
);

impl StepId {
    /// The virtual root that input steps depend on.
    pub fn root() -> Self {
        Self(Label::Text(ROOT_LABEL.to_owned()))
    }

    pub fn is_root(&self) -> bool {
        self.0.as_text() == Some(ROOT_LABEL)
    }
}
