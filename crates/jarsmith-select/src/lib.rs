//! Selecting class entries of a jar by top-level type patterns.

mod companion;
mod error;
mod filter;
mod pattern;
mod preset;
mod selector;

pub use crate::companion::{companion_name, CompanionError, CompanionIndex, API_ANNOTATIONS};
pub use crate::error::SelectError;
pub use crate::filter::{AnnotationFilter, StripMethodParameters, OMITTED_ANNOTATIONS};
pub use crate::pattern::{PatternList, TypePattern};
pub use crate::preset::{resolve_preset, SelectorPreset};
pub use crate::selector::{ClassEntrySelector, SelectionReport};
