//! Application layer: pattern matching, tree building, selection, and document generation.

pub mod document;
pub mod export;
pub mod language;
pub mod pattern;
pub mod scan;
pub mod selection;
pub mod tree;
