//! # Symbols
//!
//! Everything the automaton moves around (stack entries, tape cells and
//! output) is a [`value::Value`].

pub mod value;
