//! Painter library crate.
//!
//! A drawing surface core: parsed commands become operations, a render loop
//! applies them in order to a double-buffered canvas and publishes frames.

/// Configuration management.
pub mod config;
/// Command language parser.
pub mod lang;
/// Operations, queue, render loop and headless backend.
pub mod painter;
