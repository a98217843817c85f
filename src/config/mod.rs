//! Configuration management for portscout.
//!
//! Settings live in a JSON file in the XDG config directory. Every field has
//! a default, and command-line flags override whatever the file says.

mod settings;

pub use settings::{AppSettings, Paths};
