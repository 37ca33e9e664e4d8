//! Project initialization.
//!
//! Generates a `.ledit/` directory with:
//! - Engine configuration (`config.toml`)
//! - Example process definitions (`processes/*.json`)
//!
//! # Example
//!
//! ```no_run
//! use ledit_core::init::{generate_ledit_structure, InitOptions};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = InitOptions {
//!     target_dir: PathBuf::from("."),
//!     force: false,
//!     minimal: false,
//! };
//!
//! let written = generate_ledit_structure(options).await?;
//! println!("Wrote {} files", written.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_ledit_structure, InitOptions};
pub use templates::{get_template, list_templates};
