//! Agent lookup and persona handling.
//!
//! Agents are data: a persona, a model and an optional budget. They all run
//! through the same execution loop, so this module only provides the
//! [`AgentRegistry`] for lookups and the [`Persona`] tag parser.

pub mod persona;
pub mod registry;

pub use persona::Persona;
pub use registry::AgentRegistry;
