//! Command implementations for the CLI, one module per subcommand.

pub mod completions;
pub mod index;
pub mod query;
pub mod serve;
