//! One module per subcommand, each exposing an `execute` function.

pub mod check_config;
pub mod migrate;
pub mod shred;
pub mod status;
pub mod wipe_free;
