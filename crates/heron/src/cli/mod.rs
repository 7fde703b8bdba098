//
// cli/mod.rs
//
// Subcommands of the `heron` binary
//

pub mod expand;
