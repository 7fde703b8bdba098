//
// copybook/mod.rs
//
// Copybook resolution: content providers, directive recognition and the
// expansion engine
//

pub mod config;
pub mod content_provider;
pub mod dialect;
pub mod directive;
pub mod file_system;
pub mod locator;
pub mod name;
pub mod replacing;
pub mod resolver;
pub mod source_map;



pub use config::*;
pub use content_provider::*;
pub use dialect::*;
pub use directive::*;
pub use file_system::*;
pub use locator::*;
pub use name::*;
pub use replacing::*;
pub use resolver::*;
pub use source_map::*;
