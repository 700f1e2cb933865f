pub mod directives;
pub mod lifecycle;
pub mod registry;
pub mod reprocess;
pub mod resolver;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use directives::*;
pub use lifecycle::*;
pub use registry::*;
pub use reprocess::*;
pub use resolver::*;
pub use store::*;
pub use types::*;
