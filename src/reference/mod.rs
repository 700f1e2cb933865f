pub mod cache;
pub mod defaults;
pub mod documentation;
pub mod types;


pub use cache::*;
pub use defaults::*;
pub use documentation::*;
pub use types::*;
