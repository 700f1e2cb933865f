pub mod router;
pub mod types;


pub use router::*;
pub use types::*;
