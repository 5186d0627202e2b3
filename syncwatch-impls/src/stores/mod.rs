mod memory;
mod pg;

pub use memory::*;
pub use pg::*;
