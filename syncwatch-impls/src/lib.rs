mod channels;
mod identity;
mod stores;

pub use channels::*;
pub use identity::*;
pub use stores::*;
