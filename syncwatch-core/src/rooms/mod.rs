mod code;
mod room;
mod session;

pub use code::*;
pub use room::*;
pub use session::*;

use thiserror::Error;

use crate::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The code does not match any room. The one condition surfaced to the
    /// user as fatal.
    #[error("room {0} doesn't exist")]
    RoomNotFound(RoomCode),
    /// A room cannot be created without a video reference.
    #[error("a room needs a video to watch")]
    MissingVideo,
    /// Every generated code collided with an existing room.
    #[error("could not find a free room code")]
    CodesExhausted,
    #[error(transparent)]
    Store(StoreError),
}
