mod marker;
mod store;
mod turn;

pub use marker::ImageMarker;
pub use store::{SessionState, WELCOME_MESSAGE};
pub use turn::{ChatTurn, EncodedBitmap, Role, TaskKind, JPEG_MIME_TYPE};
