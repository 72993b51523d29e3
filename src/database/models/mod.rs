pub mod favorite;
pub mod file;
pub mod user;

pub use favorite::Favorite;
pub use file::{BlobRef, FileRecord, FileType, NewFile};
pub use user::{Membership, Role, User};
