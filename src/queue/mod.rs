//! Comment queue — durable queue of inbound platform comments.

pub mod model;

pub use model::{CommentStatus, NewComment, QueuedComment};
