//! # feedtap site
//!
//! Everything specific to the target site: the explore feed, the note
//! detail overlay, login detection, persisted storage state, and the
//! session driver tying them to one browser page.

pub mod channel;
pub mod feed;
pub mod identity;
pub mod note;
pub mod session;
pub mod storage;

pub use channel::{ChannelEntry, ChannelError, ChannelReader};
pub use feed::{FeedEngine, FeedEntry, FeedError};
pub use identity::{IdentityWatch, UserInfo};
pub use note::{NoteDetail, NoteError, NoteReader};
pub use session::{EventSink, FeedItem, Session, SessionError};
pub use storage::StorageState;
