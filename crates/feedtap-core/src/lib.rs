//! # feedtap core
//!
//! In-process event distribution shared by every feedtap component.
//!
//! - [`Hub`] - named-topic publish/subscribe registry
//! - [`topics`] - the stable topic identifiers producers and consumers agree on
//!
//! The hub is constructed once by the application root and handed to each
//! component as an `Arc<Hub>`; there is no global instance.

pub mod error;
pub mod hub;
pub mod topics;

pub use error::HubError;
pub use hub::{Event, Hub, Payload, SubscriptionId};
