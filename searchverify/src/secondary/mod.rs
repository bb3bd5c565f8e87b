//! Secondary resolution: following a primary result to a related payload.

mod link;
mod resolver;

pub use link::{strip_placeholder, FollowUp, LinkKind, SecondaryLink, UrlTemplate};
pub use resolver::{SecondaryPayload, SecondaryResolver};
