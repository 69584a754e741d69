//! Client-side entity caches.
//!
//! Each store is a cheap-clone handle over a `watch` channel: clones share the
//! same state and hosts can `subscribe()` to re-render on change. There is no
//! cross-store integrity; the essay cache is a view cache, never a source of
//! truth for totals.

mod auth;
mod essays;

pub use auth::{AuthStore, Session};
pub use essays::{EssayCache, EssayStore};
