//! In-process stores for live call state.
//!
//! Two stores live here, both purely in-memory and shared across every
//! connection handler in the gateway:
//!
//! - [`CallRegistry`] — call sessions keyed by telephony call id, with a
//!   bounded conversation log and monotonic lifecycle status.
//! - [`AudioBlobStore`] — short-lived synthesized-audio payloads exposed by
//!   id so the telephony provider can fetch them over HTTP.
//!
//! Both use `std::sync::RwLock`/`Mutex` intentionally: every lock
//! acquisition is a brief map operation that never spans an `.await` point,
//! making a synchronous lock safe and more efficient than the tokio
//! equivalents.

mod blob;
mod call;

pub use blob::{AudioBlob, AudioBlobStore};
pub use call::{CallRegistry, ConversationEntry};
