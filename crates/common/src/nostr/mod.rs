//! Nostr protocol plumbing
//!
//! Everything the ranking core needs from the relay network:
//! - [`PublicKey`] raw participant keys and the npub codec
//! - NIP-01 [`Event`] and [`Filter`] types
//! - Relay wire messages
//! - The [`RelayGateway`] seam and its websocket implementation

mod codec;
mod event;
mod gateway;
mod key;
pub mod message;
mod relay;

pub use codec::{decode_npub, encode_npub, CodecError, NPUB_PREFIX};
pub use event::{Event, Filter};
pub use gateway::{EventStream, RelayGateway};
pub use key::PublicKey;
pub use relay::WebSocketGateway;
