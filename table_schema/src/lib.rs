//! Data contracts for the table state pipeline.
//!
//! Holds the types shared between the pipeline core and its tooling: chip
//! amounts, the state tree and its paths, inbound wire messages, recorded
//! sessions and deterministic digests. Nothing here depends on Bevy.

mod amount;
mod error;
mod hashing;
mod message;
mod path;
mod session;
mod value;

pub use amount::{Amount, AmountParseError};
pub use error::ProtoError;
pub use hashing::{digest_optional, digest_state, FnvHasher};
pub use message::{
    decode_message_json, encode_message_json, InboundMessage, StateUpdate, TickEvent, NOTIFICATION,
    TICK, UPDATE_CHAT, UPDATE_GAMESTATE, UPDATE_TOURNAMENT_STATE,
};
pub use path::{PathError, PropertyPath};
pub use session::{RecordedSession, SessionEntry};
pub use value::StateValue;
