//! Chat storage module
//!
//! JSON-file-per-room storage with per-room broadcast channels.

pub mod json_store;

pub use json_store::{JsonChatStore, RoomData, RoomUpdate, UpdateChannel, UpdateType};
