//! Utilities shared by the Kakehashi relay server and its CLI client.

pub mod logger;
pub mod time;
