//! Real-time channel to the classifier server

mod client;
mod protocol;

pub use client::{
    connect, read_frame, spawn_reader, write_frame, ChannelClient, ChannelError, MAX_FRAME_LEN,
};
pub use protocol::{
    decode_server_message, ClientMessage, ServerMessage, ACTION_UPDATE, ACTIVATE_LISTENING, ERROR,
    PROCESS_COMMAND,
};
