//! The framed wire format and message payload codecs.

pub mod frame;
pub mod messages;
pub mod netaddress;

pub use frame::{encode_frame, read_frame, write_frame, FRAME_HEADER_SIZE};
pub use messages::{cmd, Message, VersionPayload};
pub use netaddress::{NetAddress, NETADDRESS_SIZE};
