//! Peer-to-peer networking
//!
//! The wire protocol (two message kinds in a JSON envelope), the peer group,
//! the TCP transport, the sync coordinator that turns local events into
//! broadcasts, and the inbound server that handles what peers send.

pub mod message;
pub mod peers;
pub mod server;
pub mod sync;
pub mod transport;

pub use message::{Envelope, Message, MessageType};
pub use peers::{Peer, Peers};
pub use server::{BlockOutcome, Server};
pub use sync::{SyncCoordinator, SyncEvent};
pub use transport::{BroadcastReport, GroupBroadcast, TcpTransport};
