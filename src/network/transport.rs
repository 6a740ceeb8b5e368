use crate::error::{BlockchainError, Result};
use crate::network::{Envelope, Message, Peers};
use log::{info, warn};
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;

const TCP_WRITE_TIMEOUT: u64 = 5000;

/// Outcome of one group broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

/// Best-effort send of a message to every peer in the group.
///
/// Implementations return an error only when nobody in a non-empty group
/// could be reached; partial delivery is a normal outcome.
pub trait GroupBroadcast: Send + Sync {
    fn broadcast(&self, message: &Message) -> Result<BroadcastReport>;
}

/// JSON over short-lived TCP connections, one envelope per connection.
pub struct TcpTransport {
    node_addr: String,
    peers: Arc<Peers>,
}

impl TcpTransport {
    pub fn new(node_addr: String, peers: Arc<Peers>) -> TcpTransport {
        TcpTransport { node_addr, peers }
    }

    pub fn get_peers(&self) -> &Arc<Peers> {
        &self.peers
    }

    /// Send one message to a single address.
    pub fn send_to(&self, addr: &str, message: &Message) -> Result<()> {
        let socket_addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?;
        let envelope = Envelope {
            addr_from: self.node_addr.clone(),
            message: message.clone(),
        };
        send_data(socket_addr, &envelope)
    }
}

impl GroupBroadcast for TcpTransport {
    fn broadcast(&self, message: &Message) -> Result<BroadcastReport> {
        let mut report = BroadcastReport::default();
        for peer in self.peers.get_peers() {
            let addr = peer.get_addr().to_string();
            match self.send_to(&addr, message) {
                Ok(()) => report.delivered.push(addr),
                Err(e) => {
                    warn!("Failed to send {:?} to {addr}: {e}", message.message_type);
                    report.failed.push(addr);
                }
            }
        }

        if report.delivered.is_empty() && !report.failed.is_empty() {
            return Err(BlockchainError::Network(format!(
                "{:?} reached none of {} peers",
                message.message_type,
                report.failed.len()
            )));
        }
        Ok(report)
    }
}

fn send_data(addr: SocketAddr, envelope: &Envelope) -> Result<()> {
    info!("Sending {:?} to {addr}", envelope.message.message_type);

    let mut stream = TcpStream::connect_timeout(&addr, Duration::from_millis(TCP_WRITE_TIMEOUT))
        .map_err(|e| BlockchainError::Network(format!("Failed to connect to {addr}: {e}")))?;

    stream
        .set_write_timeout(Some(Duration::from_millis(TCP_WRITE_TIMEOUT)))
        .map_err(|e| BlockchainError::Network(format!("Failed to set write timeout: {e}")))?;

    serde_json::to_writer(&stream, envelope)
        .map_err(|e| BlockchainError::Network(format!("Failed to send data: {e}")))?;

    stream
        .flush()
        .map_err(|e| BlockchainError::Network(format!("Failed to flush data: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MessageType;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_empty_group_is_not_an_error() {
        let transport = TcpTransport::new("127.0.0.1:2001".to_string(), Arc::new(Peers::new()));
        let report = transport
            .broadcast(&Message::fetch_next_block(1).unwrap())
            .unwrap();
        assert_eq!(report, BroadcastReport::default());
    }

    #[test]
    fn test_unreachable_group_is_a_transport_failure() {
        // bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let peers = Arc::new(Peers::from_addrs([format!("127.0.0.1:{port}")]));
        let transport = TcpTransport::new("127.0.0.1:2001".to_string(), peers);
        let result = transport.broadcast(&Message::fetch_next_block(1).unwrap());
        assert!(matches!(result, Err(BlockchainError::Network(_))));
    }

    #[test]
    fn test_partial_delivery_is_success() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let live = listener.local_addr().unwrap().to_string();
        let dead_port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();

        let reader = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).unwrap();
            serde_json::from_str::<Envelope>(&buf).unwrap()
        });

        let peers = Arc::new(Peers::from_addrs([live.clone(), format!("127.0.0.1:{dead_port}")]));
        let transport = TcpTransport::new("127.0.0.1:2001".to_string(), peers);
        let report = transport
            .broadcast(&Message::fetch_next_block(5).unwrap())
            .unwrap();

        assert_eq!(report.delivered, vec![live]);
        assert_eq!(report.failed.len(), 1);

        let envelope = reader.join().unwrap();
        assert_eq!(envelope.addr_from, "127.0.0.1:2001");
        assert_eq!(envelope.message.message_type, MessageType::FetchNextBlock);
        assert_eq!(envelope.message.decode_index().unwrap(), 5);
    }
}
