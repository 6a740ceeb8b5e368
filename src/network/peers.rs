use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    addr: String,
}

impl Peer {
    fn new(addr: String) -> Peer {
        Peer { addr }
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }
}

/// The current peer group.
pub struct Peers {
    inner: RwLock<Vec<Peer>>,
}

impl Default for Peers {
    fn default() -> Self {
        Self::new()
    }
}

impl Peers {
    pub fn new() -> Peers {
        Peers {
            inner: RwLock::new(vec![]),
        }
    }

    pub fn from_addrs<I, S>(addrs: I) -> Peers
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let peers = Peers::new();
        for addr in addrs {
            peers.add_peer(addr.into());
        }
        peers
    }

    pub fn add_peer(&self, addr: String) {
        match self.inner.write() {
            Ok(mut inner) => {
                if !inner.iter().any(|x| x.get_addr() == addr) {
                    inner.push(Peer::new(addr));
                }
            }
            Err(_) => log::error!("Failed to acquire write lock on peers"),
        }
    }

    pub fn get_peers(&self) -> Vec<Peer> {
        match self.inner.read() {
            Ok(inner) => inner.to_vec(),
            Err(_) => {
                log::error!("Failed to acquire read lock on peers");
                vec![]
            }
        }
    }

    pub fn len(&self) -> usize {
        self.get_peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
