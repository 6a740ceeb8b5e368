use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::{deserialize, serialize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    /// Body: the bincode-encoded block
    NewBlock,
    /// Body: the bincode-encoded index being requested
    FetchNextBlock,
}

/// One protocol message. Built per broadcast and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message_type: MessageType,
    pub body: Vec<u8>,
}

impl Message {
    pub fn new_block(block: &Block) -> Result<Message> {
        Ok(Message {
            message_type: MessageType::NewBlock,
            body: block.serialize()?,
        })
    }

    pub fn fetch_next_block(index: u64) -> Result<Message> {
        Ok(Message {
            message_type: MessageType::FetchNextBlock,
            body: serialize(&index)?,
        })
    }

    pub fn decode_block(&self) -> Result<Block> {
        self.expect(MessageType::NewBlock)?;
        Block::deserialize(&self.body)
    }

    pub fn decode_index(&self) -> Result<u64> {
        self.expect(MessageType::FetchNextBlock)?;
        deserialize(&self.body)
    }

    fn expect(&self, message_type: MessageType) -> Result<()> {
        if self.message_type != message_type {
            return Err(BlockchainError::Serialization(format!(
                "Expected a {message_type:?} message, got {:?}",
                self.message_type
            )));
        }
        Ok(())
    }
}

/// What actually travels over a connection: the message plus the sender's
/// listen address so the receiver can answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub addr_from: String,
    pub message: Message,
}
