use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub key: String,
    pub value: Vec<u8>,
}

/// A message ready to be handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub topic: String,
    /// Only honoured by the broker when the manual partitioner is configured.
    pub partition: i32,
    pub headers: Vec<MessageHeader>,
}

impl OutboundMessage {
    /// A keyless message carrying `value` on `topic`.
    pub fn text(value: impl Into<Vec<u8>>, topic: impl Into<String>) -> Self {
        OutboundMessage {
            value: Some(value.into()),
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.key == key)
            .map(|h| h.value.as_slice())
    }

    pub fn size_bytes(&self) -> usize {
        self.key.as_ref().map_or(0, Vec::len)
            + self.value.as_ref().map_or(0, Vec::len)
            + self
                .headers
                .iter()
                .map(|h| h.key.len() + h.value.len())
                .sum::<usize>()
    }
}
