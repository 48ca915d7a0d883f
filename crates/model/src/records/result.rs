use crate::records::message::OutboundMessage;

/// Output of one transform invocation for one input record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformResult {
    pub messages: Vec<OutboundMessage>,
    pub checkpoint: i64,
}

impl TransformResult {
    pub fn new(messages: Vec<OutboundMessage>, checkpoint: i64) -> Self {
        TransformResult {
            messages,
            checkpoint,
        }
    }

    /// A result with no output; its checkpoint is immediately retirable.
    pub fn empty(checkpoint: i64) -> Self {
        Self::new(Vec::new(), checkpoint)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
