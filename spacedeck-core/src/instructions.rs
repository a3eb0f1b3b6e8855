//! Inbound instructions from the coordinator

use alloc::string::String;
use heapless::Deque;

/// Queue depth; the oldest entry is dropped beyond this
pub const INSTRUCTION_QUEUE_DEPTH: usize = 64;

/// Something the coordinator wants shown on the console
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Persistent display text
    Display { text: String },
    /// Transient status text
    Status { text: String },
    /// Progress value, 0-100 or a fraction
    Progress { value: f32 },
}

/// Bounded FIFO of pending instructions
///
/// The producer never blocks: pushing onto a full queue evicts the oldest
/// entry and counts it.
#[derive(Debug, Default)]
pub struct InstructionQueue {
    items: Deque<Instruction, INSTRUCTION_QUEUE_DEPTH>,
    dropped: u64,
}

impl InstructionQueue {
    pub fn new() -> Self {
        Self {
            items: Deque::new(),
            dropped: 0,
        }
    }

    /// Append an instruction, returning the one evicted to make room
    pub fn push(&mut self, instruction: Instruction) -> Option<Instruction> {
        let evicted = if self.items.is_full() {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        // Cannot fail: a slot was just freed if the queue was full
        let _ = self.items.push_back(instruction);
        evicted
    }

    /// Take the oldest instruction
    pub fn pop(&mut self) -> Option<Instruction> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Instructions evicted since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(n: usize) -> Instruction {
        Instruction::Status {
            text: std::format!("{}", n),
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = InstructionQueue::new();
        queue.push(status(1));
        queue.push(Instruction::Progress { value: 50.0 });

        assert_eq!(queue.pop(), Some(status(1)));
        assert_eq!(queue.pop(), Some(Instruction::Progress { value: 50.0 }));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let mut queue = InstructionQueue::new();
        for n in 0..INSTRUCTION_QUEUE_DEPTH {
            assert_eq!(queue.push(status(n)), None);
        }

        assert_eq!(queue.push(status(100)), Some(status(0)));
        assert_eq!(queue.push(status(101)), Some(status(1)));
        assert_eq!(queue.len(), INSTRUCTION_QUEUE_DEPTH);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.pop(), Some(status(2)));
    }
}
