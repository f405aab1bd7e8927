//! Synthetic captures with a known field layout.

use crate::message::Message;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::collections::BTreeMap;

/// One field of a generated message, in transmission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Alternating `1010…` bits.
    Preamble { length: usize },
    /// A fixed sync word.
    Sync { bits: Vec<u8> },
    /// Number of whole bytes following this field.
    Length { length: usize },
    /// The sender's address, truncated to `length` low bits.
    Address { length: usize },
    /// Counter incremented for every generated message.
    SequenceNumber { length: usize },
}

/// Ordered field layout of one message type. Random payload follows the fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTypeSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl MessageTypeSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Bits taken by the fields alone.
    pub fn header_bits(&self) -> usize {
        self.fields
            .iter()
            .map(|field| match field {
                FieldSpec::Preamble { length }
                | FieldSpec::Length { length }
                | FieldSpec::Address { length }
                | FieldSpec::SequenceNumber { length } => *length,
                FieldSpec::Sync { bits } => bits.len(),
            })
            .sum()
    }
}

/// Deterministic message generator seeded with a fixed value.
#[derive(Debug)]
pub struct ProtocolGenerator {
    rng: ChaCha8Rng,
    participants: BTreeMap<String, u64>,
    sequence_number: u64,
    messages: Vec<Message>,
}

impl ProtocolGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            participants: BTreeMap::new(),
            sequence_number: 0,
            messages: Vec::new(),
        }
    }

    /// Registers a sender and the address it puts in `Address` fields.
    pub fn with_participant(mut self, name: &str, address: u64) -> Self {
        self.participants.insert(name.to_string(), address);
        self
    }

    /// Builds a message of `spec` with `data_bits` random payload bits and appends it.
    pub fn generate_message(
        &mut self,
        spec: &MessageTypeSpec,
        data_bits: usize,
        participant: Option<&str>,
    ) -> &Message {
        let total = spec.header_bits() + data_bits;
        let address = participant
            .and_then(|name| self.participants.get(name))
            .copied()
            .unwrap_or(0);
        let mut bits = Vec::with_capacity(total);
        for field in &spec.fields {
            match field {
                FieldSpec::Preamble { length } => {
                    bits.extend((0..*length).map(|i| u8::from(i % 2 == 0)));
                }
                FieldSpec::Sync { bits: sync } => bits.extend_from_slice(sync),
                FieldSpec::Length { length } => {
                    let following = (total - bits.len() - length) / 8;
                    push_value(&mut bits, following as u64, *length);
                }
                FieldSpec::Address { length } => push_value(&mut bits, address, *length),
                FieldSpec::SequenceNumber { length } => {
                    push_value(&mut bits, self.sequence_number, *length)
                }
            }
        }
        bits.extend((0..data_bits).map(|_| u8::from(self.rng.random::<bool>())));
        self.sequence_number += 1;

        self.messages
            .push(Message::new(bits, participant.map(str::to_string)));
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

/// Appends the `width` low bits of `value`, MSB first.
fn push_value(bits: &mut Vec<u8>, value: u64, width: usize) {
    bits.extend((0..width).rev().map(|shift| {
        if shift >= 64 {
            0
        } else {
            ((value >> shift) & 1) as u8
        }
    }));
}
