use thiserror::Error;

/// Defines errors raised while parsing a message from text.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageError {
    /// A bit string held something other than `0`, `1`, whitespace or `_`.
    #[error("Invalid bit character {character:?} at position {position}")]
    InvalidBit { character: char, position: usize },
    /// A hex string held a non-hex digit.
    #[error("Invalid hex character {character:?} at position {position}")]
    InvalidHex { character: char, position: usize },
}

/// A captured message reduced to its demodulated bits.
///
/// Bits are stored one per byte (`0` or `1`) so slices can be indexed by bit
/// offset directly. The index of a message is its position in the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    bits: Vec<u8>,
    participant: Option<String>,
}

impl Message {
    /// Wraps raw bits; any non-zero byte is masked to its lowest bit.
    pub fn new(bits: Vec<u8>, participant: Option<String>) -> Self {
        let bits = bits.into_iter().map(|b| b & 1).collect();
        Self { bits, participant }
    }

    /// Parses a string of `0`/`1` characters. Whitespace and `_` separators are ignored.
    pub fn from_bit_str(s: &str, participant: Option<String>) -> Result<Self, MessageError> {
        let mut bits = Vec::with_capacity(s.len());
        for (position, character) in s.chars().enumerate() {
            match character {
                '0' => bits.push(0),
                '1' => bits.push(1),
                c if c.is_whitespace() || c == '_' => {}
                character => return Err(MessageError::InvalidBit { character, position }),
            }
        }
        Ok(Self { bits, participant })
    }

    /// Parses hex digits (optional `0x` prefix), four bits per digit, MSB first.
    pub fn from_hex_str(s: &str, participant: Option<String>) -> Result<Self, MessageError> {
        let trimmed = s.trim();
        let (offset, digits) = match trimmed.strip_prefix("0x").or(trimmed.strip_prefix("0X")) {
            Some(rest) => (2, rest),
            None => (0, trimmed),
        };
        let mut bits = Vec::with_capacity(digits.len() * 4);
        for (i, character) in digits.chars().enumerate() {
            if character.is_whitespace() || character == '_' {
                continue;
            }
            let nibble = character.to_digit(16).ok_or(MessageError::InvalidHex {
                character,
                position: i + offset,
            })?;
            bits.extend((0..4).rev().map(|shift| ((nibble >> shift) & 1) as u8));
        }
        Ok(Self { bits, participant })
    }

    pub fn decoded_bits(&self) -> &[u8] {
        &self.bits
    }

    /// Sender of the message, when the capture records one.
    pub fn participant(&self) -> Option<&str> {
        self.participant.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn to_bit_string(&self) -> String {
        bits_to_string(&self.bits)
    }
}

pub fn bits_to_string(bits: &[u8]) -> String {
    bits.iter().map(|&b| if b == 0 { '0' } else { '1' }).collect()
}

/// Interprets `bits` as an unsigned big-endian integer.
pub fn bits_to_value(bits: &[u8]) -> u64 {
    bits.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b & 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bit_strings_with_separators() {
        let msg = Message::from_bit_str("1010 0011_1", Some("alice".to_string())).unwrap();
        assert_eq!(msg.decoded_bits(), &[1, 0, 1, 0, 0, 0, 1, 1, 1]);
        assert_eq!(msg.len(), 9);
        assert!(!msg.is_empty());
        assert_eq!(msg.participant(), Some("alice"));
        assert_eq!(msg.to_bit_string(), "101000111");
    }

    #[test]
    fn rejects_invalid_bit_character() {
        let err = Message::from_bit_str("10x1", None).unwrap_err();
        assert_eq!(
            err,
            MessageError::InvalidBit {
                character: 'x',
                position: 2
            }
        );
    }

    #[test]
    fn parses_hex_strings() {
        let msg = Message::from_hex_str("0xcafe", None).unwrap();
        assert_eq!(msg.to_bit_string(), "1100101011111110");
        let plain = Message::from_hex_str("9A", None).unwrap();
        assert_eq!(plain.to_bit_string(), "10011010");
    }

    #[test]
    fn rejects_invalid_hex_character() {
        let err = Message::from_hex_str("0x1g", None).unwrap_err();
        assert_eq!(
            err,
            MessageError::InvalidHex {
                character: 'g',
                position: 3
            }
        );
    }

    #[test]
    fn new_masks_to_single_bits() {
        let msg = Message::new(vec![0, 1, 2, 3], None);
        assert_eq!(msg.decoded_bits(), &[0, 1, 0, 1]);
        assert!(Message::new(Vec::new(), None).is_empty());
    }

    #[test]
    fn bits_to_value_is_big_endian() {
        assert_eq!(bits_to_value(&[0, 0, 0, 0, 0, 1, 1, 0]), 6);
        assert_eq!(bits_to_value(&[]), 0);
        assert_eq!(bits_to_value(&[1, 1, 1, 1]), 15);
    }
}
