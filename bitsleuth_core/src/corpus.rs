use crate::message::{Message, MessageError, bits_to_value};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Defines errors that can arise while loading or saving a message corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The requested message index is not in the corpus.
    #[error("Message {0} not found in corpus")]
    MessageNotFound(usize),

    /// Reading or writing the corpus file failed.
    #[error("Corpus I/O error: {0}")]
    Io(String),

    /// A line of a text corpus could not be parsed.
    #[error("Line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: MessageError,
    },

    /// A JSON corpus could not be read or written.
    #[error("Corpus JSON error: {0}")]
    Json(String),

    #[error("Unknown corpus format '{0}' (expected bits, hex or json)")]
    UnknownFormat(String),

    /// Hex output needs every message to be a whole number of nibbles.
    #[error("Message {0} cannot be written as hex: length is not a multiple of 4")]
    NotNibbleAligned(usize),
}

impl From<std::io::Error> for CorpusError {
    fn from(err: std::io::Error) -> Self {
        CorpusError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CorpusError {
    fn from(err: serde_json::Error) -> Self {
        CorpusError::Json(err.to_string())
    }
}

/// On-disk layout of a corpus.
///
/// Text formats hold one message per line with an optional `participant:`
/// prefix; blank lines and lines starting with `#` are skipped.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CorpusFormat {
    #[default]
    Bits,
    /// Hex digits, four bits each, optional `0x` prefix.
    Hex,
    /// A JSON array of `{"bits": "...", "participant": "..."}` objects.
    Json,
}

impl FromStr for CorpusFormat {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bits" => Ok(CorpusFormat::Bits),
            "hex" => Ok(CorpusFormat::Hex),
            "json" => Ok(CorpusFormat::Json),
            _ => Err(CorpusError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct JsonMessage {
    bits: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    participant: Option<String>,
}

/// The captured messages of one session, indexed by position.
#[derive(Debug, Clone, Default)]
pub struct MessageCorpus {
    messages: Vec<Message>,
}

impl MessageCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a message and returns its index.
    pub fn add(&mut self, message: Message) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn get(&self, index: usize) -> Result<&Message, CorpusError> {
        self.messages
            .get(index)
            .ok_or(CorpusError::MessageNotFound(index))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Parses a whole corpus held in memory.
    ///
    /// Errors carry the 1-based line (or array position for JSON) of the bad message.
    pub fn parse_str(content: &str, format: CorpusFormat) -> Result<Self, CorpusError> {
        let messages = match format {
            CorpusFormat::Json => {
                let entries: Vec<JsonMessage> = serde_json::from_str(content)?;
                entries
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        Message::from_bit_str(&entry.bits, entry.participant)
                            .map_err(|source| CorpusError::Parse { line: i + 1, source })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            CorpusFormat::Bits | CorpusFormat::Hex => {
                let mut messages = Vec::new();
                for (i, raw) in content.lines().enumerate() {
                    let line = raw.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    let (participant, payload) = match line.split_once(':') {
                        Some((name, payload)) => (Some(name.trim().to_string()), payload),
                        None => (None, line),
                    };
                    let message = if format == CorpusFormat::Hex {
                        Message::from_hex_str(payload, participant)
                    } else {
                        Message::from_bit_str(payload, participant)
                    };
                    messages.push(
                        message.map_err(|source| CorpusError::Parse { line: i + 1, source })?,
                    );
                }
                messages
            }
        };
        Ok(Self { messages })
    }

    pub fn load_from_file(path: &Path, format: CorpusFormat) -> Result<Self, CorpusError> {
        let content = std::fs::read_to_string(path)?;
        let corpus = Self::parse_str(&content, format)?;
        debug!(path = ?path, messages = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    /// Renders the corpus in `format`.
    pub fn to_string_as(&self, format: CorpusFormat) -> Result<String, CorpusError> {
        if format == CorpusFormat::Json {
            let entries: Vec<JsonMessage> = self
                .messages
                .iter()
                .map(|msg| JsonMessage {
                    bits: msg.to_bit_string(),
                    participant: msg.participant().map(str::to_string),
                })
                .collect();
            return Ok(serde_json::to_string_pretty(&entries)?);
        }
        let mut out = String::new();
        for (i, msg) in self.messages.iter().enumerate() {
            let payload = match format {
                CorpusFormat::Hex => {
                    to_hex(msg.decoded_bits()).ok_or(CorpusError::NotNibbleAligned(i))?
                }
                _ => msg.to_bit_string(),
            };
            let line = match msg.participant() {
                Some(name) => format!("{name}:{payload}\n"),
                None => format!("{payload}\n"),
            };
            out.push_str(&line);
        }
        Ok(out)
    }

    /// Writes the corpus in `format`, replacing any existing file.
    pub fn save_to_file(&self, path: &Path, format: CorpusFormat) -> Result<(), CorpusError> {
        std::fs::write(path, self.to_string_as(format)?)?;
        Ok(())
    }
}

fn to_hex(bits: &[u8]) -> Option<String> {
    if bits.len() % 4 != 0 {
        return None;
    }
    bits.chunks(4)
        .map(|nibble| std::char::from_digit(bits_to_value(nibble) as u32, 16))
        .collect()
}

impl FromIterator<Message> for MessageCorpus {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bit_lines_with_participants_and_comments() {
        let corpus = MessageCorpus::parse_str(
            "# capture 1\nalice: 1010 1010\n\n0011\nbob:11110000\n",
            CorpusFormat::Bits,
        )
        .unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.get(0).unwrap().participant(), Some("alice"));
        assert_eq!(corpus.get(0).unwrap().to_bit_string(), "10101010");
        assert_eq!(corpus.get(1).unwrap().participant(), None);
        assert_eq!(corpus.get(2).unwrap().len(), 8);
        assert!(matches!(corpus.get(3), Err(CorpusError::MessageNotFound(3))));
    }

    #[test]
    fn parses_hex_lines() {
        let corpus = MessageCorpus::parse_str("0xaa9a\nremote:ff", CorpusFormat::Hex).unwrap();
        assert_eq!(corpus.get(0).unwrap().to_bit_string(), "1010101010011010");
        assert_eq!(corpus.get(1).unwrap().participant(), Some("remote"));
    }

    #[test]
    fn reports_line_of_bad_message() {
        let err = MessageCorpus::parse_str("1010\n10z0\n", CorpusFormat::Bits).unwrap_err();
        assert!(matches!(err, CorpusError::Parse { line: 2, .. }));
    }

    #[test]
    fn parses_json_array() {
        let corpus = MessageCorpus::parse_str(
            r#"[{"bits": "1100", "participant": "a"}, {"bits": "0011"}]"#,
            CorpusFormat::Json,
        )
        .unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.get(1).unwrap().participant(), None);
        assert!(MessageCorpus::parse_str("{", CorpusFormat::Json).is_err());
    }

    #[test]
    fn json_entries_are_validated_like_text() {
        let err = MessageCorpus::parse_str(
            r#"[{"bits": "1010"}, {"bits": "1020"}]"#,
            CorpusFormat::Json,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CorpusError::Parse {
                line: 2,
                source: MessageError::InvalidBit {
                    character: '2',
                    position: 2
                }
            }
        ));
    }

    #[test]
    fn text_output_is_one_line_per_message() {
        let corpus: MessageCorpus = vec![
            Message::from_bit_str("1010", Some("a".to_string())).unwrap(),
            Message::from_bit_str("0110", None).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            corpus.to_string_as(CorpusFormat::Bits).unwrap(),
            "a:1010\n0110\n"
        );
        assert_eq!(corpus.to_string_as(CorpusFormat::Hex).unwrap(), "a:a\n6\n");
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("HEX".parse::<CorpusFormat>().unwrap(), CorpusFormat::Hex);
        assert!(matches!(
            "csv".parse::<CorpusFormat>(),
            Err(CorpusError::UnknownFormat(_))
        ));
    }

    #[test]
    fn save_and_load_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let corpus: MessageCorpus = vec![
            Message::from_bit_str("1010", Some("a".to_string())).unwrap(),
            Message::from_bit_str("0110", None).unwrap(),
        ]
        .into_iter()
        .collect();

        for format in [CorpusFormat::Bits, CorpusFormat::Hex, CorpusFormat::Json] {
            let path = dir.path().join("corpus.out");
            corpus.save_to_file(&path, format).unwrap();
            let loaded = MessageCorpus::load_from_file(&path, format).unwrap();
            assert_eq!(loaded.messages(), corpus.messages());
        }

        let missing = MessageCorpus::load_from_file(&dir.path().join("nope"), CorpusFormat::Bits);
        assert!(matches!(missing, Err(CorpusError::Io(_))));
    }

    #[test]
    fn hex_output_needs_whole_nibbles() {
        let corpus: MessageCorpus = vec![Message::from_bit_str("101", None).unwrap()]
            .into_iter()
            .collect();
        assert!(matches!(
            corpus.to_string_as(CorpusFormat::Hex),
            Err(CorpusError::NotNibbleAligned(0))
        ));
        let aligned: MessageCorpus = vec![Message::from_hex_str("c0de", None).unwrap()]
            .into_iter()
            .collect();
        assert_eq!(aligned.to_string_as(CorpusFormat::Hex).unwrap(), "c0de\n");
    }

    #[test]
    fn add_returns_index() {
        let mut corpus = MessageCorpus::new();
        assert!(corpus.is_empty());
        assert_eq!(corpus.add(Message::new(vec![1], None)), 0);
        assert_eq!(corpus.add(Message::new(vec![0], None)), 1);
        assert_eq!(corpus.into_messages().len(), 2);
    }
}
