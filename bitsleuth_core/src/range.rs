//! Candidate field ranges and the message-type containers that group them.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Semantic tag attached to a candidate field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Alternating bits used for clock recovery.
    Preamble,
    /// Fixed word marking the start of the frame.
    Sync,
    /// Value that tracks the message length.
    Length,
    /// Value identifying the sender.
    Address,
    /// Counter incremented per message.
    SequenceNumber,
    /// Integrity check over other fields.
    Checksum,
    /// Any other tag, kept by name.
    Custom(String),
}

impl FieldType {
    /// Display name, also used as the serialized form.
    pub fn name(&self) -> &str {
        match self {
            FieldType::Preamble => "Preamble",
            FieldType::Sync => "Sync",
            FieldType::Length => "Length",
            FieldType::Address => "Address",
            FieldType::SequenceNumber => "Sequence Number",
            FieldType::Checksum => "Checksum",
            FieldType::Custom(name) => name,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<String> for FieldType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "Preamble" => FieldType::Preamble,
            "Sync" => FieldType::Sync,
            "Length" => FieldType::Length,
            "Address" => FieldType::Address,
            "Sequence Number" => FieldType::SequenceNumber,
            "Checksum" => FieldType::Checksum,
            _ => FieldType::Custom(name),
        }
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.name().to_string()
    }
}

/// A contiguous bit region proposed as a field, with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonBitRange {
    pub start: usize,
    pub length: usize,
    pub field_type: FieldType,
    pub score: f64,
    /// Observed bit patterns of this range across the contributing messages.
    #[serde(skip)]
    pub values: Vec<Vec<u8>>,
    pub message_indices: BTreeSet<usize>,
}

impl CommonBitRange {
    pub fn new(start: usize, length: usize, field_type: FieldType) -> Self {
        Self {
            start,
            length,
            field_type,
            score: 0.0,
            values: Vec::new(),
            message_indices: BTreeSet::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_message_indices<T: IntoIterator<Item = usize>>(mut self, indices: T) -> Self {
        self.message_indices = indices.into_iter().collect();
        self
    }

    pub fn with_values(mut self, values: Vec<Vec<u8>>) -> Self {
        self.values = values;
        self
    }

    /// Exclusive end offset.
    pub fn end(&self) -> usize {
        self.start + self.length
    }

    /// Merge identity: two ranges describe the same bits.
    pub fn same_position(&self, other: &CommonBitRange) -> bool {
        self.start == other.start && self.length == other.length
    }

    /// Label identity: same bits and same semantic tag.
    pub fn same_label(&self, other: &CommonBitRange) -> bool {
        self.same_position(other) && self.field_type == other.field_type
    }

    /// True when the half-open intervals `[start, end)` intersect.
    ///
    /// A zero-length range never overlaps anything.
    pub fn overlaps_with(&self, other: &CommonBitRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Returns a copy moved `offset` bits to the right.
    pub fn shifted(&self, offset: usize) -> Self {
        Self {
            start: self.start + offset,
            ..self.clone()
        }
    }

    /// Container order: by start, then length, then field type name.
    pub fn sort_cmp(&self, other: &CommonBitRange) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.length.cmp(&other.length))
            .then_with(|| self.field_type.name().cmp(other.field_type.name()))
    }
}

impl fmt::Display for CommonBitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}-{} ({:.2})",
            self.field_type,
            self.start,
            self.end(),
            self.score
        )
    }
}

/// Marks that no field of `field_type` exists for the given messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyRange {
    pub field_type: FieldType,
    pub message_indices: BTreeSet<usize>,
}

impl EmptyRange {
    pub fn new<T: IntoIterator<Item = usize>>(field_type: FieldType, indices: T) -> Self {
        Self {
            field_type,
            message_indices: indices.into_iter().collect(),
        }
    }
}

/// What an engine reports for a label: a real field or an explicit absence.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateRange {
    /// A field found at a concrete position.
    Real(CommonBitRange),
    /// The engine looked and found no field of this type.
    Empty(EmptyRange),
}

impl CandidateRange {
    pub fn field_type(&self) -> &FieldType {
        match self {
            CandidateRange::Real(rng) => &rng.field_type,
            CandidateRange::Empty(empty) => &empty.field_type,
        }
    }

    pub fn message_indices(&self) -> &BTreeSet<usize> {
        match self {
            CandidateRange::Real(rng) => &rng.message_indices,
            CandidateRange::Empty(empty) => &empty.message_indices,
        }
    }

    pub fn as_real(&self) -> Option<&CommonBitRange> {
        match self {
            CandidateRange::Real(rng) => Some(rng),
            CandidateRange::Empty(_) => None,
        }
    }

    pub fn is_empty_range(&self) -> bool {
        matches!(self, CandidateRange::Empty(_))
    }
}

impl From<CommonBitRange> for CandidateRange {
    fn from(rng: CommonBitRange) -> Self {
        CandidateRange::Real(rng)
    }
}

impl From<EmptyRange> for CandidateRange {
    fn from(empty: EmptyRange) -> Self {
        CandidateRange::Empty(empty)
    }
}

/// One message type: a sorted set of field ranges shared by a set of messages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonRangeContainer {
    ranges: Vec<CommonBitRange>,
    pub message_indices: BTreeSet<usize>,
}

impl CommonRangeContainer {
    pub fn new<T: IntoIterator<Item = usize>>(ranges: Vec<CommonBitRange>, indices: T) -> Self {
        let mut container = Self {
            ranges: Vec::with_capacity(ranges.len()),
            message_indices: indices.into_iter().collect(),
        };
        container.add_ranges(ranges);
        container
    }

    pub fn ranges(&self) -> &[CommonBitRange] {
        &self.ranges
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CommonBitRange> {
        self.ranges.iter()
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Inserts ranges keeping the list sorted; labels already present are skipped.
    pub fn add_ranges<T: IntoIterator<Item = CommonBitRange>>(&mut self, ranges: T) {
        for rng in ranges {
            if self.ranges.iter().any(|existing| existing.same_label(&rng)) {
                continue;
            }
            let pos = self
                .ranges
                .partition_point(|existing| existing.sort_cmp(&rng) != Ordering::Greater);
            self.ranges.insert(pos, rng);
        }
    }

    /// Adds a message to this type and to every range it holds.
    pub fn add_message(&mut self, index: usize) {
        self.message_indices.insert(index);
        for rng in &mut self.ranges {
            rng.message_indices.insert(index);
        }
    }

    /// Copy restricted to a single message with every range moved by `offset` bits.
    ///
    /// The ranges are narrowed too, so each one only claims `index`.
    pub fn narrowed_and_shifted(&self, index: usize, offset: usize) -> Self {
        Self {
            ranges: self
                .ranges
                .iter()
                .map(|rng| rng.shifted(offset).with_message_indices([index]))
                .collect(),
            message_indices: [index].into(),
        }
    }

    /// True when both hold exactly the same labels, ignoring order and evidence.
    pub fn has_same_ranges(&self, ranges: &[CommonBitRange]) -> bool {
        self.ranges.len() == ranges.len()
            && self
                .ranges
                .iter()
                .all(|own| ranges.iter().any(|other| own.same_label(other)))
    }

    /// True when any two ranges of this type overlap.
    pub fn ranges_overlap(&self) -> bool {
        self.ranges
            .iter()
            .enumerate()
            .any(|(i, a)| self.ranges[i + 1..].iter().any(|b| a.overlaps_with(b)))
    }

    pub fn contains_field_type(&self, field_type: &FieldType) -> bool {
        self.ranges.iter().any(|rng| &rng.field_type == field_type)
    }

    /// First range, in container order, tagged with `field_type`.
    pub fn range_of_type(&self, field_type: &FieldType) -> Option<&CommonBitRange> {
        self.ranges.iter().find(|rng| &rng.field_type == field_type)
    }
}

impl<'a> IntoIterator for &'a CommonRangeContainer {
    type Item = &'a CommonBitRange;
    type IntoIter = std::slice::Iter<'a, CommonBitRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}
