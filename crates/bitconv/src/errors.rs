//! Error types for bit buffers, converter resolution and record conversion.

use thiserror::Error;

/// Errors produced while resolving converters or converting values to and from bits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Requested bit range is beyond the end of the buffer.
    #[error("bit range {offset}+{length} is outside a buffer of {len} bits")]
    BitRange {
        offset: usize,
        length: usize,
        len: usize,
    },
    /// More bits were requested than a single numeric conversion can carry.
    #[error("width of {width} bits exceeds the {max}-bit limit")]
    WidthTooLarge { width: usize, max: usize },
    /// No registered provider produced a converter for the type.
    #[error("no converter found for `{type_name}`")]
    NoConverterFound { type_name: &'static str },
    /// A typed lookup went through a type-use describing another type.
    #[error("converter for `{found}` requested as `{expected}`")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    RecordConstruction(#[from] RecordError),
}

/// Failures specific to composite record converters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The schema was registered without a way to create an empty record.
    #[error("record `{record}` has no constructor")]
    MissingConstructor { record: &'static str },
    /// Resolving, encoding or decoding one member failed.
    #[error("member `{member}` of record `{record}`: {source}")]
    Member {
        record: &'static str,
        member: &'static str,
        #[source]
        source: Box<CodecError>,
    },
    /// Two members encoded into the same bits.
    #[error("member `{member}` of record `{record}` overlaps bits {start}..{end}")]
    Overlap {
        record: &'static str,
        member: &'static str,
        start: usize,
        end: usize,
    },
    /// A layout definition names a member the schema does not declare.
    #[error("record `{record}` has no member named `{member}`")]
    UnknownMember { record: &'static str, member: String },
}

impl RecordError {
    pub(crate) fn member(record: &'static str, member: &'static str, source: CodecError) -> Self {
        RecordError::Member {
            record,
            member,
            source: Box::new(source),
        }
    }
}
