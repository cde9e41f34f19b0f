//! # bitconv
//!
//! Typed, extensible conversion between values and bit-level binary layouts.
//!
//! Layouts are declared, not hand-packed: each use of a type carries layout
//! descriptors (bit offset, width, byte order, fixed record size) and a
//! [ConverterService] asks its registered providers for a converter honoring
//! them. Offsets fall anywhere inside a byte and widths need not be multiples
//! of 8. Bit 0 is the most significant bit of the first byte.
//!
//! Converters for records are composed from the converters of their members,
//! which are resolved through the same service, so providers for new kinds
//! plug in without touching existing ones. Resolutions are cached per
//! type-use and revalidated whenever the provider set changes.
//!
//! ## Example
//!
//! ```
//! use bitconv::{DescriptorSet, RecordProvider, RecordSchema, ConverterService};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct CommandHeader {
//!     current_node: u8,
//!     checksum: u8,
//!     message_size: u8,
//!     operation: u8,
//! }
//!
//! let schema = RecordSchema::<CommandHeader>::new()
//!     .default_constructor()
//!     .field("current_node", DescriptorSet::at(0), |r| &r.current_node, |r| &mut r.current_node)
//!     .field("checksum", DescriptorSet::at(8), |r| &r.checksum, |r| &mut r.checksum)
//!     .field("message_size", DescriptorSet::at(16), |r| &r.message_size, |r| &mut r.message_size)
//!     .field("operation", DescriptorSet::at(24), |r| &r.operation, |r| &mut r.operation);
//!
//! let service = ConverterService::with_primitives();
//! service.register(RecordProvider::new().record(schema));
//!
//! let converter = service.converter::<CommandHeader>().unwrap();
//! let header = CommandHeader { current_node: 1, checksum: 0x5A, message_size: 12, operation: 3 };
//!
//! let bytes = converter.encode_bytes(&header).unwrap();
//! assert_eq!(bytes, vec![1, 0x5A, 12, 3]);
//! assert_eq!(converter.decode_bytes(&bytes).unwrap(), header);
//! ```

pub mod bits;
pub mod converter;
pub mod descriptor;
pub mod errors;
pub mod primitive;
pub mod provider;
pub mod record;
pub mod service;

#[cfg(feature = "serde")]
pub mod serde;

pub use bits::BitBuffer;
pub use converter::{AnyConverter, Converter, TypeKey, TypeUse};
pub use descriptor::{ByteOrder, Descriptor, DescriptorKind, DescriptorSet};
pub use errors::{CodecError, RecordError};
pub use primitive::{BooleanProvider, IntegerProvider};
pub use provider::{ConverterProvider, ProviderId};
pub use record::{RecordProvider, RecordSchema};
pub use service::ConverterService;
