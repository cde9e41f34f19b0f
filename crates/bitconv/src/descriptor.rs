//! Layout descriptors: named, per-member or per-type values that shape how a
//! converter is built (offset, width, byte order, fixed size, record marker).

use std::collections::BTreeMap;

/// Byte order of multi-byte numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// The kind of a [Descriptor]; providers negotiate over kinds, not values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DescriptorKind {
    Offset,
    Width,
    Order,
    FixedBytes,
    Record,
    /// Provider-defined descriptor, identified by name.
    Custom(&'static str),
}

/// A single layout descriptor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// Bit position within the enclosing buffer.
    Offset(usize),
    /// Bit width of the encoded field.
    Width(usize),
    Order(ByteOrder),
    /// Total record size in bytes; encodings are padded or truncated to it.
    FixedBytes(usize),
    /// Marks a type as a structured record.
    Record,
    Custom(&'static str, i64),
}

impl Descriptor {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Descriptor::Offset(_) => DescriptorKind::Offset,
            Descriptor::Width(_) => DescriptorKind::Width,
            Descriptor::Order(_) => DescriptorKind::Order,
            Descriptor::FixedBytes(_) => DescriptorKind::FixedBytes,
            Descriptor::Record => DescriptorKind::Record,
            Descriptor::Custom(name, _) => DescriptorKind::Custom(name),
        }
    }
}

/// At most one descriptor per kind. Hashable, so a set can key converter caches.
///
/// ```
/// use bitconv::descriptor::{ByteOrder, DescriptorKind, DescriptorSet};
///
/// let member = DescriptorSet::at(12).width(4);
/// let declared = DescriptorSet::new().width(8).order(ByteOrder::LittleEndian);
/// let merged = member.merged_over(&declared);
///
/// assert_eq!(merged.width_bits(), Some(4));
/// assert_eq!(merged.byte_order(), Some(ByteOrder::LittleEndian));
/// assert!(merged.contains(DescriptorKind::Offset));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorSet {
    entries: BTreeMap<DescriptorKind, Descriptor>,
}

impl DescriptorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only an offset; the usual starting point for a member layout.
    pub fn at(offset: usize) -> Self {
        Self::new().offset(offset)
    }

    /// Adds `descriptor`, replacing any previous descriptor of the same kind.
    pub fn with(mut self, descriptor: Descriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn offset(self, bits: usize) -> Self {
        self.with(Descriptor::Offset(bits))
    }

    pub fn width(self, bits: usize) -> Self {
        self.with(Descriptor::Width(bits))
    }

    pub fn order(self, order: ByteOrder) -> Self {
        self.with(Descriptor::Order(order))
    }

    pub fn fixed_bytes(self, bytes: usize) -> Self {
        self.with(Descriptor::FixedBytes(bytes))
    }

    pub fn record(self) -> Self {
        self.with(Descriptor::Record)
    }

    pub fn custom(self, name: &'static str, value: i64) -> Self {
        self.with(Descriptor::Custom(name, value))
    }

    pub fn insert(&mut self, descriptor: Descriptor) -> Option<Descriptor> {
        self.entries.insert(descriptor.kind(), descriptor)
    }

    /// Derives a set without the descriptor of the given kind.
    pub fn without(&self, kind: DescriptorKind) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(&kind);
        DescriptorSet { entries }
    }

    /// Combines the receiver with the descriptors declared on the type itself.
    /// Where both define a kind, the receiver wins.
    pub fn merged_over(&self, declared: &DescriptorSet) -> Self {
        let mut entries = declared.entries.clone();
        entries.extend(self.entries.iter().map(|(kind, d)| (*kind, *d)));
        DescriptorSet { entries }
    }

    pub fn get(&self, kind: DescriptorKind) -> Option<&Descriptor> {
        self.entries.get(&kind)
    }

    pub fn contains(&self, kind: DescriptorKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = DescriptorKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The member offset in bits, 0 when absent.
    pub fn offset_bits(&self) -> usize {
        match self.get(DescriptorKind::Offset) {
            Some(Descriptor::Offset(bits)) => *bits,
            _ => 0,
        }
    }

    pub fn width_bits(&self) -> Option<usize> {
        match self.get(DescriptorKind::Width) {
            Some(Descriptor::Width(bits)) => Some(*bits),
            _ => None,
        }
    }

    pub fn byte_order(&self) -> Option<ByteOrder> {
        match self.get(DescriptorKind::Order) {
            Some(Descriptor::Order(order)) => Some(*order),
            _ => None,
        }
    }

    pub fn fixed_bytes_len(&self) -> Option<usize> {
        match self.get(DescriptorKind::FixedBytes) {
            Some(Descriptor::FixedBytes(bytes)) => Some(*bytes),
            _ => None,
        }
    }

    pub fn is_record(&self) -> bool {
        self.contains(DescriptorKind::Record)
    }

    pub fn custom_value(&self, name: &'static str) -> Option<i64> {
        match self.get(DescriptorKind::Custom(name)) {
            Some(Descriptor::Custom(_, value)) => Some(*value),
            _ => None,
        }
    }
}

impl FromIterator<Descriptor> for DescriptorSet {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        let mut set = DescriptorSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Descriptor> for DescriptorSet {
    fn extend<I: IntoIterator<Item = Descriptor>>(&mut self, iter: I) {
        for descriptor in iter {
            self.insert(descriptor);
        }
    }
}
