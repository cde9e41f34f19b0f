//! Composite records: structs whose converter is assembled from one converter
//! per member, each placed at a bit offset of the enclosing buffer.
//!
//! A record type is made known through a [RecordSchema] listing its members
//! with their layout descriptors and accessors. Schemas are handed to a
//! [RecordProvider], which declares the record marker (and any fixed size) on
//! the type and builds converters by resolving every member through the
//! [ConverterService].
//!
//! ```
//! use bitconv::{
//!     descriptor::DescriptorSet,
//!     record::{RecordProvider, RecordSchema},
//!     service::ConverterService,
//! };
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct VariableId {
//!     id: u8,
//!     bank: bool,
//!     axis: u8,
//! }
//!
//! let schema = RecordSchema::<VariableId>::new()
//!     .default_constructor()
//!     .fixed_bytes(2)
//!     .field("id", DescriptorSet::at(0), |r| &r.id, |r| &mut r.id)
//!     .field("bank", DescriptorSet::at(12), |r| &r.bank, |r| &mut r.bank)
//!     .field("axis", DescriptorSet::at(13).width(3), |r| &r.axis, |r| &mut r.axis);
//!
//! let service = ConverterService::with_primitives();
//! service.register(RecordProvider::new().record(schema));
//!
//! let converter = service.converter::<VariableId>().unwrap();
//! let value = VariableId { id: 0x24, bank: true, axis: 5 };
//! assert_eq!(converter.encode_bytes(&value).unwrap(), vec![0x24, 0x0D]);
//! assert_eq!(converter.decode_bytes(&[0x24, 0x0D]).unwrap(), value);
//! ```

use std::{any::type_name, collections::HashMap, fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    bits::BitBuffer,
    converter::{AnyConverter, Converter, TypeKey, TypeUse},
    descriptor::{DescriptorKind, DescriptorSet},
    errors::{CodecError, RecordError},
    provider::ConverterProvider,
    service::ConverterService,
};

type BindFn<T> = dyn Fn(&DescriptorSet, &ConverterService) -> Result<FieldConverter<T>, CodecError>
    + Send
    + Sync;

/// A declared member: its name, layout and a way to bind it to a converter.
pub(crate) struct FieldSchema<T> {
    pub(crate) name: &'static str,
    pub(crate) layout: DescriptorSet,
    bind: Arc<BindFn<T>>,
}

/// Member list and type-level descriptors of a record type `T`.
pub struct RecordSchema<T> {
    constructor: Option<fn() -> T>,
    fixed_bytes: Option<usize>,
    pub(crate) fields: Vec<FieldSchema<T>>,
}

impl<T: 'static> Default for RecordSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> RecordSchema<T> {
    /// A schema with no members and no constructor. Records without a
    /// constructor can be encoded but not decoded.
    pub fn new() -> Self {
        RecordSchema {
            constructor: None,
            fixed_bytes: None,
            fields: Vec::new(),
        }
    }

    /// Creates the empty record that decoding fills in.
    pub fn constructor(mut self, constructor: fn() -> T) -> Self {
        self.constructor = Some(constructor);
        self
    }

    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    /// Declares the encoded size of every use of `T`, in bytes.
    pub fn fixed_bytes(mut self, bytes: usize) -> Self {
        self.fixed_bytes = Some(bytes);
        self
    }

    /// Adds a member of type `F`. `layout` carries the member's offset and any
    /// descriptors passed on to the member's own converter.
    pub fn field<F: 'static>(
        mut self,
        name: &'static str,
        layout: DescriptorSet,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        let bind = move |layout: &DescriptorSet,
                         service: &ConverterService|
              -> Result<FieldConverter<T>, CodecError> {
            let member = TypeUse::with_descriptors::<F>(layout.without(DescriptorKind::Offset));
            let converter = service.converter_for::<F>(&member)?;
            let decoder = converter.clone();

            Ok(FieldConverter {
                name,
                offset: layout.offset_bits(),
                encode: Arc::new(move |record: &T| converter.encode(get(record))),
                decode: Arc::new(move |record: &mut T, bits: &BitBuffer| {
                    *get_mut(record) = decoder.decode(bits)?;
                    Ok(())
                }),
            })
        };

        self.fields.push(FieldSchema {
            name,
            layout,
            bind: Arc::new(bind),
        });
        self
    }

    /// Layout of the named member.
    pub fn layout(&self, member: &str) -> Option<&DescriptorSet> {
        self.fields
            .iter()
            .find(|field| field.name == member)
            .map(|field| &field.layout)
    }

    pub fn member_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name)
    }

    /// Descriptors every use of `T` inherits: the record marker and fixed size.
    pub fn declared_descriptors(&self) -> DescriptorSet {
        let declared = DescriptorSet::new().record();
        match self.fixed_bytes {
            Some(bytes) => declared.fixed_bytes(bytes),
            None => declared,
        }
    }

    #[cfg(feature = "serde")]
    pub(crate) fn set_fixed_bytes(&mut self, bytes: Option<usize>) {
        self.fixed_bytes = bytes;
    }
}

impl<T> fmt::Debug for RecordSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("record", &type_name::<T>())
            .field("fixed_bytes", &self.fixed_bytes)
            .field(
                "fields",
                &self
                    .fields
                    .iter()
                    .map(|field| (field.name, &field.layout))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Binds one record member to its resolved converter and offset.
pub struct FieldConverter<T> {
    name: &'static str,
    offset: usize,
    encode: Arc<dyn Fn(&T) -> Result<BitBuffer, CodecError> + Send + Sync>,
    decode: Arc<dyn Fn(&mut T, &BitBuffer) -> Result<(), CodecError> + Send + Sync>,
}

impl<T> FieldConverter<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Encodes the member of `record`, relative to the member's own offset.
    pub fn encode(&self, record: &T) -> Result<BitBuffer, CodecError> {
        (self.encode)(record)
    }

    /// Decodes the member from `bits` (starting at its offset) into `record`.
    pub fn decode(&self, record: &mut T, bits: &BitBuffer) -> Result<(), CodecError> {
        let member = bits.slice(self.offset, bits.len().saturating_sub(self.offset))?;
        (self.decode)(record, &member)
    }
}

/// A schema with its record type erased.
trait RecordLayout: Send + Sync {
    fn declared(&self) -> DescriptorSet;

    fn build(
        &self,
        type_use: &TypeUse,
        service: &ConverterService,
    ) -> Result<AnyConverter, CodecError>;
}

impl<T: 'static> RecordLayout for RecordSchema<T> {
    fn declared(&self) -> DescriptorSet {
        self.declared_descriptors()
    }

    fn build(
        &self,
        type_use: &TypeUse,
        service: &ConverterService,
    ) -> Result<AnyConverter, CodecError> {
        let record = type_name::<T>();
        let fields = self
            .fields
            .iter()
            .map(|field| {
                (field.bind)(&field.layout, service)
                    .map_err(|source| RecordError::member(record, field.name, source).into())
            })
            .collect::<Result<Vec<_>, CodecError>>()?;

        let fixed_bits = type_use.descriptors().fixed_bytes_len().map(|bytes| bytes * 8);
        Ok(record_converter(record, self.constructor, Arc::new(fields), fixed_bits).into())
    }
}

fn record_converter<T: 'static>(
    record: &'static str,
    constructor: Option<fn() -> T>,
    fields: Arc<Vec<FieldConverter<T>>>,
    fixed_bits: Option<usize>,
) -> Converter<T> {
    let decoders = Arc::clone(&fields);

    Converter::new(
        move |value: &T| {
            let mut bits = BitBuffer::empty();
            let mut occupied: Vec<(usize, usize)> = Vec::with_capacity(fields.len());

            for field in fields.iter() {
                let encoded = field
                    .encode(value)
                    .map_err(|source| RecordError::member(record, field.name, source))?;

                let (start, end) = (field.offset, field.offset + encoded.len());
                if let Some(&(s, e)) = occupied.iter().find(|(s, e)| start < *e && *s < end) {
                    return Err(RecordError::Overlap {
                        record,
                        member: field.name,
                        start: start.max(s),
                        end: end.min(e),
                    }
                    .into());
                }
                occupied.push((start, end));

                bits = bits.splice(start, &encoded);
            }

            Ok(match fixed_bits {
                Some(len) => bits.resize(len),
                None => bits,
            })
        },
        move |bits: &BitBuffer| {
            let constructor = constructor.ok_or(RecordError::MissingConstructor { record })?;
            let mut value = constructor();

            for field in decoders.iter() {
                field
                    .decode(&mut value, bits)
                    .map_err(|source| RecordError::member(record, field.name, source))?;
            }

            Ok(value)
        },
    )
}

/// Builds converters for registered record types.
///
/// Applies to type-uses carrying [DescriptorKind::Record], and understands
/// [DescriptorKind::FixedBytes]. Built converters are cached per merged
/// type-use, so differently decorated uses of one record stay independent.
/// A cached converter is reused only while the provider generation it was
/// built under is current; any churn rebuilds it against the current members.
#[derive(Default)]
pub struct RecordProvider {
    schemas: HashMap<TypeKey, Arc<dyn RecordLayout>>,
    converters: Mutex<HashMap<TypeUse, (u64, AnyConverter)>>,
}

impl RecordProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the schema of `T`, replacing any earlier one.
    pub fn record<T: 'static>(mut self, schema: RecordSchema<T>) -> Self {
        self.schemas.insert(TypeKey::of::<T>(), Arc::new(schema));
        self
    }

    pub fn cached_converters(&self) -> usize {
        self.converters.lock().len()
    }
}

impl fmt::Debug for RecordProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordProvider")
            .field("records", &self.schemas.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ConverterProvider for RecordProvider {
    fn name(&self) -> &str {
        "record"
    }

    fn supports_descriptor(&self, kind: DescriptorKind) -> bool {
        matches!(kind, DescriptorKind::Record | DescriptorKind::FixedBytes)
    }

    fn declared_descriptors(&self, ty: TypeKey) -> Option<DescriptorSet> {
        self.schemas.get(&ty).map(|schema| schema.declared())
    }

    fn resolves_members(&self) -> bool {
        true
    }

    fn try_build(
        &self,
        type_use: &TypeUse,
        service: &ConverterService,
    ) -> Result<Option<AnyConverter>, CodecError> {
        if !type_use.descriptors().is_record() {
            return Ok(None);
        }
        let Some(schema) = self.schemas.get(&type_use.ty()) else {
            return Ok(None);
        };

        let generation = service.providers().generation();
        if let Some((built_under, converter)) = self.converters.lock().get(type_use)
            && *built_under == generation
        {
            return Ok(Some(converter.clone()));
        }

        // Members resolve through the service, so the cache is not locked while building.
        let built = schema.build(type_use, service)?;
        self.converters
            .lock()
            .insert(type_use.clone(), (generation, built.clone()));

        tracing::debug!(
            record = type_use.ty().name(),
            descriptors = ?type_use.descriptors(),
            generation,
            "record converter built"
        );

        Ok(Some(built))
    }
}
