//! Converters between typed values and [BitBuffer]s, plus the type-use keys
//! converters are resolved for.

use std::{
    any::{Any, TypeId, type_name},
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{bits::BitBuffer, descriptor::DescriptorSet, errors::CodecError};

/// Identity of a Rust type, with its name kept for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// One use of a type: the type plus the layout descriptors attached where it
/// is used. Two uses of the same type with different descriptors are distinct
/// keys and resolve to independent converters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeUse {
    ty: TypeKey,
    descriptors: DescriptorSet,
}

impl TypeUse {
    pub fn new(ty: TypeKey, descriptors: DescriptorSet) -> Self {
        TypeUse { ty, descriptors }
    }

    /// An undecorated use of `T`.
    pub fn of<T: 'static>() -> Self {
        Self::new(TypeKey::of::<T>(), DescriptorSet::new())
    }

    pub fn with_descriptors<T: 'static>(descriptors: DescriptorSet) -> Self {
        Self::new(TypeKey::of::<T>(), descriptors)
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    /// The same type with the use-site descriptors laid over `declared`.
    pub fn merged_over(&self, declared: &DescriptorSet) -> Self {
        TypeUse {
            ty: self.ty,
            descriptors: self.descriptors.merged_over(declared),
        }
    }
}

type EncodeFn<T> = dyn Fn(&T) -> Result<BitBuffer, CodecError> + Send + Sync;
type DecodeFn<T> = dyn Fn(&BitBuffer) -> Result<T, CodecError> + Send + Sync;

/// A pair of pure functions converting `T` to bits and back.
///
/// All configuration (widths, offsets, member converters) is captured when
/// the converter is built; cloning is cheap and shares the functions.
pub struct Converter<T> {
    encode: Arc<EncodeFn<T>>,
    decode: Arc<DecodeFn<T>>,
}

impl<T> Clone for Converter<T> {
    fn clone(&self) -> Self {
        Converter {
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("type", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T> Converter<T> {
    pub fn new<E, D>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> Result<BitBuffer, CodecError> + Send + Sync + 'static,
        D: Fn(&BitBuffer) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        Converter {
            encode: Arc::new(encode),
            decode: Arc::new(decode),
        }
    }

    pub fn encode(&self, value: &T) -> Result<BitBuffer, CodecError> {
        (self.encode)(value)
    }

    /// Decodes from the start of `bits`; bits past the encoded extent are ignored.
    pub fn decode(&self, bits: &BitBuffer) -> Result<T, CodecError> {
        (self.decode)(bits)
    }

    /// Encodes and returns the backing bytes, zero-padding a partial last byte.
    pub fn encode_bytes(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(self.encode(value)?.into_bytes())
    }

    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<T, CodecError> {
        self.decode(&BitBuffer::from_bytes(bytes))
    }
}

/// A converter with its value type erased, as stored by resolvers and providers.
#[derive(Clone)]
pub struct AnyConverter {
    ty: TypeKey,
    inner: Arc<dyn Any + Send + Sync>,
}

impl AnyConverter {
    pub fn new<T: 'static>(converter: Converter<T>) -> Self {
        AnyConverter {
            ty: TypeKey::of::<T>(),
            inner: Arc::new(converter),
        }
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// Recovers the typed converter.
    pub fn downcast<T: 'static>(&self) -> Result<Converter<T>, CodecError> {
        self.inner
            .downcast_ref::<Converter<T>>()
            .cloned()
            .ok_or(CodecError::TypeMismatch {
                expected: type_name::<T>(),
                found: self.ty.name(),
            })
    }

    /// True if both handles share the same underlying converter.
    pub fn ptr_eq(&self, other: &AnyConverter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> From<Converter<T>> for AnyConverter {
    fn from(converter: Converter<T>) -> Self {
        AnyConverter::new(converter)
    }
}

impl fmt::Debug for AnyConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyConverter").field(&self.ty).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ByteOrder;

    fn nibble() -> Converter<u8> {
        Converter::new(
            |value: &u8| BitBuffer::from_number(*value as u64, 4, ByteOrder::BigEndian),
            |bits: &BitBuffer| Ok(bits.to_number(4, ByteOrder::BigEndian)? as u8),
        )
    }

    #[test]
    fn test_converter_bytes() {
        let converter = nibble();
        assert_eq!(converter.encode_bytes(&0xA).unwrap(), vec![0xA0]);
        assert_eq!(converter.decode_bytes(&[0xA5]).unwrap(), 0xA);
    }

    #[test]
    fn test_downcast() {
        let erased = AnyConverter::new(nibble());
        assert!(erased.ty().is::<u8>());

        let typed = erased.downcast::<u8>().unwrap();
        assert_eq!(typed.encode(&3).unwrap().to_number(4, ByteOrder::BigEndian), Ok(3));
    }

    #[test]
    fn test_downcast_mismatch() {
        let erased = AnyConverter::new(nibble());
        assert_eq!(
            erased.downcast::<u16>().unwrap_err(),
            CodecError::TypeMismatch {
                expected: "u16",
                found: "u8"
            }
        );
    }

    #[test]
    fn test_type_use_identity() {
        let plain = TypeUse::of::<u8>();
        let narrow = TypeUse::with_descriptors::<u8>(DescriptorSet::new().width(4));

        assert_ne!(plain, narrow);
        assert_eq!(plain.ty(), narrow.ty());
        assert_eq!(
            narrow.merged_over(&DescriptorSet::new().width(8)),
            narrow
        );
    }
}
