//! Leaf providers for booleans and fixed-width integers. These terminate the
//! recursion of record converters.

use crate::{
    bits::{BitBuffer, MAX_NUMBER_BITS, sign_extend},
    converter::{AnyConverter, Converter, TypeUse},
    descriptor::{ByteOrder, DescriptorKind, DescriptorSet},
    errors::CodecError,
    provider::ConverterProvider,
    service::ConverterService,
};

/// Converts `bool` fields. Understands only [DescriptorKind::Width] (default 1).
///
/// Encoding writes the value into every bit of the field. Decoding is the OR
/// of the field's bits, so any partially set pattern reads as `true` and the
/// conversion is not a bijection.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanProvider;

impl ConverterProvider for BooleanProvider {
    fn name(&self) -> &str {
        "boolean"
    }

    fn supports_descriptor(&self, kind: DescriptorKind) -> bool {
        kind == DescriptorKind::Width
    }

    fn try_build(
        &self,
        type_use: &TypeUse,
        _service: &ConverterService,
    ) -> Result<Option<AnyConverter>, CodecError> {
        if !type_use.ty().is::<bool>() {
            return Ok(None);
        }

        Ok(Some(boolean_converter(type_use.descriptors().width_bits().unwrap_or(1)).into()))
    }
}

pub fn boolean_converter(width: usize) -> Converter<bool> {
    Converter::new(
        move |value: &bool| Ok(BitBuffer::filled(width, *value)),
        move |bits: &BitBuffer| Ok(bits.slice(0, width)?.any()),
    )
}

/// Integer kinds the [IntegerProvider] converts.
pub trait Integral: Copy + Send + Sync + 'static {
    /// Natural width in bits.
    const BITS: usize;
    const SIGNED: bool;

    /// The value widened to 64 bits, sign-extended for signed kinds.
    fn to_raw(self) -> u64;

    /// Narrows the low bits of `raw`.
    fn from_raw(raw: u64) -> Self;
}

macro_rules! integral {
    (signed: $($ty:ty),*) => {
        $(
            impl Integral for $ty {
                const BITS: usize = <$ty>::BITS as usize;
                const SIGNED: bool = true;

                fn to_raw(self) -> u64 {
                    self as i64 as u64
                }

                fn from_raw(raw: u64) -> Self {
                    raw as $ty
                }
            }
        )*
    };
    (unsigned: $($ty:ty),*) => {
        $(
            impl Integral for $ty {
                const BITS: usize = <$ty>::BITS as usize;
                const SIGNED: bool = false;

                fn to_raw(self) -> u64 {
                    self as u64
                }

                fn from_raw(raw: u64) -> Self {
                    raw as $ty
                }
            }
        )*
    };
}

integral!(signed: i8, i16, i32, i64);
integral!(unsigned: u8, u16, u32, u64);

/// Builds a converter for `width` bits of `T` in the given byte order.
///
/// Widths below the natural size pack the low bits; wider fields are
/// sign-extended (signed kinds) or zero-extended on encode, and narrowed again
/// on decode.
pub fn integer_converter<T: Integral>(
    width: usize,
    order: ByteOrder,
) -> Result<Converter<T>, CodecError> {
    if width > MAX_NUMBER_BITS {
        return Err(CodecError::WidthTooLarge {
            width,
            max: MAX_NUMBER_BITS,
        });
    }

    Ok(Converter::new(
        move |value: &T| BitBuffer::from_number(value.to_raw(), width, order),
        move |bits: &BitBuffer| {
            let raw = bits.to_number(width, order)?;
            let raw = if T::SIGNED {
                sign_extend(raw, width) as u64
            } else {
                raw
            };

            Ok(T::from_raw(raw))
        },
    ))
}

/// Converts `i8`–`i64` and `u8`–`u64`. Understands [DescriptorKind::Width]
/// (default: natural size) and [DescriptorKind::Order] (default: big-endian).
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerProvider;

impl IntegerProvider {
    fn build<T: Integral>(descriptors: &DescriptorSet) -> Result<Option<AnyConverter>, CodecError> {
        let width = descriptors.width_bits().unwrap_or(T::BITS);
        let order = descriptors.byte_order().unwrap_or_default();

        Ok(Some(integer_converter::<T>(width, order)?.into()))
    }
}

macro_rules! dispatch_integral {
    ($type_use:expr, $($ty:ty),*) => {
        $(
            if $type_use.ty().is::<$ty>() {
                return IntegerProvider::build::<$ty>($type_use.descriptors());
            }
        )*
    };
}

impl ConverterProvider for IntegerProvider {
    fn name(&self) -> &str {
        "integer"
    }

    fn supports_descriptor(&self, kind: DescriptorKind) -> bool {
        matches!(kind, DescriptorKind::Width | DescriptorKind::Order)
    }

    fn try_build(
        &self,
        type_use: &TypeUse,
        _service: &ConverterService,
    ) -> Result<Option<AnyConverter>, CodecError> {
        dispatch_integral!(type_use, i8, i16, i32, i64, u8, u16, u32, u64);

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use proptest::{prelude::*, test_runner::TestCaseError};

    use super::*;

    fn byte_order() -> impl Strategy<Value = ByteOrder> {
        prop_oneof![Just(ByteOrder::BigEndian), Just(ByteOrder::LittleEndian)]
    }

    /// The value as it survives a `width`-bit field.
    fn representable<T: Integral>(value: T, width: usize) -> T {
        let raw = value.to_raw();
        let raw = if T::SIGNED {
            sign_extend(raw, width) as u64
        } else if width >= 64 {
            raw
        } else {
            raw & ((1u64 << width) - 1)
        };

        T::from_raw(raw)
    }

    fn round_trip<T: Integral + PartialEq + Debug>(
        value: T,
        width: usize,
        order: ByteOrder,
    ) -> Result<(), TestCaseError> {
        let value = representable(value, width);
        let converter = integer_converter::<T>(width, order).unwrap();

        let bits = converter.encode(&value).unwrap();
        prop_assert_eq!(bits.len(), width);
        prop_assert_eq!(converter.decode(&bits).unwrap(), value);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_i8_round_trip(value in any::<i8>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_i16_round_trip(value in any::<i16>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_i32_round_trip(value in any::<i32>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_i64_round_trip(value in any::<i64>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_u8_round_trip(value in any::<u8>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_u16_round_trip(value in any::<u16>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_u32_round_trip(value in any::<u32>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_u64_round_trip(value in any::<u64>(), width in 1usize..=64, order in byte_order()) {
            round_trip(value, width, order)?;
        }

        #[test]
        fn prop_any_set_bit_decodes_true(width in 1usize..=32, bit in 0usize..32) {
            prop_assume!(bit < width);
            let bits = BitBuffer::new(width).with(bit, true).unwrap();
            prop_assert!(boolean_converter(width).decode(&bits).unwrap());
        }
    }

    #[test]
    fn test_boolean_idempotence() {
        for width in 1..=16 {
            let converter = boolean_converter(width);
            for value in [true, false] {
                let bits = converter.encode(&value).unwrap();
                assert_eq!(bits.len(), width);
                assert_eq!(converter.decode(&bits).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_boolean_fills_every_bit() {
        let bits = boolean_converter(3).encode(&true).unwrap();
        assert_eq!(bits.as_bytes(), &[0b1110_0000]);
    }

    #[test]
    fn test_boolean_ignores_bits_past_width() {
        let bits = BitBuffer::new(8).with(4, true).unwrap();
        assert!(!boolean_converter(4).decode(&bits).unwrap());
    }

    #[test]
    fn test_natural_width_and_big_endian_defaults() {
        let service = ConverterService::with_primitives();
        let converter = service.converter::<i16>().unwrap();

        let bits = converter.encode(&-2).unwrap();
        assert_eq!(bits.as_bytes(), &[0xFF, 0xFE]);
        assert_eq!(service.converter::<bool>().unwrap().encode(&true).unwrap().len(), 1);
    }

    #[test]
    fn test_width_and_order_descriptors() {
        let service = ConverterService::with_primitives();
        let type_use = TypeUse::with_descriptors::<u32>(
            DescriptorSet::new().width(24).order(ByteOrder::LittleEndian),
        );
        let converter = service.converter_for::<u32>(&type_use).unwrap();

        assert_eq!(converter.encode_bytes(&0x123456).unwrap(), vec![0x56, 0x34, 0x12]);
        assert_eq!(converter.decode_bytes(&[0x56, 0x34, 0x12]).unwrap(), 0x123456);
    }

    #[test]
    fn test_narrow_signed_field_sign_extends() {
        let converter = integer_converter::<i8>(4, ByteOrder::BigEndian).unwrap();
        assert_eq!(converter.decode_bytes(&[0b1000_0000]).unwrap(), -8);
        assert_eq!(converter.decode_bytes(&[0b0111_0000]).unwrap(), 7);
    }

    #[test]
    fn test_decode_needs_full_width() {
        let converter = integer_converter::<u16>(16, ByteOrder::BigEndian).unwrap();
        assert!(matches!(
            converter.decode_bytes(&[0xFF]),
            Err(CodecError::BitRange { .. })
        ));
    }

    #[test]
    fn test_width_too_large() {
        let service = ConverterService::with_primitives();
        let type_use = TypeUse::with_descriptors::<u8>(DescriptorSet::new().width(65));
        assert_eq!(
            service.converter_for::<u8>(&type_use).unwrap_err(),
            CodecError::WidthTooLarge { width: 65, max: 64 }
        );
    }

    #[test]
    fn test_unsupported_kinds_decline() {
        let service = ConverterService::new();
        for type_use in [TypeUse::of::<f32>(), TypeUse::of::<char>()] {
            assert!(matches!(IntegerProvider.try_build(&type_use, &service), Ok(None)));
            assert!(matches!(BooleanProvider.try_build(&type_use, &service), Ok(None)));
        }
        assert!(matches!(IntegerProvider.try_build(&TypeUse::of::<bool>(), &service), Ok(None)));
    }

    #[test]
    fn test_boolean_rejects_order_descriptor() {
        let service = ConverterService::with_primitives();
        let type_use =
            TypeUse::with_descriptors::<bool>(DescriptorSet::new().order(ByteOrder::LittleEndian));
        assert_eq!(
            service.converter_for::<bool>(&type_use).unwrap_err(),
            CodecError::NoConverterFound { type_name: "bool" }
        );
    }
}
