//! Deserializable record layouts.
//!
//! A [RecordLayoutDef] describes where the members of a record sit, so the
//! bit layout of a record can ship as configuration (for example a JSON file)
//! while accessors stay in code. Apply one to a [RecordSchema] with
//! [RecordSchema::apply_layout] before handing the schema to a provider.

use serde::{Deserialize, Serialize};

use crate::{
    descriptor::{ByteOrder, DescriptorSet},
    errors::RecordError,
    record::RecordSchema,
};

/// Byte order of a multi-byte field.
#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderDef {
    #[default]
    BigEndian,
    LittleEndian,
}

impl From<ByteOrderDef> for ByteOrder {
    fn from(def: ByteOrderDef) -> Self {
        match def {
            ByteOrderDef::BigEndian => ByteOrder::BigEndian,
            ByteOrderDef::LittleEndian => ByteOrder::LittleEndian,
        }
    }
}

/// Layout of a whole record.
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
pub struct RecordLayoutDef {
    /// Total encoded size in bytes; keeps the schema's own size when absent.
    #[serde(default)]
    pub fixed_bytes: Option<usize>,
    /// Members whose layout is replaced. Unlisted members keep theirs.
    #[serde(default)]
    pub fields: Vec<FieldLayoutDef>,
}

/// Layout of one member.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FieldLayoutDef {
    /// Member name as declared in the schema.
    pub name: String,
    /// Bit offset from the start of the record.
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub width: Option<usize>,
    #[serde(default)]
    pub order: Option<ByteOrderDef>,
}

impl From<&FieldLayoutDef> for DescriptorSet {
    fn from(def: &FieldLayoutDef) -> Self {
        let mut layout = DescriptorSet::at(def.offset);
        if let Some(width) = def.width {
            layout = layout.width(width);
        }
        if let Some(order) = def.order {
            layout = layout.order(order.into());
        }
        layout
    }
}

impl<T: 'static> RecordSchema<T> {
    /// Replaces the layout of every member named in `def`.
    ///
    /// Fails with [RecordError::UnknownMember] if `def` names a member the
    /// schema does not declare; the schema is left unchanged in that case.
    pub fn apply_layout(mut self, def: &RecordLayoutDef) -> Result<Self, RecordError> {
        let mut layouts = Vec::with_capacity(def.fields.len());
        for field in &def.fields {
            let index = self
                .fields
                .iter()
                .position(|declared| declared.name == field.name)
                .ok_or_else(|| RecordError::UnknownMember {
                    record: std::any::type_name::<T>(),
                    member: field.name.clone(),
                })?;
            layouts.push((index, DescriptorSet::from(field)));
        }

        for (index, layout) in layouts {
            self.fields[index].layout = layout;
        }
        if def.fixed_bytes.is_some() {
            self.set_fixed_bytes(def.fixed_bytes);
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::RecordProvider, service::ConverterService};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Reading {
        channel: u8,
        valid: bool,
        sample: i16,
    }

    fn schema() -> RecordSchema<Reading> {
        RecordSchema::<Reading>::new()
            .default_constructor()
            .field("channel", DescriptorSet::at(0), |r| &r.channel, |r| &mut r.channel)
            .field("valid", DescriptorSet::at(8), |r| &r.valid, |r| &mut r.valid)
            .field("sample", DescriptorSet::at(16), |r| &r.sample, |r| &mut r.sample)
    }

    #[test]
    fn test_parse_layout_json() {
        let json = r#"{
            "fixed_bytes": 3,
            "fields": [
                { "name": "channel", "width": 4 },
                { "name": "sample", "offset": 8, "width": 12, "order": "LittleEndian" }
            ]
        }"#;

        let def: RecordLayoutDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.fixed_bytes, Some(3));
        assert_eq!(def.fields.len(), 2);
        assert_eq!(
            DescriptorSet::from(&def.fields[1]),
            DescriptorSet::at(8).width(12).order(ByteOrder::LittleEndian)
        );
        assert_eq!(DescriptorSet::from(&def.fields[0]), DescriptorSet::at(0).width(4));
    }

    #[test]
    fn test_applied_layout_drives_encoding() {
        let def: RecordLayoutDef = serde_json::from_str(
            r#"{
                "fixed_bytes": 2,
                "fields": [
                    { "name": "channel", "width": 4 },
                    { "name": "valid", "offset": 4, "width": 1 },
                    { "name": "sample", "offset": 5, "width": 11 }
                ]
            }"#,
        )
        .unwrap();
        let schema = schema().apply_layout(&def).unwrap();
        assert_eq!(schema.layout("valid"), Some(&DescriptorSet::at(4).width(1)));

        let service = ConverterService::with_primitives();
        service.register(RecordProvider::new().record(schema));
        let converter = service.converter::<Reading>().unwrap();

        let reading = Reading {
            channel: 0xA,
            valid: true,
            sample: -1,
        };
        assert_eq!(converter.encode_bytes(&reading).unwrap(), vec![0xAF, 0xFF]);
        assert_eq!(converter.decode_bytes(&[0xAF, 0xFF]).unwrap(), reading);
    }

    #[test]
    fn test_unlisted_members_keep_layout() {
        let def = RecordLayoutDef {
            fixed_bytes: None,
            fields: vec![FieldLayoutDef {
                name: "channel".to_string(),
                offset: 0,
                width: Some(4),
                order: None,
            }],
        };
        let schema = schema().apply_layout(&def).unwrap();

        assert_eq!(schema.layout("sample"), Some(&DescriptorSet::at(16)));
        assert_eq!(schema.declared_descriptors(), DescriptorSet::new().record());
    }

    #[test]
    fn test_unknown_member() {
        let def: RecordLayoutDef =
            serde_json::from_str(r#"{ "fields": [{ "name": "gain", "offset": 0 }] }"#).unwrap();

        assert_eq!(
            schema().apply_layout(&def).unwrap_err(),
            RecordError::UnknownMember {
                record: std::any::type_name::<Reading>(),
                member: "gain".to_string(),
            }
        );
    }

    #[test]
    fn test_layout_serializes() {
        let def = RecordLayoutDef {
            fixed_bytes: Some(4),
            fields: vec![FieldLayoutDef {
                name: "sample".to_string(),
                offset: 16,
                width: None,
                order: Some(ByteOrderDef::BigEndian),
            }],
        };

        let json = serde_json::to_string(&def).unwrap();
        assert_eq!(serde_json::from_str::<RecordLayoutDef>(&json).unwrap(), def);
    }
}
