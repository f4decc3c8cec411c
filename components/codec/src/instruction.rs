// Copyright 2024 The Blink Codec Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Compilation of a schema into per-group field instructions.
//!
//! Each group gets one flat instruction list covering its whole inheritance
//! chain, ancestors first. The runtime walks the list and never touches the
//! schema again; group cross references are indexes into the instruction
//! table, so mutually referencing groups need no special casing.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use log::debug;
use snafu::{ensure, Backtrace, Snafu};

use crate::schema::{GroupDef, Schema, TypeDef};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Duplicate field id, group:{}, field:{}, id:{}.\nBacktrace:\n{}",
        group,
        field,
        id,
        backtrace
    ))]
    DuplicateFieldId {
        group: String,
        field: String,
        id: u64,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Unresolved reference, group:{}, field:{}, target:{}.\nBacktrace:\n{}",
        group,
        field,
        target,
        backtrace
    ))]
    UnresolvedReference {
        group: String,
        field: String,
        target: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Unsupported sequence component, group:{}, field:{}.\nBacktrace:\n{}",
        group,
        field,
        backtrace
    ))]
    UnsupportedSequenceType {
        group: String,
        field: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Dynamic reference target has no id, group:{}, field:{}, target:{}.\nBacktrace:\n{}",
        group,
        field,
        target,
        backtrace
    ))]
    DynamicTargetMissingId {
        group: String,
        field: String,
        target: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Duplicate enum value, group:{}, field:{}, value:{}.\nBacktrace:\n{}",
        group,
        field,
        value,
        backtrace
    ))]
    DuplicateEnumValue {
        group: String,
        field: String,
        value: i32,
        backtrace: Backtrace,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Declared symbol values of an enum field.
#[derive(Debug)]
pub(crate) struct EnumTable {
    values: HashSet<i32>,
}

impl EnumTable {
    pub(crate) fn contains(&self, value: i32) -> bool {
        self.values.contains(&value)
    }
}

/// How one field value is read and written.
#[derive(Debug)]
pub(crate) enum ValueCodec {
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    BigInt,
    Float32,
    Float64,
    Decimal,
    BigDecimal,
    Boolean,
    String {
        max_size: Option<u32>,
    },
    Binary {
        max_size: Option<u32>,
    },
    Time,
    Enum {
        table: Arc<EnumTable>,
    },
    /// Inlined group of exactly the given instruction index.
    StaticGroup {
        group: usize,
    },
    /// Id-tagged group; `None` permits any group in the schema.
    DynamicGroup {
        valid: Option<Arc<HashSet<usize>>>,
    },
    Sequence {
        element: Box<ValueCodec>,
    },
}

impl ValueCodec {
    /// Wire type name, for diagnostics.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            ValueCodec::UInt8 => "u8",
            ValueCodec::UInt16 => "u16",
            ValueCodec::UInt32 => "u32",
            ValueCodec::UInt64 => "u64",
            ValueCodec::Int8 => "i8",
            ValueCodec::Int16 => "i16",
            ValueCodec::Int32 => "i32",
            ValueCodec::Int64 => "i64",
            ValueCodec::BigInt => "bigint",
            ValueCodec::Float32 => "f32",
            ValueCodec::Float64 => "f64",
            ValueCodec::Decimal => "decimal",
            ValueCodec::BigDecimal => "bigdecimal",
            ValueCodec::Boolean => "bool",
            ValueCodec::String { .. } => "string",
            ValueCodec::Binary { .. } => "binary",
            ValueCodec::Time => "timestamp",
            ValueCodec::Enum { .. } => "enum",
            ValueCodec::StaticGroup { .. } => "group",
            ValueCodec::DynamicGroup { .. } => "group",
            ValueCodec::Sequence { .. } => "sequence",
        }
    }
}

/// One field of a compiled group: the slot it occupies in the message plus
/// the codec reading and writing it.
#[derive(Debug)]
pub(crate) struct FieldInstruction {
    pub name: String,
    pub slot: usize,
    pub required: bool,
    pub codec: ValueCodec,
}

/// Instruction list of one group, fields flattened across the inheritance
/// chain.
#[derive(Debug)]
pub(crate) struct GroupInstructions {
    pub name: String,
    pub group_id: Option<u64>,
    pub fields: Vec<FieldInstruction>,
}

/// All compiled groups plus the two dispatch maps.
#[derive(Debug)]
pub(crate) struct InstructionSet {
    /// Index-aligned with `Schema::groups`.
    pub groups: Vec<GroupInstructions>,
    pub by_name: HashMap<String, usize>,
    pub by_id: HashMap<u64, usize>,
}

pub(crate) fn compile(schema: &Schema) -> Result<InstructionSet> {
    let mut groups = Vec::with_capacity(schema.groups().len());
    let mut by_name = HashMap::with_capacity(schema.groups().len());
    let mut by_id = HashMap::new();

    for (idx, group) in schema.groups().iter().enumerate() {
        groups.push(compile_group(schema, group)?);
        by_name.insert(group.name.clone(), idx);
        if let Some(id) = group.id {
            by_id.insert(id, idx);
        }
    }

    debug!("Compiled blink instructions, groups:{}", groups.len());

    Ok(InstructionSet {
        groups,
        by_name,
        by_id,
    })
}

fn compile_group(schema: &Schema, group: &GroupDef) -> Result<GroupInstructions> {
    let mut fields = Vec::new();
    let mut seen_ids = HashSet::new();

    for level in schema.inheritance_chain(group) {
        for field in &level.fields {
            if let Some(id) = field.id {
                ensure!(
                    seen_ids.insert(id),
                    DuplicateFieldId {
                        group: &group.name,
                        field: &field.name,
                        id,
                    }
                );
            }

            let codec = compile_codec(schema, &group.name, &field.name, &field.type_def)?;
            fields.push(FieldInstruction {
                name: field.name.clone(),
                slot: fields.len(),
                required: field.required,
                codec,
            });
        }
    }

    Ok(GroupInstructions {
        name: group.name.clone(),
        group_id: group.id,
        fields,
    })
}

fn compile_codec(
    schema: &Schema,
    group: &str,
    field: &str,
    type_def: &TypeDef,
) -> Result<ValueCodec> {
    let codec = match schema.resolve_to_type(type_def, true) {
        TypeDef::UInt8 => ValueCodec::UInt8,
        TypeDef::UInt16 => ValueCodec::UInt16,
        TypeDef::UInt32 => ValueCodec::UInt32,
        TypeDef::UInt64 => ValueCodec::UInt64,
        TypeDef::Int8 => ValueCodec::Int8,
        TypeDef::Int16 => ValueCodec::Int16,
        TypeDef::Int32 => ValueCodec::Int32,
        TypeDef::Int64 => ValueCodec::Int64,
        TypeDef::BigInt => ValueCodec::BigInt,
        TypeDef::Float32 => ValueCodec::Float32,
        TypeDef::Float64 => ValueCodec::Float64,
        TypeDef::Decimal => ValueCodec::Decimal,
        TypeDef::BigDecimal => ValueCodec::BigDecimal,
        TypeDef::Boolean => ValueCodec::Boolean,
        TypeDef::String { max_size } => ValueCodec::String {
            max_size: *max_size,
        },
        TypeDef::Binary { max_size } => ValueCodec::Binary {
            max_size: *max_size,
        },
        TypeDef::Time { .. } => ValueCodec::Time,
        TypeDef::Enum { symbols } => {
            let mut values = HashSet::with_capacity(symbols.len());
            for symbol in symbols {
                ensure!(
                    values.insert(symbol.value),
                    DuplicateEnumValue {
                        group,
                        field,
                        value: symbol.value,
                    }
                );
            }
            ValueCodec::Enum {
                table: Arc::new(EnumTable { values }),
            }
        }
        TypeDef::Reference { name } => match schema.group_index(name) {
            Some(idx) => ValueCodec::StaticGroup { group: idx },
            None => {
                return UnresolvedReference {
                    group,
                    field,
                    target: name,
                }
                .fail()
            }
        },
        TypeDef::DynamicReference { name: Some(root) } => {
            ensure!(
                schema.group_by_name(root).is_some(),
                UnresolvedReference {
                    group,
                    field,
                    target: root,
                }
            );

            let mut valid = HashSet::new();
            for (idx, member) in schema.groups().iter().enumerate() {
                if schema.is_subgroup_of(member, root) {
                    ensure!(
                        member.id.is_some(),
                        DynamicTargetMissingId {
                            group,
                            field,
                            target: &member.name,
                        }
                    );
                    valid.insert(idx);
                }
            }
            ValueCodec::DynamicGroup {
                valid: Some(Arc::new(valid)),
            }
        }
        TypeDef::DynamicReference { name: None } => ValueCodec::DynamicGroup { valid: None },
        TypeDef::Sequence { component } => {
            match schema.resolve_to_type(component, true) {
                TypeDef::Binary { .. } | TypeDef::Sequence { .. } => {
                    return UnsupportedSequenceType { group, field }.fail()
                }
                _ => {}
            }
            let element = compile_codec(schema, group, field, component)?;
            ValueCodec::Sequence {
                element: Box::new(element),
            }
        }
    };

    Ok(codec)
}

#[cfg(test)]
mod tests {
    use crate::schema::FieldDef;

    use super::*;

    #[test]
    fn test_inheritance_flattening() {
        let schema = Schema::builder()
            .add_group(
                GroupDef::new("Base")
                    .with_id(1)
                    .with_field(FieldDef::new("a", TypeDef::UInt32, true))
                    .with_field(FieldDef::new("b", TypeDef::string(), false)),
            )
            .add_group(
                GroupDef::new("Child")
                    .with_id(2)
                    .with_super("Base")
                    .with_field(FieldDef::new("c", TypeDef::Boolean, true)),
            )
            .build()
            .unwrap();

        let set = compile(&schema).unwrap();
        let child = &set.groups[set.by_name["Child"]];
        let order: Vec<(&str, usize)> = child
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.slot))
            .collect();
        assert_eq!(vec![("a", 0), ("b", 1), ("c", 2)], order);
        assert_eq!(Some(2), child.group_id);

        assert_eq!(set.by_id[&1], set.by_name["Base"]);
    }

    #[test]
    fn test_duplicate_field_id_across_chain() {
        let schema = Schema::builder()
            .add_group(
                GroupDef::new("Base")
                    .with_field(FieldDef::new("a", TypeDef::UInt8, true).with_id(1)),
            )
            .add_group(
                GroupDef::new("Child")
                    .with_super("Base")
                    .with_field(FieldDef::new("b", TypeDef::UInt8, true).with_id(1)),
            )
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::DuplicateFieldId { .. }));
    }

    #[test]
    fn test_sequence_of_binary_rejected() {
        let schema = Schema::builder()
            .add_group(
                GroupDef::new("G")
                    .with_id(1)
                    .with_field(FieldDef::new(
                        "blobs",
                        TypeDef::sequence(TypeDef::binary()),
                        true,
                    )),
            )
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSequenceType { .. }));
    }

    #[test]
    fn test_sequence_of_sequence_rejected() {
        let schema = Schema::builder()
            .add_group(GroupDef::new("G").with_id(1).with_field(FieldDef::new(
                "deep",
                TypeDef::sequence(TypeDef::sequence(TypeDef::UInt8)),
                true,
            )))
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSequenceType { .. }));
    }

    #[test]
    fn test_unresolved_static_reference() {
        let schema = Schema::builder()
            .add_group(GroupDef::new("G").with_id(1).with_field(FieldDef::new(
                "other",
                TypeDef::reference("Nowhere"),
                true,
            )))
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::UnresolvedReference { .. }));
    }

    #[test]
    fn test_dynamic_target_missing_id() {
        let schema = Schema::builder()
            .add_group(GroupDef::new("Base").with_id(1))
            // No id, but reachable through the dynamic reference below.
            .add_group(GroupDef::new("Child").with_super("Base"))
            .add_group(GroupDef::new("Holder").with_id(3).with_field(FieldDef::new(
                "ref",
                TypeDef::dynamic("Base"),
                true,
            )))
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::DynamicTargetMissingId { .. }));
    }

    #[test]
    fn test_static_reference_through_alias() {
        let schema = Schema::builder()
            .define("Leg", TypeDef::reference("LegGroup"))
            .add_group(
                GroupDef::new("LegGroup")
                    .with_id(1)
                    .with_field(FieldDef::new("px", TypeDef::Decimal, true)),
            )
            .add_group(GroupDef::new("Order").with_id(2).with_field(FieldDef::new(
                "leg",
                TypeDef::reference("Leg"),
                true,
            )))
            .build()
            .unwrap();

        let set = compile(&schema).unwrap();
        let order = &set.groups[set.by_name["Order"]];
        assert!(matches!(
            order.fields[0].codec,
            ValueCodec::StaticGroup { group } if group == set.by_name["LegGroup"]
        ));
    }

    #[test]
    fn test_duplicate_enum_value() {
        let schema = Schema::builder()
            .add_group(GroupDef::new("G").with_id(1).with_field(FieldDef::new(
                "side",
                TypeDef::enumeration(&[("Buy", 1), ("Sell", 1)]),
                true,
            )))
            .build()
            .unwrap();

        let err = compile(&schema).unwrap_err();
        assert!(matches!(err, Error::DuplicateEnumValue { .. }));
    }
}
