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

//! Schema of message groups
//!
//! A schema is immutable once built. The builder validates the structural
//! invariants (unique names and ids, resolvable and acyclic inheritance);
//! everything type-shape related is checked later when instructions are
//! compiled.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;
use snafu::{ensure, Backtrace, Snafu};

pub type GroupId = u64;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Group name already exists, name:{}.\nBacktrace:\n{}", name, backtrace))]
    GroupNameExists { name: String, backtrace: Backtrace },

    #[snafu(display(
        "Group id already exists, name:{}, id:{}.\nBacktrace:\n{}",
        name,
        id,
        backtrace
    ))]
    GroupIdExists {
        name: String,
        id: GroupId,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Field name already exists, group:{}, field:{}.\nBacktrace:\n{}",
        group,
        field,
        backtrace
    ))]
    FieldNameExists {
        group: String,
        field: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Unknown super group, group:{}, super:{}.\nBacktrace:\n{}",
        group,
        super_group,
        backtrace
    ))]
    UnknownSuperGroup {
        group: String,
        super_group: String,
        backtrace: Backtrace,
    },

    #[snafu(display("Inheritance cycle through group:{}.\nBacktrace:\n{}", group, backtrace))]
    InheritanceCycle { group: String, backtrace: Backtrace },

    #[snafu(display(
        "Named type already exists, name:{}.\nBacktrace:\n{}",
        name,
        backtrace
    ))]
    TypeNameExists { name: String, backtrace: Backtrace },

    #[snafu(display(
        "Named type reference cycle through:{}.\nBacktrace:\n{}",
        name,
        backtrace
    ))]
    TypeReferenceCycle { name: String, backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Unit of a time field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

/// Zero point of a time field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Epoch {
    Unix,
    Y2000,
    Midnight,
}

/// One symbol of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSymbol {
    pub name: String,
    pub value: i32,
}

impl EnumSymbol {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
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
    Time {
        unit: TimeUnit,
        epoch: Epoch,
        zone: Option<String>,
    },
    Enum {
        symbols: Vec<EnumSymbol>,
    },
    Sequence {
        component: Box<TypeDef>,
    },
    /// Static reference: a named type alias or exactly one group, inlined on
    /// the wire.
    Reference {
        name: String,
    },
    /// Dynamic reference: the named group or any of its subgroups, carried on
    /// the wire by id. `None` permits any group.
    DynamicReference {
        name: Option<String>,
    },
}

impl TypeDef {
    pub fn string() -> Self {
        TypeDef::String { max_size: None }
    }

    pub fn binary() -> Self {
        TypeDef::Binary { max_size: None }
    }

    pub fn millis_utc() -> Self {
        TypeDef::Time {
            unit: TimeUnit::Milliseconds,
            epoch: Epoch::Unix,
            zone: None,
        }
    }

    pub fn sequence(component: TypeDef) -> Self {
        TypeDef::Sequence {
            component: Box::new(component),
        }
    }

    pub fn reference(name: impl Into<String>) -> Self {
        TypeDef::Reference { name: name.into() }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        TypeDef::DynamicReference {
            name: Some(name.into()),
        }
    }

    pub fn enumeration(symbols: &[(&str, i32)]) -> Self {
        TypeDef::Enum {
            symbols: symbols
                .iter()
                .map(|(name, value)| EnumSymbol::new(*name, *value))
                .collect(),
        }
    }
}

/// Definition of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub id: Option<u64>,
    pub type_def: TypeDef,
    pub required: bool,
    pub annotations: BTreeMap<String, String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_def: TypeDef, required: bool) -> Self {
        Self {
            name: name.into(),
            id: None,
            type_def,
            required,
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// Definition of one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDef {
    pub name: String,
    pub id: Option<GroupId>,
    pub super_group: Option<String>,
    pub fields: Vec<FieldDef>,
    pub annotations: BTreeMap<String, String>,
}

impl GroupDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            super_group: None,
            fields: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: GroupId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_super(mut self, super_group: impl Into<String>) -> Self {
        self.super_group = Some(super_group.into());
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// An immutable, validated set of group and named type definitions.
#[derive(Debug, Clone)]
pub struct Schema {
    groups: Vec<GroupDef>,
    named_types: HashMap<String, TypeDef>,
    name_to_idx: HashMap<String, usize>,
    id_to_idx: HashMap<GroupId, usize>,
}

impl Schema {
    pub fn builder() -> Builder {
        Builder::default()
    }

    #[inline]
    pub fn groups(&self) -> &[GroupDef] {
        &self.groups
    }

    pub fn group_by_name(&self, name: &str) -> Option<&GroupDef> {
        self.name_to_idx.get(name).map(|idx| &self.groups[*idx])
    }

    pub fn group_by_id(&self, id: GroupId) -> Option<&GroupDef> {
        self.id_to_idx.get(&id).map(|idx| &self.groups[*idx])
    }

    pub(crate) fn group_index(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    pub fn named_type(&self, name: &str) -> Option<&TypeDef> {
        self.named_types.get(name)
    }

    /// The group named `root` and every group transitively declaring it as
    /// super, in declaration order.
    pub fn dynamic_subgroups<'a>(&'a self, root: &str) -> impl Iterator<Item = &'a GroupDef> {
        let members: Vec<&GroupDef> = match self.group_by_name(root) {
            Some(root_def) => self
                .groups
                .iter()
                .filter(|group| self.is_subgroup_of(group, &root_def.name))
                .collect(),
            None => Vec::new(),
        };
        members.into_iter()
    }

    pub(crate) fn is_subgroup_of(&self, group: &GroupDef, root: &str) -> bool {
        let mut current = Some(group);
        while let Some(group) = current {
            if group.name == root {
                return true;
            }
            current = group
                .super_group
                .as_deref()
                .and_then(|name| self.group_by_name(name));
        }
        false
    }

    /// Flatten alias chains through named type definitions.
    ///
    /// A reference naming a group (or nothing known) is returned unchanged;
    /// with `follow_refs` unset the input is returned as-is.
    pub fn resolve_to_type<'a>(&'a self, type_def: &'a TypeDef, follow_refs: bool) -> &'a TypeDef {
        if !follow_refs {
            return type_def;
        }
        let mut current = type_def;
        while let TypeDef::Reference { name } = current {
            match self.named_types.get(name) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Resolve a (possibly aliased) reference type to its target group.
    pub fn resolve_to_group(&self, type_def: &TypeDef) -> Option<&GroupDef> {
        match self.resolve_to_type(type_def, true) {
            TypeDef::Reference { name } => self.group_by_name(name),
            TypeDef::DynamicReference { name: Some(name) } => self.group_by_name(name),
            _ => None,
        }
    }

    /// The group and its ancestors, ancestors first.
    pub(crate) fn inheritance_chain<'a>(&'a self, group: &'a GroupDef) -> Vec<&'a GroupDef> {
        let mut chain = vec![group];
        let mut current = group;
        while let Some(super_name) = current.super_group.as_deref() {
            match self.group_by_name(super_name) {
                Some(super_def) => {
                    chain.push(super_def);
                    current = super_def;
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }
}

/// Validating builder of [Schema].
#[derive(Debug, Default)]
pub struct Builder {
    groups: Vec<GroupDef>,
    named_types: Vec<(String, TypeDef)>,
}

impl Builder {
    pub fn add_group(mut self, group: GroupDef) -> Self {
        self.groups.push(group);
        self
    }

    /// Define a named type usable as a [TypeDef::Reference] target.
    pub fn define(mut self, name: impl Into<String>, type_def: TypeDef) -> Self {
        self.named_types.push((name.into(), type_def));
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut named_types = HashMap::with_capacity(self.named_types.len());
        for (name, type_def) in self.named_types {
            ensure!(
                !named_types.contains_key(&name),
                TypeNameExists { name }
            );
            named_types.insert(name, type_def);
        }

        let mut name_to_idx = HashMap::with_capacity(self.groups.len());
        let mut id_to_idx = HashMap::new();
        for (idx, group) in self.groups.iter().enumerate() {
            ensure!(
                !name_to_idx.contains_key(&group.name),
                GroupNameExists { name: &group.name }
            );
            name_to_idx.insert(group.name.clone(), idx);

            if let Some(id) = group.id {
                ensure!(
                    !id_to_idx.contains_key(&id),
                    GroupIdExists {
                        name: &group.name,
                        id,
                    }
                );
                id_to_idx.insert(id, idx);
            }
        }

        for group in &self.groups {
            let mut current = group;
            let mut steps = 0;
            while let Some(super_name) = current.super_group.as_deref() {
                let super_idx = name_to_idx.get(super_name).copied();
                let super_def = match super_idx {
                    Some(idx) => &self.groups[idx],
                    None => {
                        return UnknownSuperGroup {
                            group: &group.name,
                            super_group: super_name,
                        }
                        .fail()
                    }
                };
                steps += 1;
                ensure!(
                    steps <= self.groups.len(),
                    InheritanceCycle { group: &group.name }
                );
                current = super_def;
            }

            let mut field_names = HashSet::with_capacity(group.fields.len());
            for field in &group.fields {
                ensure!(
                    field_names.insert(field.name.as_str()),
                    FieldNameExists {
                        group: &group.name,
                        field: &field.name,
                    }
                );
            }
        }

        // Alias chains must terminate so type resolution can be infallible.
        for name in named_types.keys() {
            let mut current = name.as_str();
            let mut steps = 0;
            while let Some(TypeDef::Reference { name: next }) = named_types.get(current) {
                steps += 1;
                ensure!(
                    steps <= named_types.len(),
                    TypeReferenceCycle { name: current }
                );
                current = next;
            }
        }

        debug!(
            "Built blink schema, groups:{}, named_types:{}",
            self.groups.len(),
            named_types.len()
        );

        Ok(Schema {
            groups: self.groups,
            named_types,
            name_to_idx,
            id_to_idx,
        })
    }
}
