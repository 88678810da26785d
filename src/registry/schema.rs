//! Schema model: the immutable description of a resource's fields.
//!
//! A [`Schema`] is an ordered list of [`Property`]. Each property declares
//! its primitive types (nullable unions such as `[Null, String]` are
//! expressed by including `Null`), optional nested `properties` (composite)
//! or `items` (array element schema), enum values, a resolver mapping the
//! logical field onto one or more physical accessors, and visibility tags
//! consulted by the serializer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Primitive and structural types a property can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    // Basic types
    String,
    Number,
    Integer,
    BigInteger,
    Object,
    Array,
    Boolean,
    Null,

    // String format specializations
    DateTime,
    Time,
    Date,
    Duration,
    Email,
    Uri,
    Regex,

    // Other
    File,
}

/// A single declared field of a schema.
///
/// Exactly one of {primitive, composite, array} describes a leaf's shape:
/// an array property carries its element schema in `items`, a composite
/// carries nested `properties`, everything else is a primitive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub types: Vec<PropertyType>,
    /// Type name for shared value objects; also seeds enum type names.
    #[serde(default)]
    pub type_name: Option<String>,
    /// Element schema when this property is an array.
    #[serde(default)]
    pub items: Vec<Property>,
    /// Nested properties when this property is a composite object.
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub enum_values: Vec<String>,
    /// Maps the logical field onto one or more physical accessor names.
    #[serde(default)]
    pub resolver: Option<BTreeMap<String, String>>,
    /// Whether the field can be used for filtering and sorting.
    #[serde(default)]
    pub resolvable: bool,
    #[serde(default)]
    pub required: bool,
    /// Whether the declaration carries a default value for this field.
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Visibility tags; a tagged property serializes only for a matching group.
    #[serde(default)]
    pub serialization_groups: BTreeSet<String>,
}

impl Property {
    /// A primitive property of the given type.
    pub fn scalar(name: impl Into<String>, ty: PropertyType) -> Self {
        Self::with_types(name, vec![ty])
    }

    /// A property with an explicit type union.
    pub fn with_types(name: impl Into<String>, types: Vec<PropertyType>) -> Self {
        Self {
            name: name.into(),
            types,
            type_name: None,
            items: Vec::new(),
            properties: Vec::new(),
            enum_values: Vec::new(),
            resolver: None,
            resolvable: false,
            required: false,
            has_default: false,
            description: None,
            serialization_groups: BTreeSet::new(),
        }
    }

    /// A composite property with nested properties.
    pub fn composite(name: impl Into<String>, properties: Vec<Property>) -> Self {
        let mut property = Self::with_types(name, vec![PropertyType::Object]);
        property.properties = properties;
        property
    }

    /// An array property with the given element schema.
    pub fn array(name: impl Into<String>, element: Property) -> Self {
        let mut property = Self::with_types(name, vec![PropertyType::Array]);
        property.items = vec![element];
        property
    }

    pub fn resolvable(mut self, resolvable: bool) -> Self {
        self.resolvable = resolvable;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn enum_values(mut self, values: Vec<String>) -> Self {
        self.enum_values = values;
        self
    }

    pub fn resolver(mut self, resolver: BTreeMap<String, String>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn serialization_groups(mut self, groups: BTreeSet<String>) -> Self {
        self.serialization_groups = groups;
        self
    }

    /// Whether the property is the bare null type.
    pub fn is_null(&self) -> bool {
        self.types == [PropertyType::Null]
    }

    /// The declared types with `Null` stripped (unless the property is bare null).
    pub fn non_null_types(&self) -> Vec<PropertyType> {
        if self.is_null() {
            return self.types.clone();
        }
        self.types
            .iter()
            .copied()
            .filter(|ty| *ty != PropertyType::Null)
            .collect()
    }

    /// Whether the type union admits null alongside another type.
    pub fn nilable(&self) -> bool {
        !self.is_null() && self.types.contains(&PropertyType::Null)
    }

    pub fn is_array(&self) -> bool {
        !self.items.is_empty() && self.types.contains(&PropertyType::Array)
    }

    pub fn is_composite(&self) -> bool {
        !self.properties.is_empty()
    }

    /// Whether this property is a shared value object (named type).
    pub fn value_object(&self) -> bool {
        self.type_name.is_some()
    }

    /// The first non-null declared type, if any.
    pub fn primary_type(&self) -> Option<PropertyType> {
        self.non_null_types().first().copied()
    }

    /// The single physical accessor this property resolves to, when its
    /// resolver is addressable. Multi-target "forward" resolvers have no
    /// single accessor.
    pub fn single_resolver_target(&self) -> Option<&str> {
        match &self.resolver {
            None => Some(self.name.as_str()),
            Some(map) if map.len() == 1 => map.values().next().map(String::as_str),
            Some(_) => None,
        }
    }

    /// Whether the property is visible for the requested serialization groups.
    pub fn visible_for(&self, groups: &BTreeSet<String>) -> bool {
        self.serialization_groups.is_empty() || !self.serialization_groups.is_disjoint(groups)
    }
}

/// A filterable field that is not part of the schema's property list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterField {
    pub name: String,
    #[serde(default)]
    pub resolver: Option<BTreeMap<String, String>>,
    pub property_type: PropertyType,
    /// The store cannot evaluate this condition; it is applied post-fetch.
    #[serde(default)]
    pub in_memory: bool,
}

impl FilterField {
    /// The physical field the condition targets.
    pub fn physical_field(&self) -> &str {
        match &self.resolver {
            Some(map) if map.len() == 1 => map
                .values()
                .next()
                .map_or(self.name.as_str(), String::as_str),
            _ => self.name.as_str(),
        }
    }
}

/// An ordered list of properties describing one resource, plus auxiliary
/// filterable fields the schema exposes beyond its own properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub namespace: String,
    pub properties: Vec<Property>,
    #[serde(default)]
    pub additional_filter_fields: Vec<FilterField>,
}

impl Schema {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        properties: Vec<Property>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            properties,
            additional_filter_fields: Vec::new(),
        }
    }

    pub fn with_filter_fields(mut self, fields: Vec<FilterField>) -> Self {
        self.additional_filter_fields = fields;
        self
    }

    pub fn identifier(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|property| property.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.find_property(name).is_some()
    }

    pub fn find_filter_field(&self, name: &str) -> Option<&FilterField> {
        self.additional_filter_fields
            .iter()
            .find(|field| field.name == name)
    }

    /// Resolve a logical field name to the physical accessor the store
    /// understands. Fails with [`Error::UnknownField`] when the field is
    /// missing, not resolvable, or hidden behind a multi-target resolver.
    pub fn resolver_value(&self, name: &str) -> Result<String, Error> {
        if let Some(field) = self.find_filter_field(name) {
            return Ok(field.physical_field().to_string());
        }

        let property = self
            .find_property(name)
            .filter(|property| property.resolvable)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;

        property
            .single_resolver_target()
            .map(str::to_string)
            .ok_or_else(|| Error::UnknownField(name.to_string()))
    }
}
