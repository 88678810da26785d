//! Schema-type resolution: maps a [`Property`] tree into composite
//! argument/field type definitions, deduplicating identical nested shapes
//! by canonical name.
//!
//! Composite types reserve their canonical-name slot *before* recursing
//! into children and are populated afterwards, so self-referential and
//! repeated nested shapes across different call sites terminate and reuse
//! one generated definition instead of duplicating it. The cache is the
//! only mutable shared state in the engine; writes are idempotent, so
//! concurrent population needs nothing beyond the per-store mutex.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::context::Comparator;
use crate::inflect::{camelize, parameterize};
use crate::registry::relationship::Relationship;
use crate::registry::schema::{Property, PropertyType};
use crate::registry::verb::Verb;

/// The fixed scalar mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    BigInt,
    Float,
    Boolean,
    File,
    Date,
    DateTime,
    String,
}

impl ScalarType {
    /// Map a declared property type onto its scalar; everything without a
    /// dedicated entry is a string.
    pub fn from_property_type(ty: Option<PropertyType>) -> Self {
        match ty {
            Some(PropertyType::Integer) => Self::Int,
            Some(PropertyType::BigInteger) => Self::BigInt,
            Some(PropertyType::Number) => Self::Float,
            Some(PropertyType::Boolean) => Self::Boolean,
            Some(PropertyType::File) => Self::File,
            Some(PropertyType::Date) => Self::Date,
            Some(PropertyType::DateTime) | Some(PropertyType::Time) => Self::DateTime,
            _ => Self::String,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::BigInt => "BigInt",
            Self::Float => "Float",
            Self::Boolean => "Boolean",
            Self::File => "File",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::String => "String",
        }
    }
}

/// The comparator input shape describing filter arguments for a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTypeShape {
    String,
    Integer,
    Date,
    DateTime,
    Boolean,
}

impl FilterTypeShape {
    /// The comparators this shape accepts.
    pub fn comparators(&self) -> &'static [Comparator] {
        use Comparator::*;
        match self {
            Self::String => &[
                Eq, NotEq, Gt, Lt, Lteq, Gteq, Contains, StartsWith, EndsWith, In,
            ],
            Self::Integer => &[Eq, NotEq, Gt, Lt, Lteq, Gteq, Between, In],
            Self::Date | Self::DateTime => &[Eq, NotEq, Gt, Lt, Lteq, Gteq, Between],
            Self::Boolean => &[Eq, NotEq],
        }
    }
}

/// The filter input shape for a property type; everything without a
/// dedicated shape filters as a string.
pub fn filter_type_for(ty: PropertyType) -> FilterTypeShape {
    match ty {
        PropertyType::Integer | PropertyType::BigInteger => FilterTypeShape::Integer,
        PropertyType::Date => FilterTypeShape::Date,
        PropertyType::DateTime | PropertyType::Time => FilterTypeShape::DateTime,
        PropertyType::Boolean => FilterTypeShape::Boolean,
        _ => FilterTypeShape::String,
    }
}

/// A generated enum definition.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// A field of a generated composite definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeHandle,
    pub required: bool,
}

/// A generated composite definition. Fields are populated after the slot is
/// reserved, which is what lets recursive shapes resolve.
#[derive(Debug)]
pub struct CompositeDef {
    pub name: String,
    fields: OnceLock<Vec<FieldDef>>,
}

impl CompositeDef {
    fn reserved(name: String) -> Self {
        Self {
            name,
            fields: OnceLock::new(),
        }
    }

    /// Fields of this definition; empty while the slot is still being
    /// populated.
    pub fn fields(&self) -> &[FieldDef] {
        self.fields.get().map(Vec::as_slice).unwrap_or_default()
    }

    fn seal(&self, fields: Vec<FieldDef>) {
        // Re-registering an equivalent definition is a no-op.
        let _ = self.fields.set(fields);
    }
}

/// Handle to a resolved type.
#[derive(Debug, Clone)]
pub enum TypeHandle {
    Scalar(ScalarType),
    Enum(Arc<EnumDef>),
    Composite(Arc<CompositeDef>),
    List(Box<TypeHandle>),
}

impl TypeHandle {
    /// The canonical name this handle renders as.
    pub fn type_name(&self) -> String {
        match self {
            Self::Scalar(scalar) => scalar.name().to_string(),
            Self::Enum(def) => def.name.clone(),
            Self::Composite(def) => def.name.clone(),
            Self::List(inner) => format!("[{}]", inner.type_name()),
        }
    }

    /// Whether two handles reference the same generated definition.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Enum(a), Self::Enum(b)) => Arc::ptr_eq(a, b),
            (Self::Composite(a), Self::Composite(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => a.same_as(b),
            _ => false,
        }
    }
}

/// A derived argument for a verb input.
#[derive(Debug, Clone)]
pub struct SchemaArgument {
    pub name: String,
    pub ty: TypeHandle,
    pub required: bool,
}

/// A derived output field.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: String,
    pub ty: TypeHandle,
    pub nullable: bool,
}

/// Cache of generated types keyed by canonical name.
#[derive(Debug, Default)]
pub struct TypeStore {
    types: Mutex<HashMap<String, TypeHandle>>,
}

impl TypeStore {
    pub fn get(&self, name: &str) -> Option<TypeHandle> {
        self.types.lock().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.lock().is_empty()
    }

    /// Check-then-insert a composite slot. Returns the definition plus
    /// whether this call reserved it fresh; a lost race hands back the
    /// winner's definition.
    fn reserve_composite(&self, name: &str) -> (Arc<CompositeDef>, bool) {
        let mut types = self.types.lock();
        if let Some(TypeHandle::Composite(existing)) = types.get(name) {
            return (existing.clone(), false);
        }
        let fresh = Arc::new(CompositeDef::reserved(name.to_string()));
        types.insert(name.to_string(), TypeHandle::Composite(fresh.clone()));
        (fresh, true)
    }

    fn get_or_insert_enum(&self, name: &str, values: Vec<String>) -> Arc<EnumDef> {
        let mut types = self.types.lock();
        if let Some(TypeHandle::Enum(existing)) = types.get(name) {
            return existing.clone();
        }
        let fresh = Arc::new(EnumDef {
            name: name.to_string(),
            values,
        });
        types.insert(name.to_string(), TypeHandle::Enum(fresh.clone()));
        fresh
    }
}

/// Which flavor of composite a resolution produces, reflected in the
/// canonical-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeKind {
    Input,
    Output,
}

/// Resolves properties into argument/field types, memoized by canonical
/// name in a [`TypeStore`].
#[derive(Debug, Default)]
pub struct TypeResolver {
    store: TypeStore,
}

impl TypeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &TypeStore {
        &self.store
    }

    /// Resolve a property into an argument definition (canonical suffix
    /// `Input`).
    pub fn resolve_argument(&self, property: &Property, prefix: &str) -> SchemaArgument {
        let ty = self.resolve_type(property, prefix, TypeKind::Input);
        SchemaArgument {
            name: property.name.clone(),
            ty,
            required: required(property),
        }
    }

    /// Resolve a property into an output field definition.
    pub fn resolve_field(&self, property: &Property, prefix: &str) -> SchemaField {
        let ty = self.resolve_type(property, prefix, TypeKind::Output);
        SchemaField {
            name: property.name.clone(),
            ty,
            nullable: !required(property),
        }
    }

    /// Derive the argument list for a verb's schema. When the verb is read
    /// through a relationship, arguments the batcher already controls are
    /// omitted.
    pub fn verb_arguments(
        &self,
        verb: &Verb,
        relationship: Option<&Relationship>,
    ) -> Vec<SchemaArgument> {
        verb.schema
            .properties
            .iter()
            .filter(|property| {
                relationship.is_none_or(|rel| !rel.should_skip_argument(&property.name))
            })
            .map(|property| self.resolve_argument(property, &verb.id))
            .collect()
    }

    fn resolve_type(&self, property: &Property, prefix: &str, kind: TypeKind) -> TypeHandle {
        if property.is_array() {
            // Arrays resolve their element type first and wrap it; a
            // composite element registers under the array property's
            // canonical name.
            let element = property
                .items
                .first()
                .map(|item| {
                    if item.is_composite() {
                        self.resolve_composite(
                            item,
                            &self.canonical_name(property, prefix, kind),
                            prefix,
                            kind,
                        )
                    } else {
                        self.resolve_type(item, prefix, kind)
                    }
                })
                .unwrap_or(TypeHandle::Scalar(ScalarType::String));
            return TypeHandle::List(Box::new(element));
        }

        if property.is_composite() {
            return self.resolve_composite(
                property,
                &self.canonical_name(property, prefix, kind),
                prefix,
                kind,
            );
        }

        self.scalar_or_enum(property)
    }

    /// Resolve a composite under `name`, reserving the slot before
    /// recursing so nested references to the same shape terminate.
    fn resolve_composite(
        &self,
        property: &Property,
        name: &str,
        prefix: &str,
        kind: TypeKind,
    ) -> TypeHandle {
        let (definition, fresh) = self.store.reserve_composite(name);
        if fresh {
            let fields = property
                .properties
                .iter()
                .map(|child| FieldDef {
                    name: child.name.clone(),
                    ty: self.resolve_type(child, prefix, kind),
                    required: required(child),
                })
                .collect();
            definition.seal(fields);
            tracing::debug!(type_name = %name, "registered composite type");
        }
        TypeHandle::Composite(definition)
    }

    fn scalar_or_enum(&self, property: &Property) -> TypeHandle {
        if !property.enum_values.is_empty() {
            let enum_name = format!(
                "{}Enum",
                camelize(property.type_name.as_deref().unwrap_or(&property.name))
            );

            let invalid = property
                .enum_values
                .iter()
                .any(|value| value.is_empty() || value.contains(' ') || value.contains('-'));
            if invalid {
                tracing::warn!(
                    type_name = %enum_name,
                    "invalid enum values, falling back to String; change '-' or ' ' to '_' or remove blank values"
                );
            } else {
                let values = property
                    .enum_values
                    .iter()
                    .map(|value| parameterize(value))
                    .collect();
                return TypeHandle::Enum(self.store.get_or_insert_enum(&enum_name, values));
            }
        }

        TypeHandle::Scalar(ScalarType::from_property_type(property.primary_type()))
    }

    /// Canonical name for a composite: value objects are named after their
    /// shared type name so they are reused across call sites; everything
    /// else is prefixed by its position in the tree.
    fn canonical_name(&self, property: &Property, prefix: &str, kind: TypeKind) -> String {
        let base = match &property.type_name {
            Some(type_name) => camelize(type_name),
            None if prefix.is_empty() => camelize(&property.name),
            None => camelize(&format!("{prefix}_{}", property.name)),
        };
        match kind {
            TypeKind::Input => format!("{base}Input"),
            TypeKind::Output => base,
        }
    }
}

fn required(property: &Property) -> bool {
    // Permissive on purpose: a nilable or defaulted field is never forced
    // on the client.
    property.required && !property.nilable() && !property.has_default
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    use crate::registry::relationship::Cardinality;
    use crate::registry::schema::Schema;

    fn address() -> Property {
        Property::composite(
            "address",
            vec![
                Property::scalar("street", PropertyType::String).required(true),
                Property::scalar("zip", PropertyType::String),
            ],
        )
    }

    #[test]
    fn test_scalar_mapping_table() {
        assert_eq!(
            ScalarType::from_property_type(Some(PropertyType::Integer)),
            ScalarType::Int
        );
        assert_eq!(
            ScalarType::from_property_type(Some(PropertyType::Time)),
            ScalarType::DateTime
        );
        assert_eq!(
            ScalarType::from_property_type(Some(PropertyType::Email)),
            ScalarType::String
        );
        assert_eq!(ScalarType::from_property_type(None), ScalarType::String);
    }

    #[test]
    fn test_repeated_resolution_reuses_definition() {
        let resolver = TypeResolver::new();
        let first = resolver.resolve_argument(&address(), "owner");
        let second = resolver.resolve_argument(&address(), "owner");

        assert!(first.ty.same_as(&second.ty));
        assert_eq!(first.ty.type_name(), "OwnerAddressInput");
        assert_eq!(resolver.store().len(), 1);
    }

    #[test]
    fn test_value_object_shares_one_definition_across_prefixes() {
        let resolver = TypeResolver::new();
        let shared = address().type_name("Address");
        let from_owner = resolver.resolve_argument(&shared, "owner");
        let from_clinic = resolver.resolve_argument(&shared, "clinic");

        assert!(from_owner.ty.same_as(&from_clinic.ty));
        assert_eq!(from_owner.ty.type_name(), "AddressInput");
    }

    #[test]
    fn test_array_wraps_element_type() {
        let resolver = TypeResolver::new();
        let tags = Property::array("tags", Property::scalar("tag", PropertyType::String));
        let argument = resolver.resolve_argument(&tags, "pet");
        let TypeHandle::List(inner) = argument.ty else {
            panic!("expected a list");
        };
        assert_matches!(*inner, TypeHandle::Scalar(ScalarType::String));
    }

    #[test]
    fn test_array_of_composites_registers_under_array_name() {
        let resolver = TypeResolver::new();
        let visits = Property::array("visits", address());
        let argument = resolver.resolve_argument(&visits, "pet");
        assert_eq!(argument.ty.type_name(), "[PetVisitsInput]");
        assert!(resolver.store().get("PetVisitsInput").is_some());
    }

    #[test]
    fn test_self_referential_shape_terminates() {
        let node = Property::composite(
            "node",
            vec![
                Property::scalar("label", PropertyType::String),
                Property::composite(
                    "child",
                    vec![Property::scalar("label", PropertyType::String)],
                )
                .type_name("Node"),
            ],
        )
        .type_name("Node");

        let resolver = TypeResolver::new();
        let argument = resolver.resolve_argument(&node, "");
        assert_eq!(argument.ty.type_name(), "NodeInput");

        // The nested reference resolves to the same reserved definition.
        let TypeHandle::Composite(definition) = &argument.ty else {
            panic!("expected a composite");
        };
        let child = &definition.fields()[1];
        assert!(child.ty.same_as(&argument.ty));
    }

    #[test]
    fn test_invalid_enum_values_fall_back_to_string() {
        let resolver = TypeResolver::new();
        let status = Property::scalar("status", PropertyType::String)
            .enum_values(vec!["on hold".to_string(), "active".to_string()]);
        let argument = resolver.resolve_argument(&status, "pet");
        assert_matches!(argument.ty, TypeHandle::Scalar(ScalarType::String));
        assert!(resolver.store().is_empty());
    }

    #[test]
    fn test_valid_enum_values_are_slugged() {
        let resolver = TypeResolver::new();
        let status = Property::scalar("status", PropertyType::String)
            .type_name("PetStatus")
            .enum_values(vec!["Active".to_string(), "Retired".to_string()]);
        let argument = resolver.resolve_argument(&status, "pet");
        let TypeHandle::Enum(def) = argument.ty else {
            panic!("expected an enum");
        };
        assert_eq!(def.name, "PetStatusEnum");
        assert_eq!(def.values, vec!["active", "retired"]);
    }

    #[test]
    fn test_verb_arguments_skip_batcher_controlled_keys() {
        let resolver = TypeResolver::new();
        let verb = Verb::new(
            "read",
            "ReadPetsDto",
            Schema::new(
                "pet_shop",
                "pet",
                vec![
                    Property::scalar("owner_ids", PropertyType::Array),
                    Property::scalar("name", PropertyType::String),
                ],
            ),
        );
        let relationship =
            Relationship::new("pets", "pet_shop.pet", "owner_id", Cardinality::HasMany);

        let arguments = resolver.verb_arguments(&verb, Some(&relationship));
        let names: Vec<_> = arguments.iter().map(|arg| arg.name.as_str()).collect();
        assert_eq!(names, vec!["name"]);

        let unfiltered = resolver.verb_arguments(&verb, None);
        assert_eq!(unfiltered.len(), 2);
    }

    #[test]
    fn test_filter_shapes() {
        assert_eq!(filter_type_for(PropertyType::Integer), FilterTypeShape::Integer);
        assert_eq!(filter_type_for(PropertyType::Uri), FilterTypeShape::String);
        assert!(
            FilterTypeShape::Boolean
                .comparators()
                .iter()
                .all(|c| matches!(c, Comparator::Eq | Comparator::NotEq))
        );
    }
}
