//! Registry of declared struct and enum types.
//!
//! Hoisting assigns each declaration a stable integer id and records its
//! field/variant tables here. The registry is part of the checker's output:
//! the bytecode compiler reads it to learn field order and variant payload
//! arities, and the reverse `variant -> enum` index drives the enum
//! shorthand resolution (`Circle(1.0)` for `Shape.Circle(1.0)`).

use rustc_hash::FxHashMap;

use crate::ty::{Ty, TyVar, TypeId};

/// A declared struct: `struct Box(t) { value t }`.
///
/// `param_vars` are rigid placeholder variables standing for the declared
/// type parameters; field types reference them. Instantiation substitutes
/// them with fresh variables or concrete arguments.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub id: TypeId,
    pub name: String,
    pub type_params: Vec<String>,
    pub param_vars: Vec<TyVar>,
    /// Field name and type, in declaration order.
    pub fields: Vec<(String, Ty)>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&Ty> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

/// A declared enum: `enum Shape { Circle(Float), Point }`.
#[derive(Debug, Clone)]
pub struct EnumDef {
    pub id: TypeId,
    pub name: String,
    pub type_params: Vec<String>,
    pub param_vars: Vec<TyVar>,
    /// Variant name and payload types, in declaration order.
    pub variants: Vec<(String, Vec<Ty>)>,
}

impl EnumDef {
    pub fn variant(&self, name: &str) -> Option<&Vec<Ty>> {
        self.variants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|(n, _)| n.as_str()).collect()
    }
}

/// All struct/enum declarations of a compilation, keyed by name and id.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    structs: FxHashMap<String, StructDef>,
    enums: FxHashMap<String, EnumDef>,
    /// Reverse lookup: variant name -> names of enums declaring it.
    variant_owners: FxHashMap<String, Vec<String>>,
    next_id: u32,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next stable type id.
    pub fn fresh_id(&mut self) -> TypeId {
        let id = TypeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn insert_struct(&mut self, def: StructDef) {
        self.structs.insert(def.name.clone(), def);
    }

    pub fn insert_enum(&mut self, def: EnumDef) {
        for (variant, _) in &def.variants {
            self.variant_owners
                .entry(variant.clone())
                .or_default()
                .push(def.name.clone());
        }
        self.enums.insert(def.name.clone(), def);
    }

    pub fn struct_by_name(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn struct_by_id(&self, id: TypeId) -> Option<&StructDef> {
        self.structs.values().find(|d| d.id == id)
    }

    pub fn enum_by_id(&self, id: TypeId) -> Option<&EnumDef> {
        self.enums.values().find(|d| d.id == id)
    }

    /// Whether a type with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name) || self.enums.contains_key(name)
    }

    /// Iterate all struct definitions.
    pub fn structs(&self) -> impl Iterator<Item = &StructDef> {
        self.structs.values()
    }

    /// The enums declaring a variant with this name.
    pub fn enums_with_variant(&self, variant: &str) -> &[String] {
        self.variant_owners
            .get(variant)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_enum(registry: &mut TypeRegistry, name: &str, variants: &[&str]) {
        let id = registry.fresh_id();
        registry.insert_enum(EnumDef {
            id,
            name: name.into(),
            type_params: vec![],
            param_vars: vec![],
            variants: variants.iter().map(|v| (v.to_string(), vec![])).collect(),
        });
    }

    #[test]
    fn ids_are_stable_and_unique() {
        let mut registry = TypeRegistry::new();
        let a = registry.fresh_id();
        let b = registry.fresh_id();
        assert_ne!(a, b);
        assert_eq!(a, TypeId(0));
        assert_eq!(b, TypeId(1));
    }

    #[test]
    fn variant_reverse_lookup() {
        let mut registry = TypeRegistry::new();
        sample_enum(&mut registry, "Shape", &["Circle", "Point"]);
        sample_enum(&mut registry, "Marker", &["Point"]);

        assert_eq!(registry.enums_with_variant("Circle"), &["Shape".to_string()]);
        assert_eq!(registry.enums_with_variant("Point").len(), 2);
        assert!(registry.enums_with_variant("Missing").is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let mut registry = TypeRegistry::new();
        sample_enum(&mut registry, "Shape", &["Circle"]);
        let id = registry.enum_by_name("Shape").unwrap().id;
        assert_eq!(registry.enum_by_id(id).unwrap().name, "Shape");
    }
}
