//! Schema collection handle
//!
//! The opaque handle over a set of parsed XSD schemas that the walker and
//! scope computation consume: global elements, types, attributes, groups
//! and attribute groups indexed by QName, plus the target-namespace index.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::components::{
    AttributeDecl, AttributeGroupDef, ElementDecl, GroupDef, TypeDef,
};

/// An immutable collection of schema components from one or more schemas
#[derive(Debug, Default)]
pub struct SchemaCollection {
    elements: HashMap<QName, Arc<ElementDecl>>,
    // Global element declaration order; substitution-group discovery
    // must be deterministic across runs.
    element_order: Vec<QName>,
    types: HashMap<QName, Arc<TypeDef>>,
    attributes: HashMap<QName, Arc<AttributeDecl>>,
    attribute_groups: HashMap<QName, Arc<AttributeGroupDef>>,
    groups: HashMap<QName, Arc<GroupDef>>,
    target_namespaces: Vec<String>,
}

impl SchemaCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target namespace
    pub fn add_namespace(&mut self, namespace: impl Into<String>) {
        let namespace = namespace.into();
        if !self.target_namespaces.contains(&namespace) {
            self.target_namespaces.push(namespace);
        }
    }

    /// Register a global element declaration
    pub fn add_element(&mut self, element: ElementDecl) -> Result<()> {
        let name = element.name.clone();
        if self.elements.contains_key(&name) {
            return Err(Error::Schema(format!(
                "duplicate global element declaration: {}",
                name
            )));
        }
        self.element_order.push(name.clone());
        self.elements.insert(name, Arc::new(element));
        Ok(())
    }

    /// Register a global type definition; the type must be named
    pub fn add_type(&mut self, type_def: TypeDef) -> Result<()> {
        let name = type_def
            .name()
            .cloned()
            .ok_or_else(|| Error::Schema("global types must be named".to_string()))?;
        if self.types.contains_key(&name) {
            return Err(Error::Schema(format!(
                "duplicate global type definition: {}",
                name
            )));
        }
        self.types.insert(name, Arc::new(type_def));
        Ok(())
    }

    /// Register a global attribute declaration
    pub fn add_attribute(&mut self, attribute: AttributeDecl) -> Result<()> {
        let name = attribute.name.clone();
        if self.attributes.contains_key(&name) {
            return Err(Error::Schema(format!(
                "duplicate global attribute declaration: {}",
                name
            )));
        }
        self.attributes.insert(name, Arc::new(attribute));
        Ok(())
    }

    /// Register an attribute group definition
    pub fn add_attribute_group(&mut self, group: AttributeGroupDef) -> Result<()> {
        let name = group.name.clone();
        if self.attribute_groups.contains_key(&name) {
            return Err(Error::Schema(format!(
                "duplicate attribute group definition: {}",
                name
            )));
        }
        self.attribute_groups.insert(name, Arc::new(group));
        Ok(())
    }

    /// Register a named model group definition
    pub fn add_group(&mut self, group: GroupDef) -> Result<()> {
        let name = group.name.clone();
        if self.groups.contains_key(&name) {
            return Err(Error::Schema(format!(
                "duplicate model group definition: {}",
                name
            )));
        }
        self.groups.insert(name, Arc::new(group));
        Ok(())
    }

    /// Look up a global element declaration
    pub fn element_by_qname(&self, name: &QName) -> Option<&Arc<ElementDecl>> {
        self.elements.get(name)
    }

    /// Look up a global type definition
    pub fn type_by_qname(&self, name: &QName) -> Option<&Arc<TypeDef>> {
        self.types.get(name)
    }

    /// Look up a global attribute declaration
    pub fn attribute_by_qname(&self, name: &QName) -> Option<&Arc<AttributeDecl>> {
        self.attributes.get(name)
    }

    /// Look up an attribute group definition
    pub fn attribute_group_by_qname(&self, name: &QName) -> Option<&Arc<AttributeGroupDef>> {
        self.attribute_groups.get(name)
    }

    /// Look up a named model group definition
    pub fn group_by_qname(&self, name: &QName) -> Option<&Arc<GroupDef>> {
        self.groups.get(name)
    }

    /// Global element declarations in declaration order
    pub fn elements_in_order(&self) -> impl Iterator<Item = &Arc<ElementDecl>> {
        self.element_order
            .iter()
            .filter_map(move |name| self.elements.get(name))
    }

    /// Registered target namespaces
    pub fn target_namespaces(&self) -> &[String] {
        &self.target_namespaces
    }

    /// Resolve an element reference to its global declaration
    pub fn resolve_element(&self, name: &QName) -> Result<&Arc<ElementDecl>> {
        self.element_by_qname(name)
            .ok_or_else(|| Error::unresolved("element", name.clone()))
    }

    /// Resolve a type reference to its global definition
    pub fn resolve_type(&self, name: &QName) -> Result<&Arc<TypeDef>> {
        self.type_by_qname(name)
            .ok_or_else(|| Error::unresolved("type", name.clone()))
    }

    /// Resolve an attribute reference to its global declaration
    pub fn resolve_attribute(&self, name: &QName) -> Result<&Arc<AttributeDecl>> {
        self.attribute_by_qname(name)
            .ok_or_else(|| Error::unresolved("attribute", name.clone()))
    }

    /// Resolve an attribute group reference to its definition
    pub fn resolve_attribute_group(&self, name: &QName) -> Result<&Arc<AttributeGroupDef>> {
        self.attribute_group_by_qname(name)
            .ok_or_else(|| Error::unresolved("attribute group", name.clone()))
    }

    /// Resolve a model group reference to its definition
    pub fn resolve_group(&self, name: &QName) -> Result<&Arc<GroupDef>> {
        self.group_by_qname(name)
            .ok_or_else(|| Error::unresolved("group", name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_registration_and_lookup() {
        let mut collection = SchemaCollection::new();
        let name = QName::namespaced("urn:test", "root");
        collection
            .add_element(ElementDecl::new(name.clone()))
            .unwrap();

        assert!(collection.element_by_qname(&name).is_some());
        assert!(collection
            .element_by_qname(&QName::local("missing"))
            .is_none());
    }

    #[test]
    fn test_duplicate_element_rejected() {
        let mut collection = SchemaCollection::new();
        let name = QName::local("root");
        collection
            .add_element(ElementDecl::new(name.clone()))
            .unwrap();
        assert!(collection.add_element(ElementDecl::new(name)).is_err());
    }

    #[test]
    fn test_anonymous_global_type_rejected() {
        use crate::schema::components::ComplexTypeDef;

        let mut collection = SchemaCollection::new();
        let result = collection.add_type(TypeDef::Complex(ComplexTypeDef::empty()));
        assert!(result.is_err());
    }

    #[test]
    fn test_unresolved_reference_error() {
        let collection = SchemaCollection::new();
        let err = collection
            .resolve_type(&QName::local("nope"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnresolvedReference { kind: "type", .. }
        ));
    }

    #[test]
    fn test_declaration_order_preserved() {
        let mut collection = SchemaCollection::new();
        for name in ["a", "b", "c"] {
            collection
                .add_element(ElementDecl::new(QName::local(name)))
                .unwrap();
        }

        let names: Vec<_> = collection
            .elements_in_order()
            .map(|e| e.name.local_name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
