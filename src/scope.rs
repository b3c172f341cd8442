//! Schema scope computation
//!
//! For an XSD type, computes the complete attribute closure (inherited
//! and group-expanded), the effective child particle, the merged
//! attribute wildcard, and the canonical [`SimpleTypeInfo`]. Scopes of
//! named types are cached by QName; anonymous types are scoped inline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::namespaces::QName;
use crate::schema::components::{
    AnyAttribute, AttrUse, AttributeDecl, AttributeUse, ComplexDerivation, ComplexTypeDef,
    FacetDecl, Occurs, Particle, SimpleBase, SimpleDerivation, SimpleTypeDef, TypeDef,
};
use crate::schema::SchemaCollection;
use crate::simple::base::{builtin_info, is_builtin};
use crate::simple::facets::{Facet, FacetSet};
use crate::simple::info::SimpleTypeInfo;

/// An attribute with its use and type resolved into scope
#[derive(Debug, Clone)]
pub struct ResolvedAttribute {
    /// Attribute qualified name
    pub name: QName,
    /// Canonical type information
    pub type_info: Arc<SimpleTypeInfo>,
    /// Use constraint (never Prohibited; those leave the closure)
    pub use_: AttributeUse,
    /// Default value
    pub default_value: Option<String>,
    /// Fixed value
    pub fixed_value: Option<String>,
}

/// The complete closure of one XSD type
#[derive(Debug, Clone)]
pub struct Scope {
    /// Canonical type information
    pub type_info: Arc<SimpleTypeInfo>,
    /// Attribute closure in declaration order, base attributes first
    pub attributes: Vec<ResolvedAttribute>,
    /// Effective child particle
    pub particle: Option<Particle>,
    /// Merged attribute wildcard
    pub any_attribute: Option<AnyAttribute>,
}

/// Shared cache of scopes keyed by type QName
pub type ScopeCache = HashMap<QName, Arc<Scope>>;

/// Computes type scopes against one schema collection.
pub struct Scoper<'a> {
    collection: &'a SchemaCollection,
    cache: &'a mut ScopeCache,
    user_recognized: &'a HashSet<QName>,
    in_progress: HashSet<QName>,
}

impl<'a> Scoper<'a> {
    /// Create a scoper over a collection and shared cache
    pub fn new(
        collection: &'a SchemaCollection,
        cache: &'a mut ScopeCache,
        user_recognized: &'a HashSet<QName>,
    ) -> Self {
        Self {
            collection,
            cache,
            user_recognized,
            in_progress: HashSet::new(),
        }
    }

    /// Scope a type referenced by QName (built-in or global)
    pub fn scope_of_name(&mut self, name: &QName) -> Result<Arc<Scope>> {
        if let Some(cached) = self.cache.get(name) {
            return Ok(Arc::clone(cached));
        }

        if is_builtin(name) {
            let mut info = builtin_info(name)?;
            info.set_user_recognized(self.recognized(Some(name)));
            let scope = Arc::new(Scope {
                type_info: Arc::new(info),
                attributes: Vec::new(),
                particle: None,
                any_attribute: None,
            });
            self.cache.insert(name.clone(), Arc::clone(&scope));
            return Ok(scope);
        }

        if !self.in_progress.insert(name.clone()) {
            return Err(Error::Schema(format!(
                "circular type derivation through {}",
                name
            )));
        }

        let type_def = Arc::clone(self.collection.resolve_type(name)?);
        let scope = self.scope_of(&type_def)?;
        self.in_progress.remove(name);
        self.cache.insert(name.clone(), Arc::clone(&scope));
        Ok(scope)
    }

    /// Scope a type definition (named or anonymous)
    pub fn scope_of(&mut self, type_def: &TypeDef) -> Result<Arc<Scope>> {
        match type_def {
            TypeDef::Simple(def) => self.scope_simple(def),
            TypeDef::Complex(def) => self.scope_complex(def),
        }
    }

    fn recognized(&self, name: Option<&QName>) -> Option<QName> {
        name.filter(|n| self.user_recognized.contains(n)).cloned()
    }

    fn scope_simple(&mut self, def: &SimpleTypeDef) -> Result<Arc<Scope>> {
        let mut info = match &def.derivation {
            SimpleDerivation::Restriction { base, facets } => {
                let parent = self.simple_base_info(base)?;
                let declared = facet_decls_to_set(facets);
                let parent_facets = parent.facets().cloned().unwrap_or_default();
                let merged = FacetSet::merge(&parent_facets, &declared);
                parent.restrict(merged)?
            }
            SimpleDerivation::List { item } => {
                let item_info = self.simple_base_info(item)?;
                match item_info {
                    SimpleTypeInfo::Atomic { .. } | SimpleTypeInfo::Union { .. } => {
                        SimpleTypeInfo::List {
                            item: Box::new(item_info),
                            facets: FacetSet::new(),
                        }
                    }
                    other => {
                        return Err(Error::InvalidRestriction(format!(
                            "cannot build a list over {:?}",
                            other
                        )))
                    }
                }
            }
            SimpleDerivation::Union { members } => {
                let mut flattened = Vec::with_capacity(members.len());
                for member in members {
                    let member_info = self.simple_base_info(member)?;
                    // Unions of unions flatten into one member list.
                    if let SimpleTypeInfo::Union { members: inner, .. } = member_info {
                        flattened.extend(inner);
                    } else {
                        flattened.push(member_info);
                    }
                }
                if flattened.is_empty() {
                    return Err(Error::InvalidRestriction(
                        "union has no member types".to_string(),
                    ));
                }
                SimpleTypeInfo::Union {
                    members: flattened,
                    facets: FacetSet::new(),
                }
            }
        };

        if let Some(recognized) = self.recognized(def.name.as_ref()) {
            info.set_user_recognized(Some(recognized));
        }

        Ok(Arc::new(Scope {
            type_info: Arc::new(info),
            attributes: Vec::new(),
            particle: None,
            any_attribute: None,
        }))
    }

    fn simple_base_info(&mut self, base: &SimpleBase) -> Result<SimpleTypeInfo> {
        let scope = match base {
            SimpleBase::Named(name) => self.scope_of_name(name)?,
            SimpleBase::Inline(def) => self.scope_simple(def)?,
        };
        Ok((*scope.type_info).clone())
    }

    fn scope_complex(&mut self, def: &ComplexTypeDef) -> Result<Arc<Scope>> {
        let scope = match &def.derivation {
            ComplexDerivation::Direct {
                particle,
                attributes,
                any_attribute,
            } => Scope {
                type_info: Arc::new(SimpleTypeInfo::complex(def.mixed)),
                attributes: self.resolve_attributes(attributes)?,
                particle: particle.clone(),
                any_attribute: any_attribute.clone(),
            },
            ComplexDerivation::ComplexExtension {
                base,
                particle,
                attributes,
                any_attribute,
            } => {
                let base_scope = self.scope_of_name(base)?;

                let mut merged_attrs = base_scope.attributes.clone();
                override_attributes(&mut merged_attrs, self.resolve_attributes(attributes)?);

                // An extension is a sequence of the base particle followed
                // by the extension particle.
                let merged_particle = match (base_scope.particle.clone(), particle.clone()) {
                    (Some(base_p), Some(ext_p)) => {
                        Some(Particle::sequence(Occurs::once(), vec![base_p, ext_p]))
                    }
                    (Some(base_p), None) => Some(base_p),
                    (None, ext_p) => ext_p,
                };

                let merged_any = match (&base_scope.any_attribute, any_attribute) {
                    (Some(base_any), Some(ext_any)) => Some(ext_any.merged_with(base_any)),
                    (Some(base_any), None) => Some(base_any.clone()),
                    (None, ext_any) => ext_any.clone(),
                };

                let type_info = if base_scope.type_info.is_simple() {
                    Arc::clone(&base_scope.type_info)
                } else {
                    Arc::new(SimpleTypeInfo::complex(def.mixed))
                };

                Scope {
                    type_info,
                    attributes: merged_attrs,
                    particle: merged_particle,
                    any_attribute: merged_any,
                }
            }
            ComplexDerivation::ComplexRestriction {
                base,
                particle,
                attributes,
                any_attribute,
            } => {
                let base_scope = self.scope_of_name(base)?;

                let mut merged_attrs = base_scope.attributes.clone();
                override_attributes(&mut merged_attrs, self.resolve_attributes(attributes)?);

                // Particles are not inherited across a restriction; the
                // child redefines them wholesale or keeps the base's.
                let merged_particle = particle
                    .clone()
                    .or_else(|| base_scope.particle.clone());

                let type_info = if base_scope.type_info.is_simple() {
                    Arc::clone(&base_scope.type_info)
                } else {
                    Arc::new(SimpleTypeInfo::complex(def.mixed))
                };

                Scope {
                    type_info,
                    attributes: merged_attrs,
                    particle: merged_particle,
                    any_attribute: any_attribute.clone(),
                }
            }
            ComplexDerivation::SimpleExtension {
                base,
                attributes,
                any_attribute,
            } => {
                let base_scope = self.scope_of_name(base)?;

                let mut merged_attrs = base_scope.attributes.clone();
                override_attributes(&mut merged_attrs, self.resolve_attributes(attributes)?);

                Scope {
                    type_info: Arc::clone(&base_scope.type_info),
                    attributes: merged_attrs,
                    particle: None,
                    any_attribute: any_attribute.clone(),
                }
            }
            ComplexDerivation::SimpleRestriction {
                base,
                facets,
                attributes,
                any_attribute,
            } => {
                let base_scope = self.scope_of_name(base)?;

                let declared = facet_decls_to_set(facets);
                let parent_facets = base_scope
                    .type_info
                    .facets()
                    .cloned()
                    .unwrap_or_default();
                let merged = FacetSet::merge(&parent_facets, &declared);
                let type_info = base_scope.type_info.restrict(merged)?;

                let mut merged_attrs = base_scope.attributes.clone();
                override_attributes(&mut merged_attrs, self.resolve_attributes(attributes)?);

                Scope {
                    type_info: Arc::new(type_info),
                    attributes: merged_attrs,
                    particle: None,
                    any_attribute: any_attribute.clone(),
                }
            }
        };

        Ok(Arc::new(scope))
    }

    fn resolve_attributes(&mut self, uses: &[AttrUse]) -> Result<Vec<ResolvedAttribute>> {
        let mut resolved = Vec::new();
        self.expand_attr_uses(uses, &mut resolved)?;
        Ok(resolved)
    }

    fn expand_attr_uses(
        &mut self,
        uses: &[AttrUse],
        out: &mut Vec<ResolvedAttribute>,
    ) -> Result<()> {
        for use_ in uses {
            match use_ {
                AttrUse::Decl(decl) => {
                    if let Some(attr) = self.resolve_attribute_decl(decl)? {
                        push_attribute(out, attr);
                    }
                }
                AttrUse::Ref(name) => {
                    let decl = Arc::clone(self.collection.resolve_attribute(name)?);
                    if let Some(attr) = self.resolve_attribute_decl(&decl)? {
                        push_attribute(out, attr);
                    }
                }
                AttrUse::GroupRef(name) => {
                    let group = Arc::clone(self.collection.resolve_attribute_group(name)?);
                    self.expand_attr_uses(&group.members, out)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_attribute_decl(
        &mut self,
        decl: &AttributeDecl,
    ) -> Result<Option<ResolvedAttribute>> {
        if decl.use_ == AttributeUse::Prohibited {
            return Ok(None);
        }

        let type_info = if let Some(inline) = &decl.inline_type {
            let scope = self.scope_simple(inline)?;
            Arc::clone(&scope.type_info)
        } else if let Some(type_name) = &decl.type_name {
            let scope = self.scope_of_name(type_name)?;
            if !scope.type_info.is_simple() {
                return Err(Error::Schema(format!(
                    "attribute {} has a complex type",
                    decl.name
                )));
            }
            Arc::clone(&scope.type_info)
        } else {
            Arc::new(builtin_info(&QName::xsd("anySimpleType"))?)
        };

        Ok(Some(ResolvedAttribute {
            name: decl.name.clone(),
            type_info,
            use_: decl.use_,
            default_value: decl.default_value.clone(),
            fixed_value: decl.fixed_value.clone(),
        }))
    }
}

fn facet_decls_to_set(decls: &[FacetDecl]) -> FacetSet {
    let mut facets = FacetSet::new();
    for decl in decls {
        let facet = if decl.fixed {
            Facet::fixed(decl.value.clone())
        } else {
            Facet::new(decl.value.clone())
        };
        facets.set(decl.kind, facet);
    }
    facets
}

// Child declarations override base attributes with the same QName in
// place; new attributes append in declaration order.
fn override_attributes(base: &mut Vec<ResolvedAttribute>, overrides: Vec<ResolvedAttribute>) {
    for attr in overrides {
        push_attribute(base, attr);
    }
}

fn push_attribute(out: &mut Vec<ResolvedAttribute>, attr: ResolvedAttribute) {
    if let Some(existing) = out.iter_mut().find(|a| a.name == attr.name) {
        *existing = attr;
    } else {
        out.push(attr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::components::{ElementDecl, GroupKind, Term};
    use crate::simple::base::BaseSimpleType;
    use crate::simple::facets::FacetKind;

    fn scoper_fixture(
        collection: &SchemaCollection,
        cache: &mut ScopeCache,
        recognized: &HashSet<QName>,
    ) -> Result<Arc<Scope>> {
        let mut scoper = Scoper::new(collection, cache, recognized);
        scoper.scope_of_name(&QName::namespaced("urn:test", "colorType"))
    }

    #[test]
    fn test_simple_restriction_merges_facets() {
        let mut collection = SchemaCollection::new();
        collection
            .add_type(TypeDef::Simple(
                SimpleTypeDef::restriction(
                    QName::xsd("token"),
                    vec![
                        FacetDecl::new(FacetKind::Enumeration, "red"),
                        FacetDecl::new(FacetKind::Enumeration, "green"),
                    ],
                )
                .named(QName::namespaced("urn:test", "colorType")),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let recognized = HashSet::new();
        let scope = scoper_fixture(&collection, &mut cache, &recognized).unwrap();

        match scope.type_info.as_ref() {
            SimpleTypeInfo::Atomic { base, facets, .. } => {
                assert_eq!(*base, BaseSimpleType::String);
                assert_eq!(facets.enumeration().len(), 2);
                // token's collapse survives the restriction.
                assert_eq!(
                    facets.get(FacetKind::WhiteSpace).unwrap().value,
                    "collapse"
                );
            }
            other => panic!("expected atomic, got {:?}", other),
        }

        // The named scope is cached.
        assert!(cache.contains_key(&QName::namespaced("urn:test", "colorType")));
    }

    #[test]
    fn test_user_recognized_type_recorded() {
        let name = QName::namespaced("urn:test", "colorType");
        let mut collection = SchemaCollection::new();
        collection
            .add_type(TypeDef::Simple(
                SimpleTypeDef::restriction(QName::xsd("string"), vec![]).named(name.clone()),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let mut recognized = HashSet::new();
        recognized.insert(name.clone());

        let scope = scoper_fixture(&collection, &mut cache, &recognized).unwrap();
        assert_eq!(scope.type_info.user_recognized(), Some(&name));
    }

    #[test]
    fn test_complex_extension_concatenates_particles() {
        let base_name = QName::namespaced("urn:test", "baseType");
        let ext_name = QName::namespaced("urn:test", "extType");

        let mut collection = SchemaCollection::new();
        collection
            .add_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    Some(Particle::element(
                        Occurs::once(),
                        ElementDecl::new(QName::local("a")).with_type_name(QName::xsd("string")),
                    )),
                    vec![AttrUse::Decl(Arc::new(
                        AttributeDecl::new(QName::local("id"))
                            .with_type_name(QName::xsd("ID")),
                    ))],
                )
                .named(base_name.clone()),
            ))
            .unwrap();
        collection
            .add_type(TypeDef::Complex(
                ComplexTypeDef::empty()
                    .named(ext_name.clone())
                    .with_derivation(ComplexDerivation::ComplexExtension {
                        base: base_name,
                        particle: Some(Particle::element(
                            Occurs::once(),
                            ElementDecl::new(QName::local("b"))
                                .with_type_name(QName::xsd("int")),
                        )),
                        attributes: vec![AttrUse::Decl(Arc::new(
                            AttributeDecl::new(QName::local("version"))
                                .with_type_name(QName::xsd("int")),
                        ))],
                        any_attribute: None,
                    }),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let recognized = HashSet::new();
        let mut scoper = Scoper::new(&collection, &mut cache, &recognized);
        let scope = scoper.scope_of_name(&ext_name).unwrap();

        // Base attribute first, extension attribute after.
        let names: Vec<_> = scope
            .attributes
            .iter()
            .map(|a| a.name.local_name.clone())
            .collect();
        assert_eq!(names, vec!["id", "version"]);

        // Particle is a synthetic (base, ext) sequence.
        match &scope.particle {
            Some(Particle {
                term: Term::Group(GroupKind::Sequence, children),
                ..
            }) => assert_eq!(children.len(), 2),
            other => panic!("expected synthetic sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_prohibited_attribute_leaves_closure() {
        let name = QName::namespaced("urn:test", "t");
        let mut collection = SchemaCollection::new();
        collection
            .add_type(TypeDef::Complex(
                ComplexTypeDef::direct(
                    None,
                    vec![AttrUse::Decl(Arc::new(
                        AttributeDecl::new(QName::local("gone"))
                            .with_type_name(QName::xsd("string"))
                            .with_use(AttributeUse::Prohibited),
                    ))],
                )
                .named(name.clone()),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let recognized = HashSet::new();
        let mut scoper = Scoper::new(&collection, &mut cache, &recognized);
        let scope = scoper.scope_of_name(&name).unwrap();
        assert!(scope.attributes.is_empty());
    }

    #[test]
    fn test_attribute_group_expansion() {
        use crate::schema::components::AttributeGroupDef;

        let group_name = QName::namespaced("urn:test", "common");
        let type_name = QName::namespaced("urn:test", "t");

        let mut collection = SchemaCollection::new();
        collection
            .add_attribute_group(AttributeGroupDef::new(
                group_name.clone(),
                vec![AttrUse::Decl(Arc::new(
                    AttributeDecl::new(QName::local("lang"))
                        .with_type_name(QName::xsd("language")),
                ))],
            ))
            .unwrap();
        collection
            .add_type(TypeDef::Complex(
                ComplexTypeDef::direct(None, vec![AttrUse::GroupRef(group_name)])
                    .named(type_name.clone()),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let recognized = HashSet::new();
        let mut scoper = Scoper::new(&collection, &mut cache, &recognized);
        let scope = scoper.scope_of_name(&type_name).unwrap();

        assert_eq!(scope.attributes.len(), 1);
        assert_eq!(scope.attributes[0].name.local_name, "lang");
    }

    #[test]
    fn test_union_flattening() {
        let inner = QName::namespaced("urn:test", "innerUnion");
        let outer = QName::namespaced("urn:test", "outerUnion");

        let mut collection = SchemaCollection::new();
        collection
            .add_type(TypeDef::Simple(
                SimpleTypeDef::union(vec![QName::xsd("int"), QName::xsd("boolean")])
                    .named(inner.clone()),
            ))
            .unwrap();
        collection
            .add_type(TypeDef::Simple(
                SimpleTypeDef::union(vec![inner, QName::xsd("string")]).named(outer.clone()),
            ))
            .unwrap();

        let mut cache = ScopeCache::new();
        let recognized = HashSet::new();
        let mut scoper = Scoper::new(&collection, &mut cache, &recognized);
        let scope = scoper.scope_of_name(&outer).unwrap();

        match scope.type_info.as_ref() {
            SimpleTypeInfo::Union { members, .. } => assert_eq!(members.len(), 3),
            other => panic!("expected union, got {:?}", other),
        }
    }
}
