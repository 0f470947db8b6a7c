//! Builders: editable surfaces over immutable schema snapshots
//!
//! A builder holds the snapshot it was opened on plus the mutations recorded so far. Each
//! operation turns the wanted state into the minimal mutations reaching it and applies
//! them right away, so invalid edits fail where they are made. Mutations that change
//! nothing are not recorded. The snapshot itself is never touched.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::mutation::{
    AssociatedDataSchemaMutation, AttributeSchemaMutation, CatalogSchemaMutation, EntitySchemaMutation,
    ModifyCatalogSchemaMutation, ModifyEntitySchemaMutation, ReferenceSchemaMutation,
    SortableAttributeCompoundSchemaMutation,
};
use crate::types::{Currency, Locale};

use super::{
    AssociatedDataSchema, AttributeSchema, Cardinality, CatalogEvolutionMode, CatalogSchema, EntitySchema,
    EvolutionMode, ReferenceSchema, SortableAttributeCompoundSchema,
};

/// Mutations turning `existing` into `target`; a missing attribute is created
///
/// Relaxing changes go first and tightening ones last so every intermediate step stays
/// valid.
fn attribute_changes(existing: Option<&AttributeSchema>, target: &AttributeSchema) -> Vec<AttributeSchemaMutation> {
    let Some(existing) = existing else {
        return vec![AttributeSchemaMutation::Create(target.clone())];
    };
    let name = target.name().to_string();
    let mut changes = Vec::new();
    if existing.description() != target.description() {
        changes.push(AttributeSchemaMutation::ModifyDescription {
            name: name.clone(),
            description: target.description().map(str::to_string),
        });
    }
    if existing.deprecation_notice() != target.deprecation_notice() {
        changes.push(AttributeSchemaMutation::ModifyDeprecationNotice {
            name: name.clone(),
            deprecation_notice: target.deprecation_notice().map(str::to_string),
        });
    }
    if target.is_localized() && !existing.is_localized() {
        changes.push(AttributeSchemaMutation::SetLocalized {
            name: name.clone(),
            localized: true,
        });
    }
    if !target.is_sortable() && existing.is_sortable() {
        changes.push(AttributeSchemaMutation::SetSortable {
            name: name.clone(),
            sortable: false,
        });
    }
    if existing.attribute_type() != target.attribute_type()
        || existing.indexed_decimal_places() != target.indexed_decimal_places()
    {
        changes.push(AttributeSchemaMutation::ModifyType {
            name: name.clone(),
            attribute_type: target.attribute_type(),
            indexed_decimal_places: target.indexed_decimal_places(),
        });
    }
    if existing.default_value() != target.default_value() {
        changes.push(AttributeSchemaMutation::ModifyDefaultValue {
            name: name.clone(),
            default_value: target.default_value().cloned(),
        });
    }
    if existing.is_filterable() != target.is_filterable() {
        changes.push(AttributeSchemaMutation::SetFilterable {
            name: name.clone(),
            filterable: target.is_filterable(),
        });
    }
    if target.is_sortable() && !existing.is_sortable() {
        changes.push(AttributeSchemaMutation::SetSortable {
            name: name.clone(),
            sortable: true,
        });
    }
    if existing.uniqueness() != target.uniqueness() {
        changes.push(AttributeSchemaMutation::SetUnique {
            name: name.clone(),
            uniqueness: target.uniqueness(),
        });
    }
    if let Some(uniqueness) = target.global_uniqueness() {
        if existing.global_uniqueness() != Some(uniqueness) {
            changes.push(AttributeSchemaMutation::SetGloballyUnique {
                name: name.clone(),
                uniqueness,
            });
        }
    }
    if existing.is_nullable() != target.is_nullable() {
        changes.push(AttributeSchemaMutation::SetNullable {
            name: name.clone(),
            nullable: target.is_nullable(),
        });
    }
    if existing.is_representative() != target.is_representative() {
        changes.push(AttributeSchemaMutation::SetRepresentative {
            name: name.clone(),
            representative: target.is_representative(),
        });
    }
    if !target.is_localized() && existing.is_localized() {
        changes.push(AttributeSchemaMutation::SetLocalized { name, localized: false });
    }
    changes
}

fn associated_data_changes(
    existing: Option<&AssociatedDataSchema>,
    target: &AssociatedDataSchema,
) -> Vec<AssociatedDataSchemaMutation> {
    let Some(existing) = existing else {
        return vec![AssociatedDataSchemaMutation::Create(target.clone())];
    };
    let name = target.name().to_string();
    let mut changes = Vec::new();
    if existing.description() != target.description() {
        changes.push(AssociatedDataSchemaMutation::ModifyDescription {
            name: name.clone(),
            description: target.description().map(str::to_string),
        });
    }
    if existing.deprecation_notice() != target.deprecation_notice() {
        changes.push(AssociatedDataSchemaMutation::ModifyDeprecationNotice {
            name: name.clone(),
            deprecation_notice: target.deprecation_notice().map(str::to_string),
        });
    }
    if existing.data_type() != target.data_type() {
        changes.push(AssociatedDataSchemaMutation::ModifyType {
            name: name.clone(),
            data_type: target.data_type(),
        });
    }
    if existing.is_localized() != target.is_localized() {
        changes.push(AssociatedDataSchemaMutation::SetLocalized {
            name: name.clone(),
            localized: target.is_localized(),
        });
    }
    if existing.is_nullable() != target.is_nullable() {
        changes.push(AssociatedDataSchemaMutation::SetNullable {
            name,
            nullable: target.is_nullable(),
        });
    }
    changes
}

/// A compound with different elements is recreated, the rest is modified in place
fn compound_changes(
    existing: Option<&SortableAttributeCompoundSchema>,
    target: &SortableAttributeCompoundSchema,
) -> Vec<SortableAttributeCompoundSchemaMutation> {
    let name = target.name().to_string();
    match existing {
        None => vec![SortableAttributeCompoundSchemaMutation::Create(target.clone())],
        Some(existing) if existing.attribute_elements() != target.attribute_elements() => vec![
            SortableAttributeCompoundSchemaMutation::Remove { name },
            SortableAttributeCompoundSchemaMutation::Create(target.clone()),
        ],
        Some(existing) => {
            let mut changes = Vec::new();
            if existing.description() != target.description() {
                changes.push(SortableAttributeCompoundSchemaMutation::ModifyDescription {
                    name: name.clone(),
                    description: target.description().map(str::to_string),
                });
            }
            if existing.deprecation_notice() != target.deprecation_notice() {
                changes.push(SortableAttributeCompoundSchemaMutation::ModifyDeprecationNotice {
                    name,
                    deprecation_notice: target.deprecation_notice().map(str::to_string),
                });
            }
            changes
        }
    }
}

/// Edits of one reference, collected while an [`EntitySchemaBuilder`] defines it
#[derive(Debug)]
pub struct ReferenceSchemaEditor {
    reference: ReferenceSchema,
    changes: Vec<ReferenceSchemaMutation>,
}

impl ReferenceSchemaEditor {
    fn new(reference: ReferenceSchema) -> Self {
        Self {
            reference,
            changes: Vec::new(),
        }
    }

    fn name(&self) -> String {
        self.reference.name().to_string()
    }

    /// The reference as it was when editing started
    pub fn reference(&self) -> &ReferenceSchema {
        &self.reference
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::ModifyDescription {
            name: self.name(),
            description: Some(description.into()),
        });
        self
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::ModifyDeprecationNotice {
            name: self.name(),
            deprecation_notice: Some(notice.into()),
        });
        self
    }

    pub fn not_deprecated(&mut self) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::ModifyDeprecationNotice {
            name: self.name(),
            deprecation_notice: None,
        });
        self
    }

    pub fn with_group_type(&mut self, group_type: impl Into<String>, managed: bool) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::ModifyReferencedGroupType {
            name: self.name(),
            referenced_group_type: Some(group_type.into()),
            managed,
        });
        self
    }

    pub fn without_group_type(&mut self) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::ModifyReferencedGroupType {
            name: self.name(),
            referenced_group_type: None,
            managed: false,
        });
        self
    }

    pub fn indexed(&mut self) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::SetIndexed {
            name: self.name(),
            indexed: true,
        });
        self
    }

    pub fn non_indexed(&mut self) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::SetIndexed {
            name: self.name(),
            indexed: false,
        });
        self
    }

    /// Faceted references are indexed too
    pub fn faceted(&mut self) -> &mut Self {
        self.indexed();
        self.changes.push(ReferenceSchemaMutation::SetFaceted {
            name: self.name(),
            faceted: true,
        });
        self
    }

    pub fn non_faceted(&mut self) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::SetFaceted {
            name: self.name(),
            faceted: false,
        });
        self
    }

    pub fn with_attribute(&mut self, attribute: AttributeSchema) -> &mut Self {
        let name = self.name();
        let existing = self.reference.attribute(attribute.name());
        let changes = attribute_changes(existing, &attribute);
        self.changes
            .extend(changes.into_iter().map(|mutation| ReferenceSchemaMutation::Attribute {
                name: name.clone(),
                mutation,
            }));
        self
    }

    pub fn without_attribute(&mut self, attribute: &str) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::Attribute {
            name: self.name(),
            mutation: AttributeSchemaMutation::Remove {
                name: attribute.to_string(),
            },
        });
        self
    }

    pub fn with_sortable_attribute_compound(&mut self, compound: SortableAttributeCompoundSchema) -> &mut Self {
        let name = self.name();
        let existing = self.reference.sortable_attribute_compound(compound.name());
        let changes = compound_changes(existing, &compound);
        self.changes.extend(
            changes
                .into_iter()
                .map(|mutation| ReferenceSchemaMutation::SortableAttributeCompound {
                    name: name.clone(),
                    mutation,
                }),
        );
        self
    }

    pub fn without_sortable_attribute_compound(&mut self, compound: &str) -> &mut Self {
        self.changes.push(ReferenceSchemaMutation::SortableAttributeCompound {
            name: self.name(),
            mutation: SortableAttributeCompoundSchemaMutation::Remove {
                name: compound.to_string(),
            },
        });
        self
    }
}

/// Editable surface over an entity schema snapshot
#[derive(Debug, Clone)]
pub struct EntitySchemaBuilder {
    catalog: Arc<CatalogSchema>,
    base: Arc<EntitySchema>,
    current: Arc<EntitySchema>,
    mutations: Vec<EntitySchemaMutation>,
}

impl EntitySchema {
    /// Open this snapshot for write within `catalog`
    pub fn open_for_write(self: &Arc<Self>, catalog: Arc<CatalogSchema>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(catalog, Arc::clone(self))
    }
}

impl EntitySchemaBuilder {
    pub fn new(catalog: Arc<CatalogSchema>, base: Arc<EntitySchema>) -> Self {
        Self {
            catalog,
            current: Arc::clone(&base),
            base,
            mutations: Vec::new(),
        }
    }

    /// The schema as it would look if built now
    pub fn current(&self) -> &EntitySchema {
        &self.current
    }

    pub fn mutations(&self) -> &[EntitySchemaMutation] {
        &self.mutations
    }

    /// Apply one mutation eagerly, recording it only if it changed something
    pub fn mutate(&mut self, mutation: EntitySchemaMutation) -> Result<&mut Self> {
        let next = mutation.apply(&self.catalog, Arc::clone(&self.current))?;
        if !Arc::ptr_eq(&next, &self.current) {
            self.current = next;
            self.mutations.push(mutation);
        }
        Ok(self)
    }

    /// Apply a batch on top of `from`, returning the result and the effective mutations
    fn stage(
        &self,
        from: &Arc<EntitySchema>,
        mutations: impl IntoIterator<Item = EntitySchemaMutation>,
    ) -> Result<(Arc<EntitySchema>, Vec<EntitySchemaMutation>)> {
        let mut current = Arc::clone(from);
        let mut applied = Vec::new();
        for mutation in mutations {
            let next = mutation.apply(&self.catalog, Arc::clone(&current))?;
            if !Arc::ptr_eq(&next, &current) {
                current = next;
                applied.push(mutation);
            }
        }
        Ok((current, applied))
    }

    fn commit(&mut self, current: Arc<EntitySchema>, applied: Vec<EntitySchemaMutation>) -> &mut Self {
        self.current = current;
        self.mutations.extend(applied);
        self
    }

    /// Apply every mutation or none of them
    fn mutate_all(&mut self, mutations: impl IntoIterator<Item = EntitySchemaMutation>) -> Result<&mut Self> {
        let (current, applied) = self.stage(&self.current, mutations)?;
        Ok(self.commit(current, applied))
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::ModifyDescription {
            description: Some(description.into()),
        })
    }

    pub fn deprecated(&mut self, notice: impl Into<String>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::ModifyDeprecationNotice {
            deprecation_notice: Some(notice.into()),
        })
    }

    pub fn not_deprecated(&mut self) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::ModifyDeprecationNotice {
            deprecation_notice: None,
        })
    }

    /// Reject anything the schema doesn't define
    pub fn verify_schema_strictly(&mut self) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::DisallowEvolutionModes {
            modes: EvolutionMode::ALL.into_iter().collect(),
        })
    }

    /// Reject undefined data except for the given evolution modes
    pub fn verify_schema_but_allow(&mut self, modes: impl IntoIterator<Item = EvolutionMode>) -> Result<&mut Self> {
        let allowed: BTreeSet<EvolutionMode> = modes.into_iter().collect();
        let disallowed = EvolutionMode::ALL.into_iter().filter(|m| !allowed.contains(m)).collect();
        self.mutate_all([
            EntitySchemaMutation::DisallowEvolutionModes { modes: disallowed },
            EntitySchemaMutation::AllowEvolutionModes { modes: allowed },
        ])
    }

    pub fn verify_schema_but_create_on_the_fly(&mut self) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::AllowEvolutionModes {
            modes: EvolutionMode::ALL.into_iter().collect(),
        })
    }

    pub fn with_locales(&mut self, locales: impl IntoIterator<Item = Locale>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::AllowLocales {
            locales: locales.into_iter().collect(),
        })
    }

    pub fn without_locales(&mut self, locales: impl IntoIterator<Item = Locale>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::DisallowLocales {
            locales: locales.into_iter().collect(),
        })
    }

    pub fn with_currencies(&mut self, currencies: impl IntoIterator<Item = Currency>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::AllowCurrencies {
            currencies: currencies.into_iter().collect(),
        })
    }

    pub fn without_currencies(&mut self, currencies: impl IntoIterator<Item = Currency>) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::DisallowCurrencies {
            currencies: currencies.into_iter().collect(),
        })
    }

    pub fn with_generated_primary_key(&mut self, generated: bool) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::SetWithGeneratedPrimaryKey {
            with_generated_primary_key: generated,
        })
    }

    pub fn with_hierarchy(&mut self, hierarchy: bool) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::SetWithHierarchy {
            with_hierarchy: hierarchy,
        })
    }

    pub fn with_price(&mut self, indexed_price_places: u32) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::SetWithPrice {
            with_price: true,
            indexed_price_places,
        })
    }

    pub fn without_price(&mut self) -> Result<&mut Self> {
        let indexed_price_places = self.current.indexed_price_places();
        self.mutate(EntitySchemaMutation::SetWithPrice {
            with_price: false,
            indexed_price_places,
        })
    }

    /// Create the attribute or bring the existing one to the given definition
    pub fn with_attribute(&mut self, attribute: AttributeSchema) -> Result<&mut Self> {
        let changes = attribute_changes(self.current.attribute(attribute.name()), &attribute);
        self.mutate_all(changes.into_iter().map(EntitySchemaMutation::Attribute))
    }

    /// Link a catalog global attribute
    pub fn with_global_attribute(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::Attribute(AttributeSchemaMutation::UseGlobal {
            name: name.to_string(),
        }))
    }

    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::Attribute(AttributeSchemaMutation::Remove {
            name: name.to_string(),
        }))
    }

    pub fn with_associated_data(&mut self, associated_data: AssociatedDataSchema) -> Result<&mut Self> {
        let changes = associated_data_changes(
            self.current.associated_data_schema(associated_data.name()),
            &associated_data,
        );
        self.mutate_all(changes.into_iter().map(EntitySchemaMutation::AssociatedData))
    }

    pub fn without_associated_data(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::AssociatedData(
            AssociatedDataSchemaMutation::Remove { name: name.to_string() },
        ))
    }

    /// Create or reshape a reference, then apply the edits made in `edit`
    pub fn with_reference(
        &mut self,
        name: &str,
        entity_type: &str,
        managed: bool,
        cardinality: Cardinality,
        edit: impl FnOnce(&mut ReferenceSchemaEditor),
    ) -> Result<&mut Self> {
        let mut changes = Vec::new();
        match self.current.reference(name) {
            None => changes.push(ReferenceSchemaMutation::Create(ReferenceSchema::new(
                name,
                entity_type,
                managed,
                cardinality,
            ))),
            Some(existing) => {
                if existing.cardinality() != cardinality {
                    changes.push(ReferenceSchemaMutation::ModifyCardinality {
                        name: name.to_string(),
                        cardinality,
                    });
                }
                if existing.referenced_entity_type() != entity_type
                    || existing.is_referenced_entity_type_managed() != managed
                {
                    changes.push(ReferenceSchemaMutation::ModifyReferencedEntityType {
                        name: name.to_string(),
                        referenced_entity_type: entity_type.to_string(),
                        managed,
                    });
                }
            }
        }
        let (reshaped, mut applied) =
            self.stage(&self.current, changes.into_iter().map(EntitySchemaMutation::Reference))?;

        let snapshot = match reshaped.reference(name) {
            Some(reference) => reference.clone(),
            None => ReferenceSchema::new(name, entity_type, managed, cardinality),
        };
        let mut editor = ReferenceSchemaEditor::new(snapshot);
        edit(&mut editor);
        let (edited, edits) =
            self.stage(&reshaped, editor.changes.into_iter().map(EntitySchemaMutation::Reference))?;
        applied.extend(edits);
        Ok(self.commit(edited, applied))
    }

    pub fn without_reference(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::Reference(ReferenceSchemaMutation::Remove {
            name: name.to_string(),
        }))
    }

    pub fn with_sortable_attribute_compound(&mut self, compound: SortableAttributeCompoundSchema) -> Result<&mut Self> {
        let changes = compound_changes(self.current.sortable_attribute_compound(compound.name()), &compound);
        self.mutate_all(changes.into_iter().map(EntitySchemaMutation::SortableAttributeCompound))
    }

    pub fn without_sortable_attribute_compound(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(EntitySchemaMutation::SortableAttributeCompound(
            SortableAttributeCompoundSchemaMutation::Remove { name: name.to_string() },
        ))
    }

    /// Fold the recorded mutations over the base snapshot
    pub fn build(&self) -> Result<Arc<EntitySchema>> {
        match self.to_mutation() {
            Some(mutation) => mutation.apply(&self.catalog, Arc::clone(&self.base)),
            None => Ok(Arc::clone(&self.base)),
        }
    }

    /// The minimal mutation bringing a copy of the base snapshot up to date, `None` when
    /// nothing changed
    pub fn to_mutation(&self) -> Option<ModifyEntitySchemaMutation> {
        (!self.mutations.is_empty())
            .then(|| ModifyEntitySchemaMutation::new(self.base.name(), self.mutations.clone()))
    }
}

/// Editable surface over a catalog schema snapshot
#[derive(Debug, Clone)]
pub struct CatalogSchemaBuilder {
    base: Arc<CatalogSchema>,
    current: Arc<CatalogSchema>,
    mutations: Vec<CatalogSchemaMutation>,
}

impl CatalogSchema {
    pub fn open_for_write(self: &Arc<Self>) -> CatalogSchemaBuilder {
        CatalogSchemaBuilder::new(Arc::clone(self))
    }
}

impl CatalogSchemaBuilder {
    pub fn new(base: Arc<CatalogSchema>) -> Self {
        Self {
            current: Arc::clone(&base),
            base,
            mutations: Vec::new(),
        }
    }

    pub fn current(&self) -> &CatalogSchema {
        &self.current
    }

    pub fn mutations(&self) -> &[CatalogSchemaMutation] {
        &self.mutations
    }

    pub fn mutate(&mut self, mutation: CatalogSchemaMutation) -> Result<&mut Self> {
        let next = mutation.apply(Arc::clone(&self.current))?;
        if !Arc::ptr_eq(&next, &self.current) {
            self.current = next;
            self.mutations.push(mutation);
        }
        Ok(self)
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> Result<&mut Self> {
        self.mutate(CatalogSchemaMutation::ModifyDescription {
            description: Some(description.into()),
        })
    }

    pub fn verify_catalog_schema_strictly(&mut self) -> Result<&mut Self> {
        self.mutate(CatalogSchemaMutation::DisallowEvolutionModes {
            modes: CatalogEvolutionMode::ALL.into_iter().collect(),
        })
    }

    pub fn verify_catalog_schema_but_create_on_the_fly(&mut self) -> Result<&mut Self> {
        self.mutate(CatalogSchemaMutation::AllowEvolutionModes {
            modes: CatalogEvolutionMode::ALL.into_iter().collect(),
        })
    }

    /// Create the global attribute or bring the existing one to the given definition
    pub fn with_attribute(&mut self, attribute: AttributeSchema) -> Result<&mut Self> {
        let mut current = Arc::clone(&self.current);
        let mut applied = Vec::new();
        for change in attribute_changes(self.current.attribute(attribute.name()), &attribute) {
            let mutation = CatalogSchemaMutation::Attribute(change);
            let next = mutation.apply(Arc::clone(&current))?;
            if !Arc::ptr_eq(&next, &current) {
                current = next;
                applied.push(mutation);
            }
        }
        self.current = current;
        self.mutations.extend(applied);
        Ok(self)
    }

    pub fn without_attribute(&mut self, name: &str) -> Result<&mut Self> {
        self.mutate(CatalogSchemaMutation::Attribute(AttributeSchemaMutation::Remove {
            name: name.to_string(),
        }))
    }

    pub fn build(&self) -> Result<Arc<CatalogSchema>> {
        match self.to_mutation() {
            Some(mutation) => mutation.apply(Arc::clone(&self.base)),
            None => Ok(Arc::clone(&self.base)),
        }
    }

    pub fn to_mutation(&self) -> Option<ModifyCatalogSchemaMutation> {
        (!self.mutations.is_empty()).then(|| ModifyCatalogSchemaMutation::new(self.mutations.clone()))
    }
}
