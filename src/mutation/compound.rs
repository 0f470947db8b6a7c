//! Sortable attribute compound mutations, on entity and reference schemas

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result, SchemaError};
use crate::naming::{ensure_no_conflict, validate_name};
use crate::schema::{AttributeSchema, SortableAttributeCompoundSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortableAttributeCompoundSchemaMutation {
    Create(SortableAttributeCompoundSchema),
    ModifyName {
        name: String,
        new_name: String,
    },
    ModifyDescription {
        name: String,
        description: Option<String>,
    },
    ModifyDeprecationNotice {
        name: String,
        deprecation_notice: Option<String>,
    },
    Remove {
        name: String,
    },
}

type CompoundMap = BTreeMap<String, SortableAttributeCompoundSchema>;

impl SortableAttributeCompoundSchemaMutation {
    pub fn name(&self) -> &str {
        match self {
            SortableAttributeCompoundSchemaMutation::Create(compound) => compound.name(),
            SortableAttributeCompoundSchemaMutation::ModifyName { name, .. }
            | SortableAttributeCompoundSchemaMutation::ModifyDescription { name, .. }
            | SortableAttributeCompoundSchemaMutation::ModifyDeprecationNotice { name, .. }
            | SortableAttributeCompoundSchemaMutation::Remove { name } => name,
        }
    }

    pub(crate) fn mutate(
        &self,
        attributes: &BTreeMap<String, AttributeSchema>,
        compounds: &CompoundMap,
    ) -> Result<Option<CompoundMap>> {
        let kind = ObjectKind::SortableAttributeCompound;
        let taken = || attributes.keys().chain(compounds.keys()).map(String::as_str);
        match self {
            SortableAttributeCompoundSchemaMutation::Create(compound) => {
                let name = compound.name();
                if let Some(existing) = compounds.get(name) {
                    return if existing == compound {
                        Ok(None)
                    } else {
                        Err(SchemaError::conflict(kind, name))
                    };
                }
                if attributes.contains_key(name) {
                    return Err(SchemaError::conflict(kind, name));
                }
                compound.validate(attributes)?;
                ensure_no_conflict(kind, name, taken())?;
                let mut updated = compounds.clone();
                updated.insert(name.to_string(), compound.clone());
                Ok(Some(updated))
            }
            SortableAttributeCompoundSchemaMutation::ModifyName { name, new_name } => {
                let existing = lookup(compounds, name)?;
                if name == new_name {
                    return Ok(None);
                }
                validate_name(kind, new_name)?;
                if attributes.contains_key(new_name) || compounds.contains_key(new_name) {
                    return Err(SchemaError::conflict(kind, new_name));
                }
                ensure_no_conflict(kind, new_name, taken().filter(|n| *n != name.as_str()))?;
                let mut updated = compounds.clone();
                updated.remove(name);
                updated.insert(new_name.clone(), existing.clone().with_name(new_name));
                Ok(Some(updated))
            }
            SortableAttributeCompoundSchemaMutation::ModifyDescription { name, description } => {
                replace(compounds, name, |c| c.with_description(description.clone()))
            }
            SortableAttributeCompoundSchemaMutation::ModifyDeprecationNotice {
                name,
                deprecation_notice,
            } => replace(compounds, name, |c| c.with_deprecation_notice(deprecation_notice.clone())),
            SortableAttributeCompoundSchemaMutation::Remove { name } => {
                if !compounds.contains_key(name) {
                    return Ok(None);
                }
                let mut updated = compounds.clone();
                updated.remove(name);
                Ok(Some(updated))
            }
        }
    }
}

fn lookup<'a>(compounds: &'a CompoundMap, name: &str) -> Result<&'a SortableAttributeCompoundSchema> {
    compounds
        .get(name)
        .ok_or_else(|| SchemaError::not_found(ObjectKind::SortableAttributeCompound, name))
}

fn replace(
    compounds: &CompoundMap,
    name: &str,
    change: impl FnOnce(SortableAttributeCompoundSchema) -> SortableAttributeCompoundSchema,
) -> Result<Option<CompoundMap>> {
    let existing = lookup(compounds, name)?;
    let updated = change(existing.clone());
    if &updated == existing {
        return Ok(None);
    }
    let mut compounds = compounds.clone();
    compounds.insert(name.to_string(), updated);
    Ok(Some(compounds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeElement;
    use crate::types::ScalarType;

    fn attributes() -> BTreeMap<String, AttributeSchema> {
        [
            AttributeSchema::new("code", ScalarType::String),
            AttributeSchema::new("priority", ScalarType::Long),
        ]
        .into_iter()
        .map(|a| (a.name().to_string(), a))
        .collect()
    }

    fn compound(name: &str) -> SortableAttributeCompoundSchema {
        SortableAttributeCompoundSchema::new(
            name,
            vec![AttributeElement::asc("code"), AttributeElement::desc("priority")],
        )
    }

    #[test]
    fn test_create_replay_and_conflict() {
        let attrs = attributes();
        let create = SortableAttributeCompoundSchemaMutation::Create(compound("codePriority"));
        let created = create.mutate(&attrs, &BTreeMap::new()).unwrap().unwrap();
        assert!(create.mutate(&attrs, &created).unwrap().is_none());

        let other = SortableAttributeCompoundSchema::new(
            "codePriority",
            vec![AttributeElement::desc("code"), AttributeElement::desc("priority")],
        );
        let conflicting = SortableAttributeCompoundSchemaMutation::Create(other);
        assert!(conflicting.mutate(&attrs, &created).unwrap_err().is_conflict());
    }

    #[test]
    fn test_shares_namespace_with_attributes() {
        let create = SortableAttributeCompoundSchemaMutation::Create(compound("code"));
        assert!(create.mutate(&attributes(), &BTreeMap::new()).unwrap_err().is_conflict());
    }

    #[test]
    fn test_rename_and_remove() {
        let attrs = attributes();
        let compounds = BTreeMap::from([("codePriority".to_string(), compound("codePriority"))]);
        let rename = SortableAttributeCompoundSchemaMutation::ModifyName {
            name: "codePriority".into(),
            new_name: "byCode".into(),
        };
        let renamed = rename.mutate(&attrs, &compounds).unwrap().unwrap();
        assert!(renamed.contains_key("byCode"));

        let remove = SortableAttributeCompoundSchemaMutation::Remove {
            name: "codePriority".into(),
        };
        assert!(remove.mutate(&attrs, &renamed).unwrap().is_none());
    }
}
