//! Associated data schema mutations

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ObjectKind, Result, SchemaError};
use crate::naming::{ensure_no_conflict, validate_name};
use crate::schema::AssociatedDataSchema;
use crate::types::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssociatedDataSchemaMutation {
    Create(AssociatedDataSchema),
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
    ModifyType {
        name: String,
        data_type: ValueType,
    },
    SetLocalized {
        name: String,
        localized: bool,
    },
    SetNullable {
        name: String,
        nullable: bool,
    },
    Remove {
        name: String,
    },
}

type AssociatedDataMap = BTreeMap<String, AssociatedDataSchema>;

impl AssociatedDataSchemaMutation {
    pub fn name(&self) -> &str {
        match self {
            AssociatedDataSchemaMutation::Create(schema) => schema.name(),
            AssociatedDataSchemaMutation::ModifyName { name, .. }
            | AssociatedDataSchemaMutation::ModifyDescription { name, .. }
            | AssociatedDataSchemaMutation::ModifyDeprecationNotice { name, .. }
            | AssociatedDataSchemaMutation::ModifyType { name, .. }
            | AssociatedDataSchemaMutation::SetLocalized { name, .. }
            | AssociatedDataSchemaMutation::SetNullable { name, .. }
            | AssociatedDataSchemaMutation::Remove { name } => name,
        }
    }

    pub(crate) fn mutate(&self, existing: &AssociatedDataMap) -> Result<Option<AssociatedDataMap>> {
        match self {
            AssociatedDataSchemaMutation::Create(schema) => {
                let name = schema.name();
                if let Some(current) = existing.get(name) {
                    return if current == schema {
                        Ok(None)
                    } else {
                        Err(SchemaError::conflict(ObjectKind::AssociatedData, name))
                    };
                }
                schema.validate()?;
                ensure_no_conflict(
                    ObjectKind::AssociatedData,
                    name,
                    existing.keys().map(String::as_str),
                )?;
                Ok(Some(with(existing, schema.clone())))
            }
            AssociatedDataSchemaMutation::ModifyName { name, new_name } => {
                let current = lookup(existing, name)?;
                if name == new_name {
                    return Ok(None);
                }
                validate_name(ObjectKind::AssociatedData, new_name)?;
                if existing.contains_key(new_name) {
                    return Err(SchemaError::conflict(ObjectKind::AssociatedData, new_name));
                }
                ensure_no_conflict(
                    ObjectKind::AssociatedData,
                    new_name,
                    existing.keys().map(String::as_str).filter(|n| *n != name.as_str()),
                )?;
                let mut updated = existing.clone();
                updated.remove(name);
                updated.insert(new_name.clone(), current.clone().with_name(new_name));
                Ok(Some(updated))
            }
            AssociatedDataSchemaMutation::ModifyDescription { name, description } => {
                replace(existing, name, |s| s.with_description(description.clone()))
            }
            AssociatedDataSchemaMutation::ModifyDeprecationNotice {
                name,
                deprecation_notice,
            } => replace(existing, name, |s| s.with_deprecation_notice(deprecation_notice.clone())),
            AssociatedDataSchemaMutation::ModifyType { name, data_type } => {
                replace(existing, name, |s| s.with_type(*data_type))
            }
            AssociatedDataSchemaMutation::SetLocalized { name, localized } => {
                replace(existing, name, |s| s.with_localized(*localized))
            }
            AssociatedDataSchemaMutation::SetNullable { name, nullable } => {
                replace(existing, name, |s| s.with_nullable(*nullable))
            }
            AssociatedDataSchemaMutation::Remove { name } => {
                if !existing.contains_key(name) {
                    return Ok(None);
                }
                let mut updated = existing.clone();
                updated.remove(name);
                Ok(Some(updated))
            }
        }
    }
}

fn lookup<'a>(existing: &'a AssociatedDataMap, name: &str) -> Result<&'a AssociatedDataSchema> {
    existing
        .get(name)
        .ok_or_else(|| SchemaError::not_found(ObjectKind::AssociatedData, name))
}

fn with(existing: &AssociatedDataMap, schema: AssociatedDataSchema) -> AssociatedDataMap {
    let mut updated = existing.clone();
    updated.insert(schema.name().to_string(), schema);
    updated
}

fn replace(
    existing: &AssociatedDataMap,
    name: &str,
    change: impl FnOnce(AssociatedDataSchema) -> AssociatedDataSchema,
) -> Result<Option<AssociatedDataMap>> {
    let current = lookup(existing, name)?;
    let updated = change(current.clone());
    if &updated == current {
        return Ok(None);
    }
    updated.validate()?;
    Ok(Some(with(existing, updated)))
}
