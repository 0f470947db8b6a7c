//! Sortable attribute compounds: composite sort keys over several attributes

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::attribute::AttributeSchema;
use crate::error::{ObjectKind, Result, SchemaError};
use crate::memo::Memo;
use crate::naming::{validate_name, NameVariants, NamingConvention};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderBehaviour {
    NullsFirst,
    #[default]
    NullsLast,
}

/// One attribute of a compound with its ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeElement {
    pub attribute_name: String,
    #[serde(default)]
    pub direction: OrderDirection,
    #[serde(default)]
    pub behaviour: OrderBehaviour,
}

impl AttributeElement {
    pub fn new(attribute_name: impl Into<String>, direction: OrderDirection, behaviour: OrderBehaviour) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            direction,
            behaviour,
        }
    }

    /// Ascending, nulls last
    pub fn asc(attribute_name: impl Into<String>) -> Self {
        Self::new(attribute_name, OrderDirection::Asc, OrderBehaviour::NullsLast)
    }

    /// Descending, nulls last
    pub fn desc(attribute_name: impl Into<String>) -> Self {
        Self::new(attribute_name, OrderDirection::Desc, OrderBehaviour::NullsLast)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortableAttributeCompoundSchema {
    pub(crate) name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) deprecation_notice: Option<String>,
    pub(crate) attribute_elements: Vec<AttributeElement>,
    #[serde(skip)]
    variants: Memo<NameVariants>,
}

impl SortableAttributeCompoundSchema {
    pub fn new(name: impl Into<String>, attribute_elements: Vec<AttributeElement>) -> Self {
        Self {
            name: name.into(),
            description: None,
            deprecation_notice: None,
            attribute_elements,
            variants: Memo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn deprecation_notice(&self) -> Option<&str> {
        self.deprecation_notice.as_deref()
    }

    pub fn attribute_elements(&self) -> &[AttributeElement] {
        &self.attribute_elements
    }

    pub fn uses_attribute(&self, attribute_name: &str) -> bool {
        self.attribute_elements
            .iter()
            .any(|e| e.attribute_name == attribute_name)
    }

    pub fn name_variants(&self) -> &NameVariants {
        self.variants.get_or_init(|| NameVariants::generate(&self.name))
    }

    pub fn name_variant(&self, convention: NamingConvention) -> &str {
        self.name_variants().get(convention)
    }

    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Memo::new(),
            ..self
        }
    }

    pub fn with_description(self, description: Option<String>) -> Self {
        Self { description, ..self }
    }

    pub fn with_deprecation_notice(self, deprecation_notice: Option<String>) -> Self {
        Self {
            deprecation_notice,
            ..self
        }
    }

    /// Validate against the attributes of the owning entity or reference schema
    pub fn validate(&self, attributes: &BTreeMap<String, AttributeSchema>) -> Result<()> {
        validate_name(ObjectKind::SortableAttributeCompound, &self.name)?;
        if self.attribute_elements.len() < 2 {
            return Err(SchemaError::invariant(format!(
                "sortable attribute compound `{}` needs at least two attributes",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for element in &self.attribute_elements {
            if !seen.insert(element.attribute_name.as_str()) {
                return Err(SchemaError::invariant(format!(
                    "sortable attribute compound `{}` lists attribute `{}` twice",
                    self.name, element.attribute_name
                )));
            }
            let attribute = attributes
                .get(&element.attribute_name)
                .ok_or_else(|| SchemaError::not_found(ObjectKind::Attribute, &element.attribute_name))?;
            if attribute.attribute_type().is_array() {
                return Err(SchemaError::invariant(format!(
                    "sortable attribute compound `{}` cannot use array attribute `{}`",
                    self.name, element.attribute_name
                )));
            }
        }
        Ok(())
    }
}
