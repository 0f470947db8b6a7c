//! Entity Schemas
//!
//! An immutable, versioned model of entity types (schemas) and entity data, evolved
//! through discrete mutations under optimistic concurrency.
//!
//! ## Features
//!
//! - **Immutable Snapshots**: Schemas and entities are never changed in place; every change
//!   produces a new version and leaves the old one usable
//! - **Replay-Safe Mutations**: Creating what exists identically, or removing what is gone,
//!   is a no-op; conflicting definitions fail with a distinct error
//! - **Versioned Containers**: Attributes, associated data, prices and references keep
//!   tombstones and per-record versions, so stale mutations are dropped on merge
//! - **Naming Conventions**: Every schema object is addressable by its camelCase,
//!   PascalCase, snake_case, UPPER_SNAKE_CASE and kebab-case names
//! - **Schema Cache**: Concurrent, version-aware cache in front of a schema source
//!
//! ## Architecture
//!
//! ```text
//! CatalogSchema ── global attributes
//! └── EntitySchema (per entity type)
//!     ├── attributes ──────────────── AttributeSchema
//!     ├── associated data ─────────── AssociatedDataSchema
//!     ├── references ──────────────── ReferenceSchema ── attributes, compounds
//!     └── sortable attribute compounds
//!
//! Entity (per primary key)
//!     ├── Attributes       (AttributeKey → AttributeValue)
//!     ├── AssociatedData   (AssociatedDataKey → AssociatedDataValue)
//!     ├── Prices           (PriceKey → Price)
//!     └── references       (ReferenceKey → Reference)
//! ```
//!
//! Schema changes go through [`mutation`], entity changes through [`data::merge`].

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
mod memo;
pub mod mutation;
pub mod naming;
pub mod schema;
pub mod types;

pub use cache::{SchemaCache, SchemaCacheKey, SchemaFetcher};
pub use config::ModelConfig;
pub use data::{Entity, EntityBuilder, EntityMutation, LocalMutation};
pub use error::{ObjectKind, Result, SchemaError};
pub use mutation::{
    CatalogSchemaMutation, EntitySchemaMutation, ModifyCatalogSchemaMutation, ModifyEntitySchemaMutation,
    SchemaChange,
};
pub use naming::{NameVariants, NamingConvention};
pub use schema::{
    AttributeSchema, CatalogSchema, CatalogSchemaBuilder, EntitySchema, EntitySchemaBuilder, EvolutionMode,
    ReferenceSchema,
};
pub use types::{Currency, Locale, ScalarType, Value, ValueType};
