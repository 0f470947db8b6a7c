//! Schema Tool CLI
//!
//! Applies mutations to serialized schemas and entities, describes and diffs schemas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use entity_schemas::{
    CatalogSchema, Entity, EntityMutation, EntitySchema, EntitySchemaMutation, ModelConfig,
    ModifyEntitySchemaMutation, NamingConvention,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-tool")]
#[command(about = "Apply, describe and diff entity schemas")]
struct Cli {
    /// Configuration file (defaults to entity-schemas.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold a JSON list of entity schema mutations over an entity schema
    Apply {
        /// Entity schema (JSON); a new schema is started when the file doesn't exist
        #[arg(short, long)]
        schema: PathBuf,
        /// Entity schema mutations (JSON array)
        #[arg(short, long)]
        mutations: PathBuf,
        /// Catalog schema (JSON)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Entity type, required when starting a new schema
        #[arg(short, long)]
        entity_type: Option<String>,
        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply an entity mutation to an entity
    Merge {
        /// Current entity (JSON); omit for a new entity
        #[arg(short, long)]
        entity: Option<PathBuf>,
        /// Entity mutation (JSON)
        #[arg(short, long)]
        mutation: PathBuf,
        /// Validate the result against this entity schema (JSON)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// List attributes, associated data and references with their naming variants
    Describe {
        schema: PathBuf,
    },

    /// Exit with status 1 when two entity schemas differ
    Diff {
        left: PathBuf,
        right: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("writing {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = ModelConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Apply {
            schema,
            mutations,
            catalog,
            entity_type,
            output,
        } => {
            let catalog: CatalogSchema = match catalog {
                Some(path) => read_json(&path)?,
                None => config.schema.new_catalog_schema("catalog"),
            };
            let base: EntitySchema = if schema.exists() {
                read_json(&schema)?
            } else {
                let Some(entity_type) = entity_type.as_deref() else {
                    bail!("{} doesn't exist and no --entity-type was given", schema.display());
                };
                config.schema.new_entity_schema(entity_type)
            };
            let mutations: Vec<EntitySchemaMutation> = read_json(&mutations)?;
            let base = Arc::new(base);
            let envelope = ModifyEntitySchemaMutation::new(base.name(), mutations);
            let next = envelope.apply(&catalog, Arc::clone(&base))?;
            if Arc::ptr_eq(&next, &base) {
                eprintln!("✅ {} v{} - no changes", base.name(), base.version());
            } else {
                eprintln!("✅ {} v{} -> v{}", base.name(), base.version(), next.version());
            }
            write_json(next.as_ref(), output.as_deref())?;
            Ok(0)
        }

        Commands::Merge {
            entity,
            mutation,
            schema,
        } => {
            let base: Option<Arc<Entity>> = match entity {
                Some(path) => Some(Arc::new(read_json(&path)?)),
                None => None,
            };
            let mutation: EntityMutation = read_json(&mutation)?;
            let next = match schema {
                Some(path) => {
                    let schema: EntitySchema = read_json(&path)?;
                    mutation.apply_with_schema(&schema, base.as_ref())?
                }
                None => mutation.apply(base.as_ref())?,
            };
            eprintln!(
                "✅ {} {:?} v{}{}",
                next.entity_type(),
                next.primary_key(),
                next.version(),
                if next.is_dropped() { " (removed)" } else { "" }
            );
            write_json(next.as_ref(), None)?;
            Ok(0)
        }

        Commands::Describe { schema } => {
            let schema: EntitySchema = read_json(&schema)?;
            describe(&schema);
            Ok(0)
        }

        Commands::Diff { left, right } => {
            let left: EntitySchema = read_json(&left)?;
            let right: EntitySchema = read_json(&right)?;
            if left.differs_from(&right) {
                println!("❌ {} v{} differs from {} v{}", left.name(), left.version(), right.name(), right.version());
                Ok(1)
            } else {
                println!("✅ schemas are identical");
                Ok(0)
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(0)
        }
    }
}

fn variants(names: &entity_schemas::NameVariants) -> String {
    NamingConvention::ALL
        .iter()
        .map(|c| names.get(*c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(schema: &EntitySchema) {
    println!("📦 {} v{}", schema.name(), schema.version());
    if let Some(description) = schema.description() {
        println!("   {}", description);
    }
    if let Some(notice) = schema.deprecation_notice() {
        println!("   ⚠️  deprecated: {}", notice);
    }
    let locales: Vec<_> = schema.locales().iter().map(|l| l.to_string()).collect();
    let currencies: Vec<_> = schema.currencies().iter().map(|c| c.to_string()).collect();
    println!("   locales: [{}]  currencies: [{}]", locales.join(", "), currencies.join(", "));
    println!(
        "   hierarchy: {}  prices: {}  evolution: {:?}",
        schema.with_hierarchy(),
        schema.with_price(),
        schema.evolution_modes()
    );

    println!();
    println!("Attributes ({}):", schema.attributes().len());
    for attribute in schema.attributes().values() {
        println!(
            "  • {}: {}{}{}",
            attribute.name(),
            attribute.attribute_type(),
            if attribute.is_localized() { " localized" } else { "" },
            if attribute.is_nullable() { " nullable" } else { "" }
        );
        println!("    └─ {}", variants(attribute.name_variants()));
    }

    println!("Associated data ({}):", schema.associated_data().len());
    for data in schema.associated_data().values() {
        println!("  • {}: {}", data.name(), data.data_type());
        println!("    └─ {}", variants(data.name_variants()));
    }

    println!("References ({}):", schema.references().len());
    for reference in schema.references().values() {
        println!(
            "  • {} -> {} ({:?}){}",
            reference.name(),
            reference.referenced_entity_type(),
            reference.cardinality(),
            if reference.is_faceted() { " faceted" } else if reference.is_indexed() { " indexed" } else { "" }
        );
        println!("    └─ {}", variants(reference.name_variants()));
        for attribute in reference.attributes().values() {
            println!("    • {}: {}", attribute.name(), attribute.attribute_type());
        }
    }

    if !schema.sortable_attribute_compounds().is_empty() {
        println!("Sortable attribute compounds ({}):", schema.sortable_attribute_compounds().len());
        for compound in schema.sortable_attribute_compounds().values() {
            let elements: Vec<_> = compound
                .attribute_elements()
                .iter()
                .map(|e| format!("{} {:?}", e.attribute_name, e.direction))
                .collect();
            println!("  • {} [{}]", compound.name(), elements.join(", "));
        }
    }
}
