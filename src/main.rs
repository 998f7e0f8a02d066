//! CastleVantress block helper
//!
//! Fills in missing factory recipes of a partially configured CastleVantress
//! block and writes each factory's ingredients and output into its companion
//! constant combinators.

mod blueprint;
mod combinator;
mod config;
mod db;
mod error;
mod extract;
mod grid;
mod metadata;
mod models;
mod naming;
mod propagate;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::blueprint::{Blueprint, BlueprintDocument};
use crate::combinator::SyncReport;
use crate::config::BlockLayout;
use crate::grid::{Direction, Grid};
use crate::metadata::{MetadataIndex, RecipeSource};
use crate::propagate::Assignment;

#[derive(Parser)]
#[command(name = "cv-extend")]
#[command(about = "Recipe inference and combinator sync for CastleVantress blocks")]
struct Cli {
    /// Path to the SQLite game database
    #[arg(short, long, default_value = "game_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract items, recipes and machines from a directory of JSON data dumps
    Extract {
        /// Directory containing data dump files
        data_dir: PathBuf,

        /// Clear existing data before extraction
        #[arg(long)]
        clear: bool,
    },

    /// Guess missing recipes across the 80-factory grid, then set all combinators
    Extend {
        /// Blueprint JSON file
        blueprint: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Propagation direction, repeat for several
        #[arg(short = 'D', long = "direction", value_enum, default_value = "south")]
        directions: Vec<Direction>,

        /// Entity name of the block's factories
        #[arg(long)]
        factory: Option<String>,
    },

    /// Set the combinators of every factory that already has a recipe
    Combinators {
        /// Blueprint JSON file
        blueprint: PathBuf,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Entity name of the block's factories
        #[arg(long)]
        factory: Option<String>,
    },

    /// Show ingredients, results and guessed output of a recipe
    Recipe {
        /// Recipe name
        name: String,
    },

    /// List all visible items in in-game display order
    ListItems {
        /// Only show the items either side of this one
        #[arg(long)]
        around: Option<String>,
    },

    /// Initialize empty database with schema
    Init,

    /// Load sample data for testing (without a game data dump)
    LoadSample,
}

/// Initialize logging to stderr. `RUST_LOG` overrides the default `info` filter.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Extract { data_dir, clear } => {
            if clear {
                info!("Clearing existing data...");
                db::clear_extracted_data(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &data_dir)?;
            println!("{}", stats);
        }

        Commands::Extend {
            blueprint,
            output,
            directions,
            factory,
        } => {
            let metadata = load_metadata(&conn)?;
            let layout = layout_for(factory);
            let mut document = open_blueprint(&blueprint, &metadata)?;

            let (assignments, report) =
                extend_block(&mut document.blueprint, &metadata, &layout, &directions)?;
            for a in &assignments {
                info!("{} -> {} ({:?}): {}", a.source, a.target, a.direction, a.recipe);
            }
            info!(
                "Assigned {} recipes, synced {} factories",
                assignments.len(),
                report.synced
            );
            save_blueprint(&document, output.as_deref())?;
        }

        Commands::Combinators {
            blueprint,
            output,
            factory,
        } => {
            let metadata = load_metadata(&conn)?;
            let layout = layout_for(factory);
            let mut document = open_blueprint(&blueprint, &metadata)?;

            let report = combinator::sync_block(&mut document.blueprint, &metadata, &layout)?;
            info!("Synced {} factories", report.synced);
            save_blueprint(&document, output.as_deref())?;
        }

        Commands::Recipe { name } => {
            let metadata = load_metadata(&conn)?;
            let Some(recipe) = metadata.recipe(&name) else {
                println!("Recipe '{}' not found", name);
                return Ok(());
            };

            println!("Recipe: {}", recipe.name);
            if let Some(category) = db::recipe_category(&conn, &name)? {
                println!("  Category: {}", category);
            }
            if let Some(ingredients) = metadata.ingredients_of(&name) {
                println!("  Ingredients:");
                for i in ingredients {
                    println!("    {} x {} ({})", i.name, i.amount, i.kind.as_str());
                }
            }
            println!("  Results:");
            for r in &recipe.results {
                let hidden = if metadata.item_is_hidden(r.name()) { " [hidden]" } else { "" };
                match r {
                    models::ResultDescriptor::Bare(item) => println!("    {}{}", item, hidden),
                    models::ResultDescriptor::Counted { name, amount, kind } => {
                        println!("    {} x {} ({}){}", name, amount, kind.as_str(), hidden)
                    }
                }
            }
            if let Ok(output) = combinator::guess_primary_output(&name, &metadata) {
                println!("  Primary output: {}", output.name);
            }
        }

        Commands::ListItems { around } => {
            let metadata = load_metadata(&conn)?;
            let names: Vec<&str> = match &around {
                Some(name) => {
                    let (prev, next) = metadata.adjacent_items(name);
                    [prev, Some(name.as_str()), next].into_iter().flatten().collect()
                }
                None => metadata.sorted_items().iter().map(String::as_str).collect(),
            };

            println!("{:<40} {:<24} {:<24} {:<8}", "Item", "Group", "Subgroup", "Order");
            println!("{}", "-".repeat(98));
            for name in names {
                println!(
                    "{:<40} {:<24} {:<24} {:<8}",
                    name,
                    metadata.item_group(name).unwrap_or("-"),
                    metadata.item_subgroup(name).unwrap_or("-"),
                    metadata.item_order(name).unwrap_or("-")
                );
            }
        }

        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }
    }

    Ok(())
}

fn layout_for(factory: Option<String>) -> BlockLayout {
    match factory {
        Some(factory) => BlockLayout::with_factory(factory),
        None => BlockLayout::default(),
    }
}

/// Load the metadata index, refusing to work from an empty database
fn load_metadata(conn: &Connection) -> Result<MetadataIndex> {
    let metadata = MetadataIndex::load(conn)?;
    ensure!(
        !metadata.is_empty(),
        "No recipes in database. Run 'extract' or 'load-sample' first."
    );
    info!("Loaded {} recipes", metadata.recipe_count());
    Ok(metadata)
}

fn open_blueprint(path: &Path, metadata: &MetadataIndex) -> Result<BlueprintDocument> {
    let mut document = blueprint::read_blueprint(path)?;
    document
        .blueprint
        .assign_footprints(|name| metadata.footprint(name));
    Ok(document)
}

fn save_blueprint(document: &BlueprintDocument, output: Option<&Path>) -> Result<()> {
    let json = blueprint::to_json(document)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Build the factory grid, propagate recipes in `directions`, write them back
/// and synchronise every factory's combinators
fn extend_block(
    blueprint: &mut Blueprint,
    metadata: &MetadataIndex,
    layout: &BlockLayout,
    directions: &[Direction],
) -> Result<(Vec<Assignment>, SyncReport)> {
    let units = propagate::units_from_blueprint(blueprint, &layout.factory, |machine| {
        metadata.recipes_for_machine(machine)
    });
    let mut grid = Grid::build(units)?;

    let assignments = propagate::guess_recipes(&mut grid, directions);
    propagate::write_back(grid, blueprint);

    let report = combinator::sync_block(blueprint, metadata, layout)?;
    Ok((assignments, report))
}

/// Load a small tiered CastleVantress data set for testing without a game dump
fn load_sample_data(conn: &Connection) -> Result<()> {
    use crate::models::{
        Ingredient, Item, ItemGroup, ItemSubgroup, Machine, Recipe, ResultDescriptor, SignalKind,
    };

    db::clear_extracted_data(conn)?;

    for (name, order) in [("production", "c"), ("intermediate-products", "e"), ("fluids", "f")] {
        db::upsert_item_group(
            conn,
            &ItemGroup {
                name: name.to_string(),
                order: order.to_string(),
            },
        )?;
    }
    for (name, group, order) in [
        ("py-cv-buildings", "production", "a"),
        ("py-raw", "intermediate-products", "a"),
        ("fluid", "fluids", "a"),
    ] {
        db::upsert_item_subgroup(
            conn,
            &ItemSubgroup {
                name: name.to_string(),
                group: group.to_string(),
                order: order.to_string(),
            },
        )?;
    }

    let item = |name: &str, kind: SignalKind, subgroup: &str, order: &str| Item {
        name: name.to_string(),
        kind,
        subgroup: Some(subgroup.to_string()),
        order: order.to_string(),
        hidden: false,
    };
    let raw = [
        ("iron-plate", "a"),
        ("steel-plate", "b"),
        ("glass", "c"),
        ("soil", "d"),
        ("stone-brick", "e"),
        ("moss", "f"),
    ];
    for (name, order) in raw {
        db::upsert_item(conn, &item(name, SignalKind::Item, "py-raw", order))?;
    }
    db::upsert_item(conn, &item("water", SignalKind::Fluid, "fluid", "a"))?;
    db::upsert_item(
        conn,
        &item("automated-factory-mk01", SignalKind::Item, "py-cv-buildings", "a"),
    )?;

    // Building families: tier N needs tier N-1 plus base materials scaled by tier.
    let families: [(&str, &[&str]); 3] = [
        ("moss-farm", &["steel-plate", "glass"]),
        ("fawogae-plantation", &["iron-plate", "soil"]),
        ("glassworks", &["stone-brick", "iron-plate"]),
    ];
    for (f, (family, base)) in families.iter().enumerate() {
        for tier in 1..=4 {
            let name = format!("{family}-mk{tier:02}");
            let mut ingredients: Vec<Ingredient> = base
                .iter()
                .map(|b| Ingredient {
                    name: b.to_string(),
                    kind: SignalKind::Item,
                    amount: tier * 10,
                })
                .collect();
            if tier > 1 {
                ingredients.push(Ingredient {
                    name: format!("{family}-mk{:02}", tier - 1),
                    kind: SignalKind::Item,
                    amount: 1,
                });
            }
            if *family == "moss-farm" {
                ingredients.push(Ingredient {
                    name: "water".to_string(),
                    kind: SignalKind::Fluid,
                    amount: 100,
                });
            }

            db::upsert_item(
                conn,
                &item(&name, SignalKind::Item, "py-cv-buildings", &format!("{f}{tier}")),
            )?;
            db::upsert_recipe(
                conn,
                &Recipe {
                    name: name.clone(),
                    category: "cv-factory".to_string(),
                    ingredients,
                    results: vec![ResultDescriptor::Counted {
                        name,
                        kind: SignalKind::Item,
                        amount: 1,
                    }],
                },
            )?;
        }
    }

    // Output named after the product, not the recipe
    db::upsert_recipe(
        conn,
        &Recipe {
            name: "moss-harvest".to_string(),
            category: "cv-factory".to_string(),
            ingredients: vec![Ingredient {
                name: "water".to_string(),
                kind: SignalKind::Fluid,
                amount: 200,
            }],
            results: vec![ResultDescriptor::Bare("moss".to_string())],
        },
    )?;

    db::upsert_machine(
        conn,
        &Machine {
            name: "automated-factory-mk01".to_string(),
            tile_width: 7,
            tile_height: 7,
            crafting_categories: vec!["cv-factory".to_string()],
        },
    )?;

    println!("Loaded {} sample recipes", db::count_recipes(conn)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Entity, SignalId};
    use crate::grid::{Position, GRID_HEIGHT, GRID_WIDTH};

    fn sample_metadata() -> MetadataIndex {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        load_sample_data(&conn).unwrap();
        load_metadata(&conn).unwrap()
    }

    /// A full block: 80 factories, each with its two combinators
    fn sample_block(metadata: &MetadataIndex) -> Blueprint {
        let mut bp = Blueprint::default();
        let mut number = 0;
        let mut next = || {
            number += 1;
            number
        };

        for row in 0..GRID_HEIGHT as i32 {
            for col in 0..GRID_WIDTH as i32 {
                let (x, y) = (col * 9, row * 12);
                bp.entities.push(Entity::new(
                    next(),
                    "automated-factory-mk01",
                    Position::new(x as f64 + 3.5, y as f64 + 3.5),
                ));

                let mut ingredients =
                    Entity::new(next(), "constant-combinator", Position::new(x as f64 + 7.5, y as f64 + 6.5));
                ingredients.set_signal(0, SignalId::virtual_signal("signal-cyan"), 1);
                bp.entities.push(ingredients);

                let mut output =
                    Entity::new(next(), "constant-combinator", Position::new(x as f64 + 7.5, y as f64 + 8.5));
                output.set_signal(0, SignalId::virtual_signal("signal-red"), 1);
                output.set_signal(1, SignalId::virtual_signal("signal-info"), 1);
                bp.entities.push(output);
            }
        }
        bp.assign_footprints(|name| metadata.footprint(name));
        bp
    }

    #[test]
    fn extend_fills_a_column_and_its_combinators() {
        let metadata = sample_metadata();
        let mut bp = sample_block(&metadata);
        // Factory (0, 2) is entity index 6; its combinators follow it.
        bp.entities[6].recipe = Some("moss-farm-mk01".to_string());

        let (assignments, report) =
            extend_block(&mut bp, &metadata, &BlockLayout::default(), &[Direction::South]).unwrap();

        assert_eq!(assignments.len(), 3);
        assert_eq!(report.synced, 4);

        // Row 3, column 2 -> factory index (3 * 10 + 2) * 3
        let factory = (3 * GRID_WIDTH + 2) * 3;
        assert_eq!(bp.entities[factory].recipe.as_deref(), Some("moss-farm-mk04"));
        assert_eq!(bp.entities[factory + 1].signal_name(1), Some("steel-plate"));
        assert_eq!(bp.entities[factory + 1].signal(1).unwrap().count, 40);
        assert_eq!(bp.entities[factory + 1].signal_name(3), Some("moss-farm-mk03"));
        assert_eq!(bp.entities[factory + 1].signal_name(4), Some("water"));
        assert_eq!(bp.entities[factory + 2].signal_name(1), Some("moss-farm-mk04"));

        // Row 4 is the other half-block and stays empty.
        let below = (4 * GRID_WIDTH + 2) * 3;
        assert!(bp.entities[below].recipe.is_none());
        assert_eq!(bp.entities[below + 2].signal_name(1), Some("signal-info"));
    }

    #[test]
    fn extend_steps_east_along_the_ladder() {
        let metadata = sample_metadata();
        let mut bp = sample_block(&metadata);
        bp.entities[0].recipe = Some("glassworks-mk03".to_string());

        extend_block(&mut bp, &metadata, &BlockLayout::default(), &[Direction::East]).unwrap();

        assert_eq!(bp.entities[3].recipe.as_deref(), Some("glassworks-mk04"));
        assert_eq!(bp.entities[6].recipe.as_deref(), Some("moss-harvest"));
        assert!(bp.entities[9].recipe.is_none());
    }

    #[test]
    fn extend_rejects_an_incomplete_block() {
        let metadata = sample_metadata();
        let mut bp = sample_block(&metadata);
        bp.entities.truncate(3 * 79);

        let err = extend_block(&mut bp, &metadata, &BlockLayout::default(), &[Direction::South])
            .unwrap_err();
        assert!(err.downcast_ref::<error::GridError>().is_some());
    }

    #[test]
    fn sample_data_has_primary_output_mismatch_case() {
        let metadata = sample_metadata();
        let output = combinator::guess_primary_output("moss-harvest", &metadata).unwrap();
        assert_eq!(output.name, "moss");
        assert_eq!(
            metadata.recipes_for_machine("automated-factory-mk01").len(),
            13
        );
    }

    #[test]
    fn empty_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        assert!(load_metadata(&conn).is_err());
    }
}
