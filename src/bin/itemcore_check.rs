use std::path::PathBuf;

use itemcore::config::EngineConfig;
use itemcore::telemetry::logging;
use itemcore::world::item_types::{load_item_types, validate_item_types};
use itemcore::world::state::WorldState;

fn main() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let Some(types_path) = args.next().map(PathBuf::from) else {
        return Err("usage: itemcore-check <item-types.yaml> [engine.yaml]".to_string());
    };
    let config_path = args.next().map(PathBuf::from);

    let level = std::env::var("ITEMCORE_LOG").unwrap_or_else(|_| "info".to_string());
    logging::init(None, &level).map_err(|err| err.to_string())?;

    let mut config = match config_path.as_deref() {
        Some(path) => EngineConfig::load(path).map_err(|err| err.to_string())?,
        None => EngineConfig::default(),
    };
    config.apply_env_overrides();

    let item_types = load_item_types(&types_path).map_err(|err| err.to_string())?;
    let problems = validate_item_types(&item_types);
    let containers = item_types.iter().filter(|item| item.is_container()).count();
    let stackable = item_types.iter().filter(|item| item.stackable).count();
    let wearable = item_types.iter().filter(|item| item.body.is_some()).count();
    let total = item_types.len();

    let world = WorldState::new(config, item_types);
    println!("itemcore: item types");
    println!("- file: {}", types_path.display());
    println!("- defined: {}", total);
    println!("- registered: {}", world.item_types().len());
    println!("- containers: {}", containers);
    println!("- stackable: {}", stackable);
    println!("- wearable: {}", wearable);
    println!("- max nesting depth: {}", world.config().max_nesting_depth);
    println!("- problems: {}", problems.len());
    for problem in &problems {
        eprintln!("itemcore: {}", problem);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("{} item type problem(s)", problems.len()))
    }
}
