use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use foundation::math::{GeoPoint, ViewportSize};
use layers::{FeatureMapper, Layer, MappingExpr};
use portal::{FeatureInfoController, PortalConfig};
use runtime::{EngineKind, MapAdapter, ViewportAdapter};
use scene::UiMode;
use serde_json::{Map, Value, json};
use streaming::HttpSource;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Feature info queries against a geoportal layer stack")]
struct Args {
    /// JSON config file; GEOPORTAL_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Engine {
    Raster,
    VectorTile,
    Globe,
}

impl From<Engine> for EngineKind {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Raster => EngineKind::Raster2d,
            Engine::VectorTile => EngineKind::VectorTile2d,
            Engine::Globe => EngineKind::Globe3d,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Query every queryable layer at a position and print the selection
    Query {
        /// Layer stack as a JSON array, bottom layer first
        #[arg(long)]
        layers: PathBuf,

        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(long, default_value_t = 15.0)]
        zoom: f64,

        #[arg(long, default_value_t = 1024)]
        width: u32,

        #[arg(long, default_value_t = 768)]
        height: u32,

        #[arg(long, value_enum, default_value_t = Engine::Raster)]
        engine: Engine,
    },

    /// Validate layer keywords and mapping expressions
    Check {
        #[arg(long)]
        layers: PathBuf,

        /// Sample payload (JSON object) to run each mapping against
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => PortalConfig::from_file(path)?,
        None => PortalConfig::default(),
    };
    config.apply_env()?;

    match args.command {
        Command::Query {
            layers,
            lat,
            lon,
            zoom,
            width,
            height,
            engine,
        } => {
            let stack = read_layers(&layers)?;
            let click = GeoPoint::new(lat, lon);
            let size = ViewportSize::new(width, height);
            query(config, stack, click, zoom, size, engine.into()).await?
        }
        Command::Check { layers, payload } => {
            let stack = read_layers(&layers)?;
            let payload = payload.as_deref().map(read_payload).transpose()?;
            check(&stack, payload.as_ref())?
        }
    }

    Ok(())
}

fn read_layers(path: &Path) -> Result<Vec<Layer>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read layers {}: {e}", path.display()))?;
    let layers: Vec<Layer> = serde_json::from_str(&text)?;
    info!("loaded {} layers from {}", layers.len(), path.display());
    Ok(layers)
}

fn read_payload(path: &Path) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read payload {}: {e}", path.display()))?;
    match serde_json::from_str(&text)? {
        Value::Object(map) => Ok(map),
        _ => Err(format!("payload {} is not a JSON object", path.display()).into()),
    }
}

async fn query(
    config: PortalConfig,
    stack: Vec<Layer>,
    click: GeoPoint,
    zoom: f64,
    size: ViewportSize,
    engine: EngineKind,
) -> Result<(), Box<dyn std::error::Error>> {
    let (adapter, _clicks) = ViewportAdapter::new(engine, click, zoom, size);
    let adapter: Arc<dyn MapAdapter> = Arc::new(adapter);
    let controller = FeatureInfoController::new(config, Arc::new(HttpSource::default()), adapter);

    controller.set_layers(stack).await;
    controller.set_mode(UiMode::FeatureInfo);
    let outcome = controller.handle_click(click).await;
    info!("{outcome:?}");

    let state = controller.snapshot();
    let out = json!({
        "selected": state.selected,
        "secondary": state.secondary,
        "infoText": state.info_text.message(),
        "nothingFound": state.nothing_found_ids,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn check(
    stack: &[Layer],
    payload: Option<&Map<String, Value>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut failures = 0usize;
    for layer in stack {
        let keywords = layer.keywords();
        let Some(src) = keywords.info_box_mapping.as_deref() else {
            println!("{}: default mapping", layer.id);
            continue;
        };
        if let Err(e) = MappingExpr::parse(src) {
            warn!("{}: {e}", layer.id);
            println!("{}: invalid mapping: {e}", layer.id);
            failures += 1;
            continue;
        }
        println!("{}: mapping ok", layer.id);

        if let Some(payload) = payload {
            match FeatureMapper::for_layer(layer).map(payload, None) {
                Ok(Some(props)) => println!("{}", serde_json::to_string_pretty(&props)?),
                Ok(None) => println!("{}: mapping yields no feature", layer.id),
                Err(e) => {
                    println!("{}: evaluation failed: {e}", layer.id);
                    failures += 1;
                }
            }
        }
    }

    if failures > 0 {
        return Err(format!("{failures} layer(s) failed").into());
    }
    Ok(())
}
