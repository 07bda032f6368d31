use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forge_contracts::events::EventWriter;
use forge_contracts::leaderboard::{
    BoundedLeaderboard, LeaderboardEntry, LeaderboardStore, WeaponSummary,
    DEFAULT_LEADERBOARD_CAPACITY,
};
use forge_contracts::models::{Capability, ModelRegistry};
use forge_contracts::{BaseItem, Material, ScanMode};
use forge_engine::{normalize, ForgeConfig, ForgePipeline, ImageInput};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "forge", version, about = "Turn photos of real objects into fantasy game items")]
struct Cli {
    /// -v for info, -vv for debug; RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyse a photo and name the resulting item.
    Scan(ScanArgs),
    /// Render a description as a 256x256 sprite.
    GenerateImage(GenerateImageArgs),
    /// Evolve an item by feeding it materials.
    Evolve(EvolveArgs),
    /// Match a photo to a catalog skill.
    ScanSkill(ScanSkillArgs),
    /// Normalize a local image into a sprite, no providers involved.
    Normalize(NormalizeArgs),
    /// Submit to or list a local leaderboard file.
    Leaderboard(LeaderboardArgs),
    /// List known models.
    Models(ModelsArgs),
}

#[derive(Debug, Parser)]
struct ScanArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long, default_value = "craft")]
    mode: String,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateImageArgs {
    #[arg(long)]
    description: String,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct EvolveArgs {
    #[arg(long)]
    base: String,
    #[arg(long)]
    base_description: Option<String>,
    /// `name` or `name:grade`; repeatable.
    #[arg(long = "material")]
    materials: Vec<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct ScanSkillArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct NormalizeArgs {
    #[arg(long)]
    image: PathBuf,
    /// Write the WebP bytes here instead of printing the sprite JSON.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct LeaderboardArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long, default_value_t = DEFAULT_LEADERBOARD_CAPACITY)]
    capacity: usize,
    #[command(subcommand)]
    action: LeaderboardAction,
}

#[derive(Debug, Subcommand)]
enum LeaderboardAction {
    Submit {
        #[arg(long)]
        player: String,
        #[arg(long)]
        power: u64,
        #[arg(long, default_value_t = 0)]
        survival: u64,
        #[arg(long, default_value_t = 0)]
        kills: u64,
        /// `name` or `name:grade`; repeatable.
        #[arg(long = "weapon")]
        weapons: Vec<String>,
    },
    Top {
        #[arg(long, default_value_t = DEFAULT_LEADERBOARD_CAPACITY)]
        limit: usize,
    },
}

#[derive(Debug, Parser)]
struct ModelsArgs {
    #[arg(long, value_enum)]
    capability: Option<CapabilityArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CapabilityArg {
    Vision,
    Text,
    Image,
}

impl From<CapabilityArg> for Capability {
    fn from(value: CapabilityArg) -> Self {
        match value {
            CapabilityArg::Vision => Capability::Vision,
            CapabilityArg::Text => Capability::Text,
            CapabilityArg::Image => Capability::Image,
        }
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("forge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Scan(args) => run_scan(args),
        Command::GenerateImage(args) => run_generate_image(args),
        Command::Evolve(args) => run_evolve(args),
        Command::ScanSkill(args) => run_scan_skill(args),
        Command::Normalize(args) => run_normalize(args),
        Command::Leaderboard(args) => run_leaderboard(args),
        Command::Models(args) => run_models(args),
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(image_model: Option<String>, events: Option<PathBuf>) -> Result<ForgePipeline> {
    let mut config = ForgeConfig::from_env();
    if let Some(model) = image_model {
        config.image_model = model;
    }
    let pipeline = ForgePipeline::from_config(&config)?;
    Ok(match events {
        Some(path) => pipeline.with_events(EventWriter::new(path)),
        None => pipeline,
    })
}

fn read_image(path: &Path) -> Result<ImageInput> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(ImageInput::new(bytes))
}

fn print_json<T: Serialize>(value: &T) -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(0)
}

fn run_scan(args: ScanArgs) -> Result<i32> {
    let image = read_image(&args.image)?;
    let pipeline = build_pipeline(None, args.events)?;
    let mode = ScanMode::parse(&args.mode);
    debug!(mode = mode.as_str(), bytes = image.bytes.len(), "scan");
    print_json(&pipeline.scan(&image, &mode))
}

fn run_generate_image(args: GenerateImageArgs) -> Result<i32> {
    if args.description.trim().is_empty() {
        bail!("--description must not be empty");
    }
    let pipeline = build_pipeline(args.image_model, args.events)?;
    print_json(&pipeline.generate_image(&args.description))
}

fn run_evolve(args: EvolveArgs) -> Result<i32> {
    let pipeline = build_pipeline(args.image_model, args.events)?;
    let base = BaseItem {
        name: args.base,
        description: args.base_description,
    };
    let materials: Vec<Material> = args
        .materials
        .iter()
        .map(|raw| {
            let (name, grade) = split_name_grade(raw);
            Material { name, grade }
        })
        .collect();
    print_json(&pipeline.evolve(&base, &materials))
}

fn run_scan_skill(args: ScanSkillArgs) -> Result<i32> {
    let image = read_image(&args.image)?;
    let pipeline = build_pipeline(None, args.events)?;
    print_json(&pipeline.scan_skill(&image))
}

fn run_normalize(args: NormalizeArgs) -> Result<i32> {
    let bytes =
        fs::read(&args.image).with_context(|| format!("failed reading {}", args.image.display()))?;
    let sprite = normalize(&bytes)?;
    match args.out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&out, sprite.payload()?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            print_json(&json!({
                "path": out.display().to_string(),
                "width": sprite.width,
                "height": sprite.height,
                "mediaType": sprite.media_type,
            }))
        }
        None => print_json(&sprite),
    }
}

fn run_leaderboard(args: LeaderboardArgs) -> Result<i32> {
    let mut board = BoundedLeaderboard::load(&args.file, args.capacity)?;
    match args.action {
        LeaderboardAction::Submit {
            player,
            power,
            survival,
            kills,
            weapons,
        } => {
            let entry = LeaderboardEntry {
                player_name: player,
                combat_power: power,
                survival_time: survival,
                kill_count: kills,
                weapons: weapons
                    .iter()
                    .map(|raw| {
                        let (name, grade) = split_name_grade(raw);
                        WeaponSummary { name, grade }
                    })
                    .collect(),
            };
            let rank = board.submit(entry);
            board.save(&args.file)?;
            print_json(&json!({ "rank": rank, "capacity": board.capacity() }))
        }
        LeaderboardAction::Top { limit } => print_json(&board.top(limit)),
    }
}

fn run_models(args: ModelsArgs) -> Result<i32> {
    let registry = ModelRegistry::default();
    let capability = args.capability.map(Capability::from);
    let rows: Vec<Value> = registry
        .list()
        .filter(|model| capability.map(|cap| model.supports(cap)).unwrap_or(true))
        .map(|model| {
            json!({
                "name": model.name,
                "provider": model.provider,
                "capabilities": model
                    .capabilities
                    .iter()
                    .map(|cap| cap.as_str())
                    .collect::<Vec<&str>>(),
            })
        })
        .collect();
    print_json(&rows)
}

/// `"Phoenix Feather:rare"` -> (`Phoenix Feather`, `rare`); grade defaults to common.
fn split_name_grade(raw: &str) -> (String, String) {
    match raw.rsplit_once(':') {
        Some((name, grade)) if !name.trim().is_empty() && !grade.trim().is_empty() => {
            (name.trim().to_string(), grade.trim().to_string())
        }
        _ => (raw.trim().to_string(), "common".to_string()),
    }
}
