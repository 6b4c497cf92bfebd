mod app;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use labnote::lab::Snapshot;
use labnote::mindmap::MapTemplate;
use labnote::store::FileStore;
use labnote::{Lab, LabConfig};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Where collections are stored; overrides the config file.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Open the mind-map viewer (default).
    View,
    /// Write every collection to a JSON snapshot.
    Export { file: PathBuf },
    /// Replace stored collections with a JSON snapshot.
    Import { file: PathBuf },
    /// Send one message to the assistant in a new chat session.
    Chat {
        text: String,
        /// Topic whose records are given to the assistant as context.
        #[arg(long)]
        topic: Option<String>,
    },
    /// Print cache statistics, collection sizes and broken references.
    Stats,
    /// Create a mind map from a template.
    NewMap {
        title: String,
        #[arg(long, default_value = "blank", value_parser = parse_template)]
        template: MapTemplate,
    },
}

fn parse_template(name: &str) -> Result<MapTemplate, String> {
    MapTemplate::parse(name).ok_or_else(|| {
        let known = MapTemplate::ALL
            .iter()
            .map(|template| template.label())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown template {name:?} (known: {known})")
    })
}

fn init_tracing() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|error| anyhow!("failed to init subscriber: {error}"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing()?;

    let mut config = LabConfig::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    match args.command.unwrap_or(Command::View) {
        Command::View => run_viewer(config),
        command => run_command(command, config),
    }
}

fn run_viewer(config: LabConfig) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "labnote",
        options,
        Box::new(move |cc| Ok(Box::new(app::LabViewerApp::new(cc, config)))),
    )
    .map_err(|error| anyhow!("viewer failed: {error}"))
}

fn run_command(command: Command, config: LabConfig) -> Result<()> {
    let data_dir = config.data_dir();
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;
    let mut lab = Lab::open(store, config);

    match command {
        Command::View => {}
        Command::Export { file } => {
            let json = lab.export()?.to_json()?;
            fs::write(&file, json)
                .with_context(|| format!("failed to write {}", file.display()))?;
            info!(file = %file.display(), "snapshot exported");
        }
        Command::Import { file } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let summary = lab.import(Snapshot::from_json(&raw)?)?;
            for (kind, count) in summary.counts {
                println!("{:>16}: {count}", kind.label());
            }
        }
        Command::Chat { text, topic } => {
            let (session, reply) = lab.chat(None, &text, topic.as_deref())?;
            println!("{}", reply.content);
            if let Some(reason) = reply.fallback_reason {
                eprintln!("(offline reply: {reason})");
            }
            info!(session = %session.id, "chat stored");
        }
        Command::Stats => print_stats(&mut lab)?,
        Command::NewMap { title, template } => {
            let map = lab.new_mind_map(&title, template)?;
            println!("{} {}", map.id, map.title);
        }
    }

    lab.dispose();
    Ok(())
}

fn print_stats(lab: &mut Lab<FileStore>) -> Result<()> {
    let snapshot = lab.export()?;
    for (kind, count) in snapshot.counts() {
        println!("{:>16}: {count}", kind.label());
    }

    let stats = lab.stats();
    println!(
        "cache: {} hits, {} misses, {} writes, {} corrupt reads, {} read failures",
        stats.hits, stats.misses, stats.writes, stats.corrupt_reads, stats.read_failures
    );

    let broken = lab.broken_references();
    if broken.is_empty() {
        println!("no broken references");
    }
    for reference in broken {
        println!(
            "broken: {} {} {} -> {}",
            reference.kind, reference.id, reference.field, reference.missing
        );
    }
    Ok(())
}
