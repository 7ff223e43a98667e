use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use globset::{Glob, GlobSet, GlobSetBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use psd_packer_core::psd::{LayerKind, LayerNode, PsdDocument};
use psd_packer_core::{
    SpritesheetConfig, SpritesheetOutput, SpritesheetStats, decode, export_psd_with_progress,
    to_json_string,
};
use serde::Deserialize;
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    name = "psd-packer",
    about = "Turn layered PSD/PSB animations into packed spritesheets",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, global=true, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, global=true, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(
        short,
        long,
        default_value_t = false,
        global = true,
        help_heading = "Logging/UX"
    )]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export every `anim - <name>` group to atlas PNGs plus a JSON descriptor
    Export(ExportArgs),
    /// Print the header, layer tree and animations of a document
    Inspect(InspectArgs),
}

#[derive(Parser, Debug, Clone)]
struct ExportArgs {
    // Input/Output
    /// Input .psd/.psb file or directory
    #[arg(help_heading = "Input/Output")]
    input: PathBuf,
    /// Output directory
    #[arg(short, long, default_value = "out", help_heading = "Input/Output")]
    out_dir: PathBuf,
    /// Output base name (files will be name.png/.json). Defaults to the input file stem
    #[arg(short, long, help_heading = "Input/Output")]
    name: Option<String>,
    /// YAML config file path (overrides individual options)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob). If set, only files matching any pattern are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob). Files matching any pattern will be ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Layout
    /// Atlas width and maximum height (at most 4096)
    #[arg(long, default_value_t = 4096, help_heading = "Layout")]
    atlas_size: u32,
    /// Padding between frames
    #[arg(long, default_value_t = 0, help_heading = "Layout")]
    padding: u32,

    // Image Processing
    /// Resize every frame to WxH before packing (e.g. 128x128)
    #[arg(long, value_parser = parse_resolution, help_heading = "Image Processing")]
    resolution: Option<(u32, u32)>,
    /// Nearest-neighbor resampling (false = bilinear)
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Image Processing")]
    nearest_neighbor: bool,

    // Export
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Print the merged configuration (after CLI/YAML) and exit
    #[arg(long, default_value_t = false, help_heading = "Export")]
    print_config: bool,
    /// Output format for --print-config: json|yaml
    #[arg(long, default_value = "json", value_parser = ["json", "yaml"], help_heading = "Export")]
    print_config_format: String,
    /// Dry run: decode and pack but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,
}

#[derive(Parser, Debug, Clone)]
struct InspectArgs {
    /// Input .psd/.psb file
    input: PathBuf,
    /// Output format: text|json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing_with_level(cli.quiet, cli.verbose);
    match &cli.command {
        Commands::Export(args) => run_export(args, cli.progress && !cli.quiet),
        Commands::Inspect(args) => run_inspect(args),
    }
}

fn run_export(args: &ExportArgs, show_progress: bool) -> anyhow::Result<()> {
    let (cfg, fixed_name) = build_config(args)?;

    if args.print_config {
        match args.print_config_format.as_str() {
            "yaml" => println!("{}", serde_yaml::to_string(&cfg)?),
            _ => println!("{}", serde_json::to_string_pretty(&cfg)?),
        }
        return Ok(());
    }
    cfg.validate()?;

    let paths = gather_paths(&args.input, &args.include, &args.exclude)?;
    if paths.is_empty() {
        anyhow::bail!("no .psd/.psb files found under {}", args.input.display());
    }
    if fixed_name.is_some() && paths.len() > 1 {
        warn!(
            files = paths.len(),
            "--name ignored for multiple inputs; using file stems"
        );
    }
    if !args.dry_run {
        fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("create out_dir {}", args.out_dir.display()))?;
    }

    let single = paths.len() == 1;
    let mut stats: Vec<(String, SpritesheetStats)> = Vec::with_capacity(paths.len());
    let mut failed = 0usize;
    for path in &paths {
        let mut file_cfg = cfg.clone();
        file_cfg.base_name = match (&fixed_name, single) {
            (Some(name), true) => name.clone(),
            _ => file_stem(path),
        };
        match export_file(path, &file_cfg, args, show_progress) {
            Ok(out) => stats.push((path.to_string_lossy().replace('\\', "/"), out.stats())),
            Err(e) if !single => {
                error!(?path, error = %format!("{e:#}"), "export failed");
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(stats_path) = &args.export_stats {
        let value: BTreeMap<&str, &SpritesheetStats> =
            stats.iter().map(|(file, s)| (file.as_str(), s)).collect();
        fs::write(stats_path, serde_json::to_string_pretty(&value)?)
            .with_context(|| format!("write {}", stats_path.display()))?;
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} files failed to export", paths.len());
    }
    Ok(())
}

fn export_file(
    path: &Path,
    cfg: &SpritesheetConfig,
    args: &ExportArgs,
    show_progress: bool,
) -> anyhow::Result<SpritesheetOutput> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let bar = show_progress.then(|| {
        let b = ProgressBar::new(100);
        b.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {prefix} [{bar:30}] {pos:>3}% {wide_msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        b.set_prefix(cfg.base_name.clone());
        b
    });

    let start = Instant::now();
    let out = export_psd_with_progress(&bytes, cfg, |stage| {
        if let Some(b) = &bar {
            b.set_position(stage.percent() as u64);
            b.set_message(stage.label());
        }
    })
    .with_context(|| format!("export {}", path.display()));
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    let out = out?;

    for name in &out.dropped {
        warn!(frame = %name, atlas_size = cfg.atlas_size, "frame dropped (larger than atlas)");
    }
    let s = out.stats();
    info!(
        file = %path.display(),
        atlases = s.num_atlases,
        frames = s.num_frames,
        dropped = s.num_dropped,
        occupancy = format!("{:.2}%", s.occupancy * 100.0),
        time = %fmt_dur(start.elapsed()),
        "stats"
    );

    if !args.dry_run {
        for img in &out.images {
            let png_path = args.out_dir.join(&img.filename);
            img.rgba
                .save_with_format(&png_path, image::ImageFormat::Png)
                .with_context(|| format!("write {}", png_path.display()))?;
            info!(?png_path, "wrote atlas");
        }
        let json_path = args.out_dir.join(format!("{}.json", cfg.base_name));
        fs::write(&json_path, to_json_string(&out.descriptor)?)
            .with_context(|| format!("write {}", json_path.display()))?;
        info!(?json_path, atlases = out.images.len(), "descriptor written");
    }
    Ok(out)
}

/// Merges CLI flags and the optional YAML file. Returns the config and the explicitly
/// requested base name, if any.
fn build_config(args: &ExportArgs) -> anyhow::Result<(SpritesheetConfig, Option<String>)> {
    let mut cfg = SpritesheetConfig {
        atlas_size: args.atlas_size,
        padding: args.padding,
        resolution: args.resolution,
        nearest_neighbor: args.nearest_neighbor,
        ..Default::default()
    };
    let mut name = args.name.clone();
    if let Some(path) = &args.config {
        let file = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let y: YamlConfig = serde_yaml::from_str(&file)
            .with_context(|| format!("parse {}", path.display()))?;
        if let Some(base) = &y.base_name {
            name = Some(base.clone());
        }
        cfg = y.apply(cfg);
    }
    if let Some(n) = &name {
        cfg.base_name = n.clone();
    }
    Ok((cfg, name))
}

fn run_inspect(args: &InspectArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.input).with_context(|| format!("read {}", args.input.display()))?;
    let doc = decode(&bytes).with_context(|| format!("decode {}", args.input.display()))?;
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&inspect_json(&doc))?),
        _ => print_inspect(&args.input, &doc),
    }
    Ok(())
}

fn print_inspect(path: &Path, doc: &PsdDocument) {
    let h = &doc.header;
    println!(
        "{}: {:?} {}x{}, {}-bit {:?}, {} channels, {} layer records",
        path.display(),
        h.version,
        h.width,
        h.height,
        h.depth,
        h.color_mode,
        h.channels,
        doc.layers.len()
    );
    println!("tree:");
    for node in &doc.tree {
        node.walk(&mut |n, depth| {
            let indent = "  ".repeat(depth + 1);
            match n {
                LayerNode::Group { name, record, children } => println!(
                    "{indent}[{}] {name} ({} children{})",
                    if matches!(record.kind, LayerKind::GroupOpen { collapsed: true }) {
                        "+"
                    } else {
                        "-"
                    },
                    children.len(),
                    if record.visible { "" } else { ", hidden" }
                ),
                LayerNode::Layer { name, layer } => println!(
                    "{indent}{name} ({},{} {}x{}{})",
                    layer.left,
                    layer.top,
                    layer.width(),
                    layer.height(),
                    if layer.visible { "" } else { ", hidden" }
                ),
            }
        });
    }
    println!("animations:");
    if doc.animations.is_empty() {
        println!("  (none)");
    }
    for (name, frames) in doc.animations_in_tree_order() {
        let numbers: Vec<String> = frames.iter().map(|f| f.frame_number.to_string()).collect();
        println!("  {name}: {} frames [{}]", frames.len(), numbers.join(", "));
    }
}

fn inspect_json(doc: &PsdDocument) -> serde_json::Value {
    let layers: Vec<serde_json::Value> = doc
        .layers
        .iter()
        .map(|l| {
            serde_json::json!({
                "name": l.name,
                "kind": match l.kind {
                    LayerKind::Normal => "layer",
                    LayerKind::GroupOpen { .. } => "group",
                    LayerKind::GroupEnd => "group_end",
                },
                "left": l.left,
                "top": l.top,
                "width": l.width(),
                "height": l.height(),
                "visible": l.visible,
                "opacity": l.opacity,
                "blend_mode": l.blend_mode,
            })
        })
        .collect();
    let animations: serde_json::Map<String, serde_json::Value> = doc
        .animations
        .iter()
        .map(|(name, frames)| {
            let files: Vec<&str> = frames.iter().map(|f| f.filename.as_str()).collect();
            (name.clone(), serde_json::json!(files))
        })
        .collect();
    serde_json::json!({
        "header": doc.header,
        "layers": layers,
        "animations": animations,
    })
}

fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err(format!("resolution must be non-zero, got {w}x{h}"));
    }
    Ok((w, h))
}

fn fmt_dur(d: Duration) -> String {
    let ms = d.as_secs_f64() * 1000.0;
    if ms >= 1.0 {
        format!("{:.1}ms", ms)
    } else {
        format!("{}us", d.as_micros())
    }
}

fn file_stem(p: &Path) -> String {
    p.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("spritesheet")
        .to_string()
}

fn gather_paths(
    path: &Path,
    include: &[String],
    exclude: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(include)?;
    let exc_set = build_globset(exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    if path.is_file() {
        if !should_skip(path, inc_set.as_ref(), exc_set.as_ref()) && is_psd(path) {
            list.push(path.to_path_buf());
        }
    } else {
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && !should_skip(p, inc_set.as_ref(), exc_set.as_ref()) && is_psd(p) {
                list.push(p.to_path_buf());
            }
        }
    }
    list.sort();
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat).with_context(|| format!("bad glob '{pat}'"))?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(p: &Path, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    let s = p.to_string_lossy().replace('\\', "/");
    if let Some(ex) = exclude {
        if ex.is_match(&s) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(&s) {
            return true;
        }
    }
    false
}

fn is_psd(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "psd" | "psb")
    )
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

/// Optional overrides read from `--config`. Unset fields keep the CLI value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlConfig {
    atlas_size: Option<u32>,
    padding: Option<u32>,
    resolution: Option<(u32, u32)>,
    nearest_neighbor: Option<bool>,
    base_name: Option<String>,
}

impl YamlConfig {
    fn apply(self, mut cfg: SpritesheetConfig) -> SpritesheetConfig {
        if let Some(v) = self.atlas_size {
            cfg.atlas_size = v;
        }
        if let Some(v) = self.padding {
            cfg.padding = v;
        }
        if let Some(v) = self.resolution {
            cfg.resolution = Some(v);
        }
        if let Some(v) = self.nearest_neighbor {
            cfg.nearest_neighbor = v;
        }
        if let Some(v) = self.base_name {
            cfg.base_name = v;
        }
        cfg
    }
}
