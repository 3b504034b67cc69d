//! boxflow command line
//!
//! Lays out one frame of a JSON document and prints the computed layouts.
//!
//! ```text
//! boxflow <document.json> [--config <config.json>] [--root <id>] [--pure]
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;

use boxflow::{DocumentTree, LayoutConfig, LayoutEngine, LayoutError, Result, NAME, VERSION};
use serde::Serialize;

#[derive(Debug, Default)]
struct Args {
    document: Option<String>,
    config: Option<String>,
    root: Option<u64>,
    pure: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => args.config = iter.next(),
            "--root" => {
                let value = iter.next().unwrap_or_default();
                args.root = Some(value.parse().map_err(|_| {
                    LayoutError::Textual(format!("--root expects an element id, got {:?}", value))
                })?);
            }
            "--pure" => args.pure = true,
            "--version" => {
                println!("{} {}", NAME, VERSION);
                std::process::exit(0);
            }
            _ => args.document = Some(arg),
        }
    }
    Ok(args)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output<'a> {
    version: u64,
    passes: u32,
    accelerated: bool,
    layouts: BTreeMap<u64, &'a boxflow::ComputedLayout>,
    scroll: BTreeMap<u64, &'a boxflow::ScrollExtent>,
}

fn run() -> Result<()> {
    let args = parse_args()?;
    let Some(path) = args.document else {
        eprintln!("usage: boxflow <document.json> [--config <config.json>] [--root <id>] [--pure]");
        std::process::exit(2);
    };

    let config = match &args.config {
        Some(path) => LayoutConfig::from_json_str(&fs::read_to_string(path)?)?,
        None => LayoutConfig::default(),
    };
    let doc = DocumentTree::from_json_str(&fs::read_to_string(&path)?)?;
    let root = args
        .root
        .or_else(|| doc.root_id())
        .ok_or_else(|| LayoutError::Textual("document has no root element".to_string()))?;
    log::info!("laying out {} nodes from {}", doc.len(), path);

    let mut engine = if args.pure {
        LayoutEngine::new(config)
    } else {
        LayoutEngine::with_taffy(config)
    };
    let stats = engine.layout_frame(&doc, root)?;

    let output = Output {
        version: engine.version(),
        passes: stats.passes,
        accelerated: stats.accelerated,
        layouts: engine.layouts().iter().map(|(id, l)| (*id, l)).collect(),
        scroll: engine.scroll_extents().iter().map(|(id, s)| (*id, s)).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("{} failed: {}", NAME, e);
        std::process::exit(1);
    }
}
