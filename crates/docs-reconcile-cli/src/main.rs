use anyhow::{Context, Result};
use docs_reconcile_config::Config;
use docs_reconcile_engine::{
    BlockComment, CommentAnchor, CommentRefPosition, DiffOptions, Operation, ReconcileOptions,
    Snapshots, reconcile,
};
use serde::Serialize;
use std::{env, fs, path::Path, process};

/// What gets printed for one reconciliation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    operations: &'a [Operation],
    comment_refs: &'a [CommentRefPosition],
    comments: &'a [BlockComment],
}

/// Reads an anchors file: a JSON object mapping comment id to the
/// comment's anchor JSON.
fn load_anchors(path: &Path) -> Result<Vec<CommentAnchor>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read anchors file {}", path.display()))?;
    let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse anchors file {}", path.display()))?;

    let mut anchors = Vec::new();
    for (comment_id, value) in raw {
        let json = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        match CommentAnchor::from_json(comment_id.as_str(), &json)? {
            Some(anchor) => anchors.push(anchor),
            None => log::info!("comment {comment_id} has no text anchor; skipped"),
        }
    }
    Ok(anchors)
}

fn read_snapshot(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read snapshot {path}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    if !(3..=4).contains(&args.len()) {
        eprintln!("Usage: {} <pristine.xml> <current.xml> [anchors.json]", args[0]);
        process::exit(1);
    }

    let config_path = Config::config_path();
    let config = match Config::load() {
        Ok(Some(config)) => {
            log::info!("Loaded config from {}", config_path.display());
            config
        }
        Ok(None) => Config::default(),
        Err(e) => {
            eprintln!("Error: Failed to load config file: {e}");
            process::exit(1);
        }
    };

    let pristine = read_snapshot(&args[1])?;
    let current = read_snapshot(&args[2])?;
    let anchors = match args.get(3) {
        Some(path) => load_anchors(Path::new(path))?,
        None => Vec::new(),
    };

    let snapshots = Snapshots::parse(&pristine, &current)?;
    let options = ReconcileOptions {
        diff: DiffOptions {
            similarity_threshold: config.engine.similarity_threshold,
        },
        verify: config.engine.verify,
    };
    let reconciled = reconcile(&snapshots, &anchors, None, &options)?;
    log::info!(
        "{} operations, {} comment refs, {} anchored comments",
        reconciled.operations.len(),
        reconciled.comment_refs.len(),
        reconciled.comments.len()
    );

    let report = Report {
        operations: &reconciled.operations,
        comment_refs: &reconciled.comment_refs,
        comments: &reconciled.comments,
    };
    let mut out = if config.output.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    out.push('\n');

    match &config.output.path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, out)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote batch to {}", path.display());
        }
        None => print!("{out}"),
    }

    Ok(())
}
