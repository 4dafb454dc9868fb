use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::{Path, PathBuf};
use weight_protocol::{Benchmark, Build};

use crate::collector::{self, BENCHMARKS, Collector, Recipe};
use crate::config::Config;
use crate::diff;
use crate::format::{RenderMode, format_bytes, format_relative};
use crate::page;
use crate::series::SeriesIndex;
use crate::site;

// ── weight-tracker measure ─────────────────────────────────────────────────

pub fn measure(
    config: &Config,
    output: &Path,
    benchmarks: &[String],
    tmp_dir: Option<&Path>,
) -> Result<()> {
    let work_dir = tmp_dir.unwrap_or(config.work_dir.as_path());
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("creating work dir {}", work_dir.display()))?;

    let results = Collector::new(work_dir).measure(benchmarks)?;
    write_json(output, &results)
}

// ── weight-tracker merge ───────────────────────────────────────────────────

pub fn merge(output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let benchmarks = collector::merge(inputs)?;
    write_json(output, &benchmarks)
}

// ── weight-tracker site ────────────────────────────────────────────────────

pub fn site(
    config: &Config,
    output: &Path,
    git: Option<&Path>,
    local: Option<&Path>,
    limit: Option<usize>,
) -> Result<()> {
    let data_dir = match (git, local) {
        (Some(dir), _) => {
            site::clone_data(&config.data_repo, dir)?;
            dir
        }
        (None, Some(dir)) => dir,
        (None, None) => bail!("must specify --local or --git"),
    };

    let builds = site::read_builds(data_dir, limit.unwrap_or(config.history_limit))?;
    write_json(output, &builds)
}

// ── weight-tracker diff ────────────────────────────────────────────────────

/// Print what changed between consecutive builds of each benchmark.
pub fn diff(feed: &Path, benchmark: Option<&str>) -> Result<()> {
    let builds = read_feed(feed)?;

    let mut names: Vec<&str> = Vec::new();
    for build in &builds {
        for bench in &build.data {
            if !names.contains(&bench.name.as_str()) {
                names.push(&bench.name);
            }
        }
    }
    if let Some(wanted) = benchmark {
        if !names.contains(&wanted) {
            bail!("benchmark {wanted:?} is not in {}", feed.display());
        }
        names.retain(|n| *n == wanted);
    }

    for name in names {
        let history: Vec<(&str, &Benchmark)> = builds
            .iter()
            .filter_map(|build| {
                build
                    .data
                    .iter()
                    .find(|b| b.name == name)
                    .map(|b| (build.date.as_str(), b))
            })
            .collect();

        for pair in history.windows(2) {
            let (prev_date, prev) = pair[0];
            let (date, cur) = pair[1];
            let changes = diff::diff_inputs(&prev.inputs, &cur.inputs)
                .with_context(|| format!("diffing {name} {prev_date} -> {date}"))?;

            println!("{name} {prev_date} -> {date}");
            for output in &cur.outputs {
                match prev.outputs.iter().find(|o| o.name == output.name) {
                    Some(before) => println!(
                        "  {}: {} -> {} ({})",
                        output.name,
                        format_bytes(before.bytes as f64),
                        format_bytes(output.bytes as f64),
                        format_relative(output.bytes, before.bytes)
                    ),
                    None => println!("  {}: {} (new)", output.name, format_bytes(output.bytes as f64)),
                }
            }
            println!("  {changes}");
        }
    }
    Ok(())
}

// ── weight-tracker render ──────────────────────────────────────────────────

pub fn render(config: &Config, feed: &Path, output: &Path, relative: bool) -> Result<()> {
    let builds = read_feed(feed)?;
    let index = SeriesIndex::from_builds(&builds)?;
    let mode = if relative {
        RenderMode::Relative
    } else {
        RenderMode::Absolute
    };

    let html = page::render_page(&index, mode, &config.chart_script)?;
    write_file(output, html.as_bytes())
}

// ── weight-tracker benchmarks ──────────────────────────────────────────────

pub fn benchmarks() -> Result<()> {
    for spec in BENCHMARKS {
        let how = match spec.recipe {
            Recipe::WasmPack { .. } => "wasm-pack",
            Recipe::Cargo { .. } => "cargo",
            Recipe::Webpack { .. } => "webpack",
        };
        println!("{:<24} {:<10} {}", spec.name, how, spec.repo);
    }
    Ok(())
}

fn read_feed(path: &Path) -> Result<Vec<Build>> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parsing feed {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("serializing output")?;
    write_file(path, json.as_bytes())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}
