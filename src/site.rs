use anyhow::{Context, Result, bail};
use chrono::{NaiveDateTime, SecondsFormat};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::Command;
use weight_protocol::{Benchmark, Build};

use crate::command::run;

/// Clone the data repository into `dir` unless it is already there.
pub fn clone_data(repo: &str, dir: &Path) -> Result<()> {
    if dir.exists() {
        tracing::debug!("using existing data checkout at {}", dir.display());
        return Ok(());
    }
    run(Command::new("git").arg("clone").arg(repo).arg(dir))
        .with_context(|| format!("failed to clone {repo}"))
}

/// Read every `builds/*.json.gz` under `data_dir`, oldest first, keeping at
/// most the `limit` most recent.
pub fn read_builds(data_dir: &Path, limit: usize) -> Result<Vec<Build>> {
    let builds = read_data(&data_dir.join("builds"))?;
    let skip = builds.len().saturating_sub(limit);
    Ok(builds.into_iter().skip(skip).collect())
}

fn read_data(dir: &Path) -> Result<Vec<Build>> {
    let mut builds = Vec::new();
    let entries = fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(".json.gz") else {
            continue;
        };
        tracing::debug!("parsing: {name}");

        let date = parse_build_date(stem).with_context(|| format!("bad build file name {name}"))?;

        let contents = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let mut json = String::new();
        flate2::read::GzDecoder::new(&contents[..])
            .read_to_string(&mut json)
            .with_context(|| format!("decompressing {}", path.display()))?;
        let data: Vec<Benchmark> =
            serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;

        builds.push(Build { date, data });
    }

    tracing::debug!("found {} builds", builds.len());
    builds.sort_by(|a, b| a.date.cmp(&b.date));
    Ok(builds)
}

/// `2019-03-05-1200` -> `2019-03-05T12:00:00Z`
fn parse_build_date(stem: &str) -> Result<String> {
    let Ok(date) = NaiveDateTime::parse_from_str(stem, "%Y-%m-%d-%H%M") else {
        bail!("expected YYYY-MM-DD-HHMM, found {stem:?}");
    };
    Ok(date
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}
