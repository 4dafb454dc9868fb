use assert_cmd::Command;
use flate2::Compression;
use flate2::write::GzEncoder;
use predicates::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// The binary with config and work dirs pointed into `home`.
fn tracker(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("weight-tracker").unwrap();
    cmd.env("XDG_CONFIG_HOME", home.join("config"))
        .env("WEIGHT_TRACKER_WORK_DIR", home.join("work"))
        .env_remove("WEIGHT_TRACKER_HISTORY")
        .env_remove("WEIGHT_TRACKER_LOG");
    cmd
}

fn benchmark(rustc: &str, wasm_bytes: u64) -> serde_json::Value {
    serde_json::json!({
        "name": "twiggy",
        "inputs": [
            { "type": "git", "url": "https://github.com/rustwasm/twiggy", "rev": "1111111111aa" },
            { "type": "rustc", "rev": rustc },
        ],
        "outputs": [
            { "name": "wasm", "bytes": wasm_bytes },
        ],
    })
}

fn write_feed(dir: &Path) -> PathBuf {
    let feed = serde_json::json!([
        { "date": "2019-03-01T00:00:00Z", "data": [benchmark("aaaaaaaaaaaa", 2048)] },
        { "date": "2019-03-02T00:00:00Z", "data": [benchmark("bbbbbbbbbbbb", 1024)] },
    ]);
    let path = dir.join("data.json");
    std::fs::write(&path, feed.to_string()).unwrap();
    path
}

fn write_gz_build(builds_dir: &Path, stem: &str, benchmarks: &serde_json::Value) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(benchmarks.to_string().as_bytes())
        .unwrap();
    std::fs::write(
        builds_dir.join(format!("{stem}.json.gz")),
        encoder.finish().unwrap(),
    )
    .unwrap();
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    tracker(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("weight-tracker"))
        .stdout(predicate::str::contains("render"));
}

#[test]
fn test_cli_benchmarks() {
    let home = TempDir::new().unwrap();
    tracker(home.path())
        .arg("benchmarks")
        .assert()
        .success()
        .stdout(predicate::str::contains("twiggy"))
        .stdout(predicate::str::contains("rust-webpack-template"));
}

#[test]
fn test_cli_merge() {
    let home = TempDir::new().unwrap();
    let a = home.path().join("a.json");
    let b = home.path().join("b.json");
    std::fs::write(&a, serde_json::json!([benchmark("aa", 1)]).to_string()).unwrap();
    std::fs::write(&b, serde_json::json!([benchmark("bb", 2)]).to_string()).unwrap();
    let out = home.path().join("out/merged.json");

    tracker(home.path())
        .arg("merge")
        .arg(&out)
        .arg(&a)
        .arg(&b)
        .assert()
        .success();

    let merged: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    let merged = merged.as_array().unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[1]["outputs"][0]["bytes"], 2);
}

#[test]
fn test_cli_merge_missing_input() {
    let home = TempDir::new().unwrap();
    tracker(home.path())
        .arg("merge")
        .arg(home.path().join("out.json"))
        .arg(home.path().join("nope.json"))
        .assert()
        .failure();
}

#[test]
fn test_cli_diff() {
    let home = TempDir::new().unwrap();
    let feed = write_feed(home.path());

    tracker(home.path())
        .arg("diff")
        .arg(&feed)
        .assert()
        .success()
        .stdout(predicate::str::contains("twiggy 2019-03-01T00:00:00Z -> 2019-03-02T00:00:00Z"))
        .stdout(predicate::str::contains(
            "https://github.com/rust-lang/rust/compare/aaaaaaaaaaaa...bbbbbbbbbbbb",
        ))
        .stdout(predicate::str::contains("2KB -> 1KB (50%)"));
}

#[test]
fn test_cli_diff_unknown_input_type_fails() {
    let home = TempDir::new().unwrap();
    let with_npm = |rustc: &str, version: &str| {
        let mut b = benchmark(rustc, 1);
        b["inputs"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "type": "npm", "version": version }));
        b
    };
    let feed = serde_json::json!([
        { "date": "2019-03-01T00:00:00Z", "data": [with_npm("aa", "6")] },
        { "date": "2019-03-02T00:00:00Z", "data": [with_npm("bb", "7")] },
    ]);
    let path = home.path().join("data.json");
    std::fs::write(&path, feed.to_string()).unwrap();

    tracker(home.path())
        .arg("diff")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("npm"));
}

#[test]
fn test_cli_diff_one_sided_unknown_input_type() {
    let home = TempDir::new().unwrap();
    let mut b = benchmark("bb", 2);
    b["inputs"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "type": "npm", "version": "7" }));
    let feed = serde_json::json!([
        { "date": "2019-03-01T00:00:00Z", "data": [benchmark("aa", 1)] },
        { "date": "2019-03-02T00:00:00Z", "data": [b] },
    ]);
    let path = home.path().join("data.json");
    std::fs::write(&path, feed.to_string()).unwrap();

    tracker(home.path())
        .arg("diff")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("rust-lang/rust/compare/aa...bb"));
}

#[test]
fn test_cli_render() {
    let home = TempDir::new().unwrap();
    let feed = write_feed(home.path());
    let out = home.path().join("site/index.html");

    tracker(home.path())
        .arg("render")
        .arg(&feed)
        .arg(&out)
        .assert()
        .success();

    let html = std::fs::read_to_string(out).unwrap();
    assert!(html.contains("id=\"twiggy\""));
    assert!(html.contains("https://code.highcharts.com/highcharts.js"));
}

#[test]
fn test_cli_render_uses_config_file() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("config/weight-tracker");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        "[tracker]\nchart_script = \"/vendor/hc.js\"\n",
    )
    .unwrap();
    let feed = write_feed(home.path());
    let out = home.path().join("index.html");

    tracker(home.path())
        .arg("render")
        .arg("--relative")
        .arg(&feed)
        .arg(&out)
        .assert()
        .success();

    let html = std::fs::read_to_string(out).unwrap();
    assert!(html.contains("/vendor/hc.js"));
}

#[test]
fn test_cli_site_local() {
    let home = TempDir::new().unwrap();
    let data = home.path().join("data");
    let builds = data.join("builds");
    std::fs::create_dir_all(&builds).unwrap();
    write_gz_build(&builds, "2019-03-02-1200", &serde_json::json!([benchmark("bb", 2)]));
    write_gz_build(&builds, "2019-03-01-1200", &serde_json::json!([benchmark("aa", 1)]));
    write_gz_build(&builds, "2019-02-28-1200", &serde_json::json!([benchmark("zz", 0)]));
    let out = home.path().join("data.json");

    tracker(home.path())
        .arg("site")
        .arg(&out)
        .arg("--local")
        .arg(&data)
        .arg("--limit")
        .arg("2")
        .assert()
        .success();

    let feed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    let feed = feed.as_array().unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0]["date"], "2019-03-01T12:00:00Z");
    assert_eq!(feed[1]["date"], "2019-03-02T12:00:00Z");
}

#[test]
fn test_cli_site_needs_source() {
    let home = TempDir::new().unwrap();
    tracker(home.path())
        .arg("site")
        .arg(home.path().join("data.json"))
        .assert()
        .failure();
}

#[test]
fn test_cli_measure_unknown_benchmark() {
    let home = TempDir::new().unwrap();
    tracker(home.path())
        .arg("measure")
        .arg(home.path().join("out.json"))
        .arg("left-pad")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown benchmark: left-pad"));
}
