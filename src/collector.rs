use anyhow::{Context, Result, bail};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use weight_protocol::{Benchmark, Input, Output};

use crate::command::{run, run_output};

/// How a benchmark project is built and which artifacts are weighed.
#[derive(Debug, Clone, Copy)]
pub enum Recipe {
    /// `wasm-pack build` in `dir`; weighs the JS shim and the wasm.
    WasmPack {
        crate_name: &'static str,
        dir: &'static str,
    },
    /// `cargo build --release --target wasm32-unknown-unknown`, stripped.
    Cargo {
        crate_name: &'static str,
        dir: &'static str,
    },
    /// wasm-pack for the crate, then the project's webpack build.
    Webpack {
        crate_name: &'static str,
        crate_dir: &'static str,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct BenchmarkSpec {
    pub name: &'static str,
    pub repo: &'static str,
    pub recipe: Recipe,
}

pub const BENCHMARKS: &[BenchmarkSpec] = &[
    BenchmarkSpec {
        name: "twiggy",
        repo: "https://github.com/rustwasm/twiggy",
        recipe: Recipe::WasmPack {
            crate_name: "twiggy_wasm_api",
            dir: "wasm-api",
        },
    },
    BenchmarkSpec {
        name: "dodrio-todomvc",
        repo: "https://github.com/fitzgen/dodrio",
        recipe: Recipe::WasmPack {
            crate_name: "dodrio_todomvc",
            dir: "examples/todomvc",
        },
    },
    BenchmarkSpec {
        name: "source-map-mappings",
        repo: "https://github.com/fitzgen/source-map-mappings",
        recipe: Recipe::Cargo {
            crate_name: "source_map_mappings_wasm_api",
            dir: "source-map-mappings-wasm-api",
        },
    },
    BenchmarkSpec {
        name: "game-of-life",
        repo: "https://github.com/rustwasm/wasm_game_of_life",
        recipe: Recipe::WasmPack {
            crate_name: "wasm_game_of_life",
            dir: "",
        },
    },
    BenchmarkSpec {
        name: "rust-webpack-template",
        repo: "https://github.com/rustwasm/rust-webpack-template",
        recipe: Recipe::Webpack {
            crate_name: "rust_webpack",
            crate_dir: "crate",
        },
    },
    BenchmarkSpec {
        name: "squoosh-rotate",
        repo: "https://github.com/GoogleChromeLabs/squoosh",
        recipe: Recipe::Cargo {
            crate_name: "rotate",
            dir: "codecs/rotate",
        },
    },
];

/// Look up a benchmark by name. `dodrio_todomvc` and `dodrio-todomvc` are
/// the same benchmark.
pub fn find_benchmark(name: &str) -> Option<&'static BenchmarkSpec> {
    let name = name.replace('_', "-");
    BENCHMARKS.iter().find(|b| b.name == name)
}

/// Builds benchmark projects under a scratch directory and records their
/// inputs and output sizes.
pub struct Collector<'a> {
    tmp: &'a Path,
}

impl<'a> Collector<'a> {
    pub fn new(tmp: &'a Path) -> Self {
        Collector { tmp }
    }

    pub fn measure(&self, names: &[String]) -> Result<Vec<Benchmark>> {
        fs::create_dir_all(self.cargo_target_dir())
            .with_context(|| format!("creating {}", self.cargo_target_dir().display()))?;

        // Resolve every name before the first (slow) build
        let specs = names
            .iter()
            .map(|name| find_benchmark(name).with_context(|| format!("unknown benchmark: {name}")))
            .collect::<Result<Vec<_>>>()?;

        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            tracing::info!("measuring {}", spec.name);
            let b = self
                .measure_one(spec)
                .with_context(|| format!("measuring {}", spec.name))?;
            results.push(b);
        }
        Ok(results)
    }

    fn measure_one(&self, spec: &BenchmarkSpec) -> Result<Benchmark> {
        let mut b = Benchmark::new(spec.name);
        let root = self.git_clone(spec.repo, &mut b)?;

        match spec.recipe {
            Recipe::WasmPack { crate_name, dir } => {
                self.wasm_pack_build(crate_name, &root.join(dir), &mut b)?;
            }
            Recipe::Cargo { crate_name, dir } => {
                self.cargo_build(&root.join(dir), crate_name, &mut b)?;
            }
            Recipe::Webpack {
                crate_name,
                crate_dir,
            } => {
                self.wasm_pack_build(crate_name, &root.join(crate_dir), &mut b)?;
                self.npm_install(&root, &mut b)?;
                self.webpack_build(&root, &mut b)?;
            }
        }
        Ok(b)
    }

    fn git_clone(&self, url: &str, b: &mut Benchmark) -> Result<PathBuf> {
        let dst = self.tmp.join(&b.name);

        if !dst.exists() {
            run(Command::new("git").arg("clone").arg(url).arg(&dst))
                .with_context(|| format!("failed to clone {url}"))?;
        }
        let rev = run_output(
            Command::new("git")
                .arg("rev-parse")
                .arg("HEAD")
                .current_dir(&dst),
        )?;
        b.push_input(Input::Git {
            url: url.to_string(),
            rev: rev.trim().to_string(),
        });

        Ok(dst)
    }

    fn wasm_pack_build(&self, crate_name: &str, root: &Path, b: &mut Benchmark) -> Result<()> {
        tracing::debug!("wasm-pack build {}", root.display());
        let version = run_output(Command::new("wasm-pack").arg("--version"))?;
        b.push_input(Input::WasmPack {
            version: version.trim().to_string(),
        });

        self.add_rustc_version(b)?;

        run(Command::new("wasm-pack")
            .arg("build")
            .current_dir(root)
            .env("CARGO_TARGET_DIR", self.cargo_target_dir()))?;
        b.push_input(lockfile_input(root)?);

        let pkg = root.join("pkg");
        let js = pkg.join(crate_name).with_extension("js");
        let wasm = pkg.join(format!("{crate_name}_bg.wasm"));
        push_output(b, "wasm-bindgen js shim", file_size(&js)?);
        push_output(b, "wasm-bindgen wasm", file_size(&wasm)?);
        push_output(b, "wasm-bindgen js shim (gz)", gzip_size(&js)?);
        push_output(b, "wasm-bindgen wasm (gz)", gzip_size(&wasm)?);
        Ok(())
    }

    fn cargo_build(&self, manifest_dir: &Path, crate_name: &str, b: &mut Benchmark) -> Result<()> {
        tracing::debug!("cargo build {}", manifest_dir.display());
        self.add_rustc_version(b)?;

        run(Command::new("cargo")
            .arg("build")
            .arg("--release")
            .arg("--target")
            .arg("wasm32-unknown-unknown")
            .current_dir(manifest_dir)
            .env("CARGO_TARGET_DIR", self.cargo_target_dir()))?;
        b.push_input(lockfile_input(manifest_dir)?);

        let wasm = self
            .cargo_target_dir()
            .join("wasm32-unknown-unknown")
            .join("release")
            .join(crate_name)
            .with_extension("wasm");

        // Debug info and the name section are not part of what ships
        run(Command::new("wasm-strip").arg(&wasm))?;

        push_output(b, "wasm", file_size(&wasm)?);
        push_output(b, "wasm (gz)", gzip_size(&wasm)?);
        Ok(())
    }

    fn add_rustc_version(&self, b: &mut Benchmark) -> Result<()> {
        let verbose = run_output(Command::new("rustc").arg("-vV"))?;
        b.push_input(Input::Rustc {
            rev: parse_rustc_commit(&verbose)?,
        });
        Ok(())
    }

    fn npm_install(&self, root: &Path, b: &mut Benchmark) -> Result<()> {
        if !root.join("node_modules").exists() {
            run(Command::new("npm").arg("install").current_dir(root))?;
        }
        let path = root.join("package-lock.json");
        let contents =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        b.push_input(Input::PackageJsonLock { contents });
        Ok(())
    }

    fn webpack_build(&self, root: &Path, b: &mut Benchmark) -> Result<()> {
        let dist = root.join("dist");
        run(Command::new("npm")
            .arg("run")
            .arg("build")
            .arg("--")
            .arg("-p")
            .arg("--out-dir")
            .arg(&dist)
            .env("CARGO_TARGET_DIR", self.cargo_target_dir())
            .current_dir(root))?;

        let sizes = dist_sizes(&dist)?;
        push_output(b, "webpack-generated js", sizes.js);
        push_output(b, "webpack-generated wasm", sizes.wasm);
        push_output(b, "webpack-generated js (gz)", sizes.js_gz);
        push_output(b, "webpack-generated wasm (gz)", sizes.wasm_gz);
        Ok(())
    }

    fn cargo_target_dir(&self) -> PathBuf {
        self.tmp.join("target")
    }
}

/// Summed sizes of the `.js` and `.wasm` files of a bundle directory.
#[derive(Debug, Default, PartialEq)]
struct DistSizes {
    js: u64,
    js_gz: u64,
    wasm: u64,
    wasm_gz: u64,
}

fn dist_sizes(dist: &Path) -> Result<DistSizes> {
    let mut sizes = DistSizes::default();
    let entries = fs::read_dir(dist).with_context(|| format!("reading {}", dist.display()))?;
    for entry in entries {
        let path = entry?.path();
        match path.extension().and_then(|s| s.to_str()) {
            Some("js") => {
                sizes.js += file_size(&path)?;
                sizes.js_gz += gzip_size(&path)?;
            }
            Some("wasm") => {
                sizes.wasm += file_size(&path)?;
                sizes.wasm_gz += gzip_size(&path)?;
            }
            _ => {}
        }
    }
    Ok(sizes)
}

fn push_output(b: &mut Benchmark, name: &str, bytes: u64) {
    b.outputs.push(Output {
        name: name.to_string(),
        bytes,
    });
}

fn file_size(path: &Path) -> Result<u64> {
    Ok(fs::metadata(path)
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len())
}

/// Size of the file after gzip at the default level.
pub fn gzip_size(path: &Path) -> Result<u64> {
    let input = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&input)?;
    Ok(encoder.finish()?.len() as u64)
}

/// The `commit-hash: ...` line of `rustc -vV`.
pub fn parse_rustc_commit(verbose: &str) -> Result<String> {
    verbose
        .lines()
        .find(|l| l.starts_with("commit-hash: "))
        .and_then(|l| l.split_whitespace().nth(1))
        .map(str::to_string)
        .context("failed to find rustc commit hash")
}

/// Cargo.lock of `dir` (or its closest ancestor), as a JSON input descriptor.
pub fn lockfile_input(dir: &Path) -> Result<Input> {
    let path = find_lockfile(dir)?;
    let contents =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let toml: toml::Value =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Input::CargoLock {
        contents: serde_json::to_string(&toml)?,
    })
}

fn find_lockfile(root: &Path) -> Result<PathBuf> {
    for dir in root.ancestors() {
        let candidate = dir.join("Cargo.lock");
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    bail!("could not find `Cargo.lock` in {}", root.display())
}

/// Concatenate measurement files (each a JSON `[Benchmark]`) in order.
pub fn merge(inputs: &[PathBuf]) -> Result<Vec<Benchmark>> {
    let mut benchmarks = Vec::new();
    for input in inputs {
        let json = fs::read_to_string(input)
            .with_context(|| format!("failed to read {}", input.display()))?;
        let parsed: Vec<Benchmark> = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", input.display()))?;
        tracing::debug!("{}: {} benchmarks", input.display(), parsed.len());
        benchmarks.extend(parsed);
    }
    Ok(benchmarks)
}
