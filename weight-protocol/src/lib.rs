use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Measurement file ([Benchmark], one per collector run) ─

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub name: String,
    pub inputs: Vec<InputRecord>,
    pub outputs: Vec<Output>,
}

impl Benchmark {
    pub fn new(name: &str) -> Benchmark {
        Benchmark {
            name: name.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn push_input(&mut self, input: Input) {
        self.inputs.push(InputRecord::Known(input));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub bytes: u64,
}

// ── Feed (data.json) ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Build {
    /// ISO 8601 timestamp
    pub date: String,
    pub data: Vec<Benchmark>,
}

// ── Input descriptors ───────────────────────────────────

/// Something that may have caused a size change between two builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Input {
    Git { url: String, rev: String },
    WasmPack { version: String },
    Rustc { rev: String },
    /// Cargo.lock converted from TOML to a JSON string.
    CargoLock { contents: String },
    PackageJsonLock { contents: String },
}

impl Input {
    pub const KINDS: [&'static str; 5] =
        ["git", "wasm-pack", "rustc", "cargo-lock", "package-json-lock"];

    /// The `type` tag this descriptor serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            Input::Git { .. } => "git",
            Input::WasmPack { .. } => "wasm-pack",
            Input::Rustc { .. } => "rustc",
            Input::CargoLock { .. } => "cargo-lock",
            Input::PackageJsonLock { .. } => "package-json-lock",
        }
    }
}

/// An input descriptor as found in a feed.
///
/// Descriptors with an unknown `type` tag are kept verbatim instead of
/// failing the whole document, so consumers decide how to treat them.
/// A known tag with malformed fields is still a decode error.
#[derive(Debug, Clone, PartialEq)]
pub enum InputRecord {
    Known(Input),
    Unrecognized {
        kind: String,
        raw: serde_json::Value,
    },
}

impl InputRecord {
    pub fn kind(&self) -> &str {
        match self {
            InputRecord::Known(input) => input.kind(),
            InputRecord::Unrecognized { kind, .. } => kind,
        }
    }
}

impl From<Input> for InputRecord {
    fn from(input: Input) -> Self {
        InputRecord::Known(input)
    }
}

impl Serialize for InputRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InputRecord::Known(input) => input.serialize(serializer),
            InputRecord::Unrecognized { raw, .. } => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for InputRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let kind = raw
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| D::Error::missing_field("type"))?
            .to_string();

        if Input::KINDS.contains(&kind.as_str()) {
            serde_json::from_value(raw)
                .map(InputRecord::Known)
                .map_err(D::Error::custom)
        } else {
            Ok(InputRecord::Unrecognized { kind, raw })
        }
    }
}

// ── Lockfile (cargo-lock contents) ──────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(default)]
    pub package: Vec<LockedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,
    pub version: String,
}

impl Lockfile {
    pub fn from_json(contents: &str) -> serde_json::Result<Lockfile> {
        serde_json::from_str(contents)
    }
}
