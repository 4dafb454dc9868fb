use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;
use weight_protocol::{Input, InputRecord, Lockfile};

/// Failure that aborts a whole `diff_inputs` call.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("urls differ: {before} vs {after}")]
    UrlMismatch { before: String, after: String },
    #[error("unknown input type: {kind}")]
    UnknownInputType { kind: String },
    #[error("malformed lockfile contents")]
    MalformedLockfile {
        #[source]
        source: serde_json::Error,
    },
}

/// Summarize what changed between the inputs of two samples as an HTML list.
///
/// Descriptors are paired greedily: each `before` descriptor takes the first
/// unused `after` descriptor of the same type. Lockfiles without a partner
/// are reported as entirely added or removed; other unpaired descriptors are
/// dropped.
pub fn diff_inputs(before: &[InputRecord], after: &[InputRecord]) -> Result<String, DiffError> {
    let mut used = vec![false; after.len()];
    let mut items = Vec::new();

    for a in before {
        let slot = after
            .iter()
            .enumerate()
            .find(|(i, b)| !used[*i] && Pair::of(a, b).is_some())
            .map(|(i, _)| i);

        match slot {
            Some(i) => {
                used[i] = true;
                if let Some(pair) = Pair::of(a, &after[i]) {
                    pair.render(&mut items)?;
                }
            }
            None => render_unpaired(a, Side::Before, &mut items)?,
        }
    }

    for (b, used) in after.iter().zip(&used) {
        if !used {
            render_unpaired(b, Side::After, &mut items)?;
        }
    }

    let mut html = String::from("<ul>");
    for item in &items {
        html.push_str("<li>");
        html.push_str(item);
        html.push_str("</li>");
    }
    html.push_str("</ul>");
    Ok(html)
}

/// Two descriptors of the same type, ready to be compared.
enum Pair<'a> {
    Git {
        before: (&'a str, &'a str),
        after: (&'a str, &'a str),
    },
    WasmPack(&'a str, &'a str),
    Rustc(&'a str, &'a str),
    CargoLock(&'a str, &'a str),
    PackageJsonLock,
    /// Same unknown `type` tag on both sides.
    Unrecognized(&'a str),
}

impl<'a> Pair<'a> {
    fn of(a: &'a InputRecord, b: &'a InputRecord) -> Option<Pair<'a>> {
        match (a, b) {
            (InputRecord::Known(a), InputRecord::Known(b)) => Pair::known(a, b),
            (
                InputRecord::Unrecognized { kind: ka, .. },
                InputRecord::Unrecognized { kind: kb, .. },
            ) if ka == kb => Some(Pair::Unrecognized(ka)),
            (InputRecord::Known(_), _) | (InputRecord::Unrecognized { .. }, _) => None,
        }
    }

    fn known(a: &'a Input, b: &'a Input) -> Option<Pair<'a>> {
        match (a, b) {
            (Input::Git { url: ua, rev: ra }, Input::Git { url: ub, rev: rb }) => Some(Pair::Git {
                before: (ua.as_str(), ra.as_str()),
                after: (ub.as_str(), rb.as_str()),
            }),
            (Input::WasmPack { version: va }, Input::WasmPack { version: vb }) => {
                Some(Pair::WasmPack(va, vb))
            }
            (Input::Rustc { rev: ra }, Input::Rustc { rev: rb }) => Some(Pair::Rustc(ra, rb)),
            (Input::CargoLock { contents: ca }, Input::CargoLock { contents: cb }) => {
                Some(Pair::CargoLock(ca, cb))
            }
            (Input::PackageJsonLock { .. }, Input::PackageJsonLock { .. }) => {
                Some(Pair::PackageJsonLock)
            }
            (Input::Git { .. }, _)
            | (Input::WasmPack { .. }, _)
            | (Input::Rustc { .. }, _)
            | (Input::CargoLock { .. }, _)
            | (Input::PackageJsonLock { .. }, _) => None,
        }
    }

    fn render(self, items: &mut Vec<String>) -> Result<(), DiffError> {
        match self {
            Pair::Git {
                before: (url_a, rev_a),
                after: (url_b, rev_b),
            } => {
                if rev_a == rev_b {
                    return Ok(());
                }
                if url_a != url_b {
                    return Err(DiffError::UrlMismatch {
                        before: url_a.to_string(),
                        after: url_b.to_string(),
                    });
                }
                items.push(git_change(url_a, rev_a, rev_b));
            }
            Pair::WasmPack(a, b) => {
                if a == b {
                    return Ok(());
                }
                let (a, b) = (version_token(a), version_token(b));
                let href = format!("https://github.com/rustwasm/wasm-pack/compare/v{a}...v{b}");
                items.push(link(&href, &format!("wasm-pack {a} -> {b}")));
            }
            Pair::Rustc(a, b) => {
                if a == b {
                    return Ok(());
                }
                let href = format!("https://github.com/rust-lang/rust/compare/{a}...{b}");
                items.push(link(&href, &format!("rustc {}...{}", short(a), short(b))));
            }
            Pair::CargoLock(a, b) => {
                let before = parse_lockfile(a)?;
                let after = parse_lockfile(b)?;
                items.extend(
                    diff_lockfiles(&before, &after)
                        .iter()
                        .map(LockfileChange::to_html),
                );
            }
            Pair::PackageJsonLock => {
                tracing::debug!("package-lock.json changes are not summarized");
            }
            Pair::Unrecognized(kind) => {
                return Err(DiffError::UnknownInputType {
                    kind: kind.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Side {
    Before,
    After,
}

fn render_unpaired(
    record: &InputRecord,
    side: Side,
    items: &mut Vec<String>,
) -> Result<(), DiffError> {
    let input = match record {
        InputRecord::Known(input) => input,
        InputRecord::Unrecognized { kind, .. } => {
            tracing::debug!("unpaired {kind} input ignored");
            return Ok(());
        }
    };
    match input {
        Input::CargoLock { contents } => {
            let lock = parse_lockfile(contents)?;
            let empty = Lockfile::default();
            let changes = match side {
                Side::Before => diff_lockfiles(&lock, &empty),
                Side::After => diff_lockfiles(&empty, &lock),
            };
            items.extend(changes.iter().map(LockfileChange::to_html));
        }
        Input::Git { .. } | Input::WasmPack { .. } | Input::Rustc { .. } => {}
        Input::PackageJsonLock { .. } => {
            tracing::debug!("unpaired package-lock.json ignored");
        }
    }
    Ok(())
}

fn parse_lockfile(contents: &str) -> Result<Lockfile, DiffError> {
    Lockfile::from_json(contents).map_err(|source| DiffError::MalformedLockfile { source })
}

/// One package-level difference between two lockfiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockfileChange {
    Upgraded {
        name: String,
        from: String,
        to: String,
    },
    Added {
        name: String,
        version: String,
    },
    Removed {
        name: String,
        version: String,
    },
}

impl LockfileChange {
    fn to_html(&self) -> String {
        escape_html(&self.to_string())
    }
}

impl fmt::Display for LockfileChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockfileChange::Upgraded { name, from, to } => {
                write!(f, "upgraded {name} {from} -> {to}")
            }
            LockfileChange::Added { name, version } => write!(f, "added {name} {version}"),
            LockfileChange::Removed { name, version } => write!(f, "removed {name} {version}"),
        }
    }
}

/// Package-level changes from `before` to `after`.
///
/// Exact (name, version) pairs present on both sides cancel out. Each
/// remaining `after` package is an upgrade of the first leftover `before`
/// version with the same name, or a plain addition. Whatever is left of
/// `before` was removed.
pub fn diff_lockfiles(before: &Lockfile, after: &Lockfile) -> Vec<LockfileChange> {
    let mut remaining: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for pkg in &before.package {
        remaining
            .entry(pkg.name.as_str())
            .or_default()
            .push(pkg.version.as_str());
    }

    let mut added = Vec::new();
    for pkg in &after.package {
        let versions = remaining.get_mut(pkg.name.as_str());
        match versions.and_then(|v| v.iter().position(|&x| x == pkg.version).map(|i| (v, i))) {
            Some((versions, i)) => {
                versions.remove(i);
            }
            None => added.push(pkg),
        }
    }

    let mut changes = Vec::new();
    for pkg in added {
        let previous = remaining
            .get_mut(pkg.name.as_str())
            .filter(|v| !v.is_empty())
            .map(|v| v.remove(0));
        changes.push(match previous {
            Some(from) => LockfileChange::Upgraded {
                name: pkg.name.clone(),
                from: from.to_string(),
                to: pkg.version.clone(),
            },
            None => LockfileChange::Added {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
            },
        });
    }

    for (name, versions) in remaining {
        for version in versions {
            changes.push(LockfileChange::Removed {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
    }

    changes
}

fn git_change(url: &str, from: &str, to: &str) -> String {
    let repo = url.trim_end_matches('/').trim_end_matches(".git");
    let name = repo.rsplit('/').next().unwrap_or(repo);
    let label = format!("{name} {}...{}", short(from), short(to));
    match compare_url(repo, from, to) {
        Some(href) => link(&href, &label),
        None => escape_html(&format!("{repo} {from}...{to}")),
    }
}

/// Compare view for hosts that have one.
fn compare_url(repo: &str, from: &str, to: &str) -> Option<String> {
    if repo.starts_with("https://github.com/") {
        Some(format!("{repo}/compare/{from}...{to}"))
    } else if repo.starts_with("https://gitlab.com/") {
        Some(format!("{repo}/-/compare/{from}...{to}"))
    } else {
        None
    }
}

/// `wasm-pack 0.6.0 (abc1234)` -> `0.6.0`
fn version_token(version: &str) -> &str {
    version
        .split_whitespace()
        .nth(1)
        .unwrap_or_else(|| version.trim())
}

fn short(rev: &str) -> &str {
    match rev.char_indices().nth(10) {
        Some((i, _)) => &rev[..i],
        None => rev,
    }
}

fn link(href: &str, text: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape_html(href), escape_html(text))
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use weight_protocol::LockedPackage;

    fn git(url: &str, rev: &str) -> InputRecord {
        Input::Git {
            url: url.to_string(),
            rev: rev.to_string(),
        }
        .into()
    }

    fn rustc(rev: &str) -> InputRecord {
        Input::Rustc {
            rev: rev.to_string(),
        }
        .into()
    }

    fn wasm_pack(version: &str) -> InputRecord {
        Input::WasmPack {
            version: version.to_string(),
        }
        .into()
    }

    fn lock(packages: &[(&str, &str)]) -> Lockfile {
        Lockfile {
            package: packages
                .iter()
                .map(|(name, version)| LockedPackage {
                    name: name.to_string(),
                    version: version.to_string(),
                })
                .collect(),
        }
    }

    fn cargo_lock(packages: &[(&str, &str)]) -> InputRecord {
        Input::CargoLock {
            contents: serde_json::to_string(&lock(packages)).unwrap(),
        }
        .into()
    }

    fn unknown(kind: &str) -> InputRecord {
        InputRecord::Unrecognized {
            kind: kind.to_string(),
            raw: serde_json::json!({ "type": kind }),
        }
    }

    const REPO: &str = "https://github.com/rustwasm/twiggy";

    #[test]
    fn test_git_same_rev_is_silent() {
        let html = diff_inputs(&[git(REPO, "abc")], &[git(REPO, "abc")]).unwrap();
        assert_eq!(html, "<ul></ul>");

        // Even when the url changed
        let html = diff_inputs(&[git(REPO, "abc")], &[git("https://github.com/x/y", "abc")]);
        assert_eq!(html.unwrap(), "<ul></ul>");
    }

    #[test]
    fn test_git_rev_change_links_compare_view() {
        let html = diff_inputs(&[git(REPO, "aaaa1111")], &[git(REPO, "bbbb2222")]).unwrap();
        assert_eq!(html.matches("<li>").count(), 1);
        assert!(html.contains("aaaa1111"));
        assert!(html.contains("bbbb2222"));
        assert!(html.contains(&format!("{REPO}/compare/aaaa1111...bbbb2222")));
    }

    #[test]
    fn test_git_url_mismatch() {
        let err = diff_inputs(
            &[git(REPO, "aaaa")],
            &[git("https://github.com/fitzgen/dodrio", "bbbb")],
        )
        .unwrap_err();
        assert!(matches!(err, DiffError::UrlMismatch { .. }));
    }

    #[test]
    fn test_url_mismatch_aborts_whole_diff() {
        let before = [rustc("r1"), git(REPO, "aaaa")];
        let after = [rustc("r2"), git("https://github.com/a/b", "bbbb")];
        assert!(diff_inputs(&before, &after).is_err());
    }

    #[test]
    fn test_git_other_host_is_plain_text() {
        let url = "https://example.org/repo.git";
        let html = diff_inputs(&[git(url, "aaaa")], &[git(url, "bbbb")]).unwrap();
        assert!(!html.contains("<a "));
        assert!(html.contains("aaaa...bbbb"));
    }

    #[test]
    fn test_compare_url_strips_git_suffix() {
        let url = "https://gitlab.com/group/proj.git";
        let html = diff_inputs(&[git(url, "aaaa")], &[git(url, "bbbb")]).unwrap();
        assert!(html.contains("https://gitlab.com/group/proj/-/compare/aaaa...bbbb"));
    }

    #[test]
    fn test_unknown_input_type() {
        let err = diff_inputs(&[unknown("yarn-lock")], &[unknown("yarn-lock")]).unwrap_err();
        match err {
            DiffError::UnknownInputType { kind } => assert_eq!(kind, "yarn-lock"),
            other => panic!("unexpected error: {other}"),
        }

        // Paired even when surrounded by known descriptors
        let before = [rustc("a"), unknown("nix")];
        let after = [unknown("nix"), rustc("b")];
        assert!(matches!(
            diff_inputs(&before, &after),
            Err(DiffError::UnknownInputType { .. })
        ));
    }

    #[test]
    fn test_unknown_input_type_without_partner_is_skipped() {
        let html = diff_inputs(&[rustc("a")], &[unknown("nix")]).unwrap();
        assert_eq!(html, "<ul></ul>");

        let html = diff_inputs(&[unknown("nix"), rustc("a")], &[rustc("b")]).unwrap();
        assert!(html.contains("compare/a...b"));

        // Different unknown tags never pair
        assert!(diff_inputs(&[unknown("nix")], &[unknown("yarn-lock")]).is_ok());
    }

    #[test]
    fn test_wasm_pack_version_change() {
        let html = diff_inputs(
            &[wasm_pack("wasm-pack 0.6.0 (aaa)")],
            &[wasm_pack("wasm-pack 0.7.0 (bbb)")],
        )
        .unwrap();
        assert!(html.contains("https://github.com/rustwasm/wasm-pack/compare/v0.6.0...v0.7.0"));

        let html = diff_inputs(
            &[wasm_pack("wasm-pack 0.6.0 (aaa)")],
            &[wasm_pack("wasm-pack 0.6.0 (aaa)")],
        )
        .unwrap();
        assert_eq!(html, "<ul></ul>");
    }

    #[test]
    fn test_version_token() {
        assert_eq!(version_token("wasm-pack 0.6.0 (abc)"), "0.6.0");
        assert_eq!(version_token("0.6.0\n"), "0.6.0");
    }

    #[test]
    fn test_rustc_change() {
        let html = diff_inputs(&[rustc("aaaa")], &[rustc("bbbb")]).unwrap();
        assert!(html.contains("https://github.com/rust-lang/rust/compare/aaaa...bbbb"));
        assert_eq!(diff_inputs(&[rustc("a")], &[rustc("a")]).unwrap(), "<ul></ul>");
    }

    #[test]
    fn test_disjoint_types_render_no_links() {
        let before = [rustc("aaaa"), cargo_lock(&[("foo", "1.0")])];
        let after = [git(REPO, "bbbb"), wasm_pack("wasm-pack 0.6.0")];
        let html = diff_inputs(&before, &after).unwrap();
        assert!(!html.contains("<a "));
        assert!(html.contains("removed foo 1.0"));
    }

    #[test]
    fn test_unpaired_lockfile_is_all_added() {
        let html = diff_inputs(&[], &[cargo_lock(&[("bar", "1.0"), ("baz", "0.2")])]).unwrap();
        assert!(html.contains("<li>added bar 1.0</li>"));
        assert!(html.contains("<li>added baz 0.2</li>"));
    }

    #[test]
    fn test_lockfile_unchanged() {
        let html = diff_inputs(&[cargo_lock(&[("foo", "1.0")])], &[cargo_lock(&[("foo", "1.0")])])
            .unwrap();
        assert!(!html.contains("foo"));
    }

    #[test]
    fn test_lockfile_upgrade() {
        let html = diff_inputs(&[cargo_lock(&[("foo", "1.0")])], &[cargo_lock(&[("foo", "2.0")])])
            .unwrap();
        assert_eq!(html, "<ul><li>upgraded foo 1.0 -&gt; 2.0</li></ul>");
    }

    #[test]
    fn test_lockfile_malformed() {
        let bad: InputRecord = Input::CargoLock {
            contents: "[[package]]".to_string(),
        }
        .into();
        let err = diff_inputs(&[bad], &[cargo_lock(&[])]).unwrap_err();
        assert!(matches!(err, DiffError::MalformedLockfile { .. }));
    }

    #[test]
    fn test_diff_lockfiles_added() {
        let changes = diff_lockfiles(&lock(&[]), &lock(&[("bar", "1.0")]));
        assert_eq!(
            changes,
            vec![LockfileChange::Added {
                name: "bar".to_string(),
                version: "1.0".to_string()
            }]
        );
        assert_eq!(changes[0].to_string(), "added bar 1.0");
    }

    #[test]
    fn test_diff_lockfiles_multiple_versions() {
        // Two copies of `syn` before, one kept and one bumped
        let before = lock(&[("syn", "0.15.0"), ("syn", "1.0.0"), ("old", "0.1")]);
        let after = lock(&[("syn", "1.0.0"), ("syn", "2.0.0"), ("new", "3.0")]);
        let changes = diff_lockfiles(&before, &after);
        assert_eq!(
            changes,
            vec![
                LockfileChange::Upgraded {
                    name: "syn".to_string(),
                    from: "0.15.0".to_string(),
                    to: "2.0.0".to_string()
                },
                LockfileChange::Added {
                    name: "new".to_string(),
                    version: "3.0".to_string()
                },
                LockfileChange::Removed {
                    name: "old".to_string(),
                    version: "0.1".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_duplicate_types_pair_in_after_order() {
        let before = [rustc("a"), rustc("b")];
        let after = [rustc("a"), rustc("c")];
        // First `before` takes first `after`, second takes second
        let html = diff_inputs(&before, &after).unwrap();
        assert_eq!(html.matches("<li>").count(), 1);
        assert!(html.contains("compare/b...c"));

        // Reversed order mismatches both pairs
        let after = [rustc("c"), rustc("a")];
        let html = diff_inputs(&before, &after).unwrap();
        assert_eq!(html.matches("<li>").count(), 2);
    }

    #[test]
    fn test_package_json_lock_ignored() {
        let a: InputRecord = Input::PackageJsonLock {
            contents: "{}".to_string(),
        }
        .into();
        let b: InputRecord = Input::PackageJsonLock {
            contents: "{\"x\":1}".to_string(),
        }
        .into();
        assert_eq!(diff_inputs(&[a], &[b]).unwrap(), "<ul></ul>");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
