//! Structural tests for layer boundaries.
//!
//! These scan source files so a stray import fails the build's tests rather
//! than surfacing in review.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

fn src(sub: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(sub)
}

/// Every `needle` occurrence in non-comment lines under `dir`, as `file:line: text`.
fn find_in(dir: &Path, needles: &[&str]) -> Vec<String> {
    let mut hits = Vec::new();
    for file in collect_rs_files(dir) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if needles.iter().any(|n| line.contains(n)) {
                hits.push(format!("{rel}:{}: {}", i + 1, line.trim()));
            }
        }
    }
    hits
}

#[test]
fn domain_is_pure() {
    let hits = find_in(
        &src("domain"),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::net",
            "reqwest",
        ],
    );
    assert!(hits.is_empty(), "domain/ must stay free of I/O:\n{}", hits.join("\n"));
}

#[test]
fn application_does_not_reach_into_outer_layers() {
    let hits = find_in(
        &src("application"),
        &["crate::infra", "crate::commands", "crate::output", "reqwest"],
    );
    assert!(
        hits.is_empty(),
        "application/ may only depend on domain/ and its own ports:\n{}",
        hits.join("\n")
    );
}

#[test]
fn http_client_lives_in_infra() {
    let mut hits = Vec::new();
    for layer in ["domain", "application", "commands", "output"] {
        hits.extend(find_in(&src(layer), &["reqwest"]));
    }
    assert!(hits.is_empty(), "reqwest used outside infra/:\n{}", hits.join("\n"));
}

#[test]
fn commands_do_not_branch_on_json() {
    let hits = find_in(&src("commands"), &["json: bool", "if json", "if !json", "is_json()"]);
    assert!(
        hits.is_empty(),
        "use app.renderer() instead of branching on --json in commands/:\n{}",
        hits.join("\n")
    );
}
