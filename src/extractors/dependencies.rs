//! Dependency manifests, one extractor per ecosystem
//!
//! Each extractor looks for its manifest at the scan root only. A missing
//! manifest, or one that declares nothing, produces no summary. A manifest
//! that exists but cannot be parsed is reported as an extractor failure.

use super::{ExtractionContext, Extractor, PartialMetrics};
use crate::models::DependencySummary;

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Names listed per manifest in the report
const MAX_LISTED: usize = 20;

fn swift_package_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"\.package\([^)]*url:\s*"([^"]+)""#).expect("valid regex"))
}

fn pod_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"^pod\s+['"]([^'"]+)['"]"#).expect("valid regex"))
}

/// Leading distribution name of a PEP 508 requirement
fn requirement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)").expect("valid regex"))
}

type ParseFn = fn(&str) -> Result<Vec<String>>;

/// Reads one manifest format
pub struct ManifestExtractor {
    name: &'static str,
    ecosystem: &'static str,
    manifest: &'static str,
    parse: ParseFn,
}

impl ManifestExtractor {
    /// Every supported ecosystem
    pub fn all() -> Vec<ManifestExtractor> {
        vec![
            Self::new("pyproject", "Python", "pyproject.toml", parse_pyproject),
            Self::new("requirements", "Python", "requirements.txt", parse_requirements),
            Self::new("npm", "JavaScript/Node.js", "package.json", parse_package_json),
            Self::new("cargo", "Rust", "Cargo.toml", parse_cargo),
            Self::new("gomod", "Go", "go.mod", parse_go_mod),
            Self::new("swiftpm", "Swift", "Package.swift", parse_package_swift),
            Self::new("cocoapods", "iOS/CocoaPods", "Podfile", parse_podfile),
        ]
    }

    fn new(
        name: &'static str,
        ecosystem: &'static str,
        manifest: &'static str,
        parse: ParseFn,
    ) -> Self {
        Self {
            name,
            ecosystem,
            manifest,
            parse,
        }
    }

    pub fn manifest(&self) -> &'static str {
        self.manifest
    }
}

impl Extractor for ManifestExtractor {
    fn name(&self) -> &'static str {
        self.name
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<Option<PartialMetrics>> {
        let Some(record) = ctx.root_file(self.manifest) else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&record.path)
            .with_context(|| format!("Failed to read {}", self.manifest))?;
        let names = (self.parse)(&content)
            .with_context(|| format!("Failed to parse {}", self.manifest))?;

        Ok(summarize(self.ecosystem, self.manifest, names).map(PartialMetrics::Dependencies))
    }
}

fn summarize(ecosystem: &str, manifest: &str, names: Vec<String>) -> Option<DependencySummary> {
    let unique: BTreeSet<String> = names.into_iter().filter(|n| !n.is_empty()).collect();
    if unique.is_empty() {
        return None;
    }

    Some(DependencySummary {
        ecosystem: ecosystem.to_string(),
        manifest_file: manifest.to_string(),
        dependency_count: unique.len(),
        dependencies: unique.into_iter().take(MAX_LISTED).collect(),
    })
}

fn requirement_name(spec: &str) -> Option<String> {
    requirement_pattern()
        .captures(spec.trim())
        .map(|c| c[1].to_string())
}

/// PEP 621 `project.dependencies` and Poetry's dependency table
fn parse_pyproject(content: &str) -> Result<Vec<String>> {
    let doc: toml::Value = toml::from_str(content)?;
    let mut names = Vec::new();

    if let Some(deps) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        names.extend(deps.iter().filter_map(|d| d.as_str()).filter_map(requirement_name));
    }

    if let Some(deps) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        // The interpreter constraint lives in the same table
        names.extend(deps.keys().filter(|k| k.as_str() != "python").cloned());
    }

    Ok(names)
}

fn parse_requirements(content: &str) -> Result<Vec<String>> {
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(requirement_name)
        .collect())
}

/// `dependencies` plus `devDependencies`
fn parse_package_json(content: &str) -> Result<Vec<String>> {
    let doc: serde_json::Value = serde_json::from_str(content)?;
    let mut names = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(deps) = doc.get(section).and_then(|d| d.as_object()) {
            names.extend(deps.keys().cloned());
        }
    }
    Ok(names)
}

fn parse_cargo(content: &str) -> Result<Vec<String>> {
    let doc: toml::Value = toml::from_str(content)?;
    Ok(doc
        .get("dependencies")
        .and_then(|d| d.as_table())
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default())
}

/// `require` lines and `require ( ... )` blocks
fn parse_go_mod(content: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut in_block = false;

    for line in content.lines().map(str::trim) {
        if in_block {
            if line.starts_with(')') {
                in_block = false;
            } else if let Some(module) = line.split_whitespace().next() {
                if !module.starts_with("//") {
                    names.push(module.to_string());
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("require") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = true;
            } else if let Some(module) = rest.split_whitespace().next() {
                names.push(module.to_string());
            }
        }
    }

    Ok(names)
}

/// Package names are the last URL segment without `.git`
fn parse_package_swift(content: &str) -> Result<Vec<String>> {
    Ok(swift_package_pattern()
        .captures_iter(content)
        .filter_map(|c| {
            let url = c[1].trim_end_matches('/');
            url.rsplit('/')
                .next()
                .map(|name| name.trim_end_matches(".git").to_string())
        })
        .collect())
}

fn parse_podfile(content: &str) -> Result<Vec<String>> {
    Ok(content
        .lines()
        .map(str::trim)
        .filter_map(|line| pod_pattern().captures(line).map(|c| c[1].to_string()))
        .collect())
}
