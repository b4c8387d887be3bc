// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fingerprint & Normalizer: turns one scanner's raw payload into
//! [`NormalizedFinding`] records on a single, stable identity so the
//! Lifecycle Engine can track them across scans.

use ctrlscan_core::finding::{FindingStatus, NormalizedFinding, Severity};
use ctrlscan_core::scanner::ScannerKind;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("invalid json payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Converts backslashes to forward slashes and strips the transient
/// clone-directory prefix, so the same file keeps the same path across
/// scans run from differently-named checkouts.
pub fn normalize_path(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let forward = raw.replace('\\', "/");
    const MARKER: &str = "/ctrlscan-clone-";
    match forward.find(MARKER) {
        Some(idx) => {
            let after_marker = &forward[idx + MARKER.len()..];
            match after_marker.find('/') {
                Some(slash) => after_marker[slash + 1..].to_string(),
                None => String::new(),
            }
        }
        None => forward,
    }
}

/// Trims and collapses interior whitespace runs to a single space.
pub fn collapse_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lower_trim(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

/// SHA-256 hex fingerprint per spec.md §4.B: identity core plus a
/// per-kind extension that controls how cosmetically different findings
/// collapse together.
pub fn fingerprint(kind: ScannerKind, scanner: &str, title: &str, package: &str, version: &str, file_path: &str, line: Option<u64>, message: &str) -> String {
    let mut parts = vec![
        lower_trim(&kind.to_string()),
        lower_trim(scanner),
        lower_trim(&collapse_space(title)),
        lower_trim(package),
        lower_trim(version),
        lower_trim(file_path),
    ];
    match kind {
        ScannerKind::Secrets => parts.push(line.unwrap_or(0).to_string()),
        ScannerKind::Sast | ScannerKind::Iac => parts.push(lower_trim(&collapse_space(message))),
        ScannerKind::Sca => {}
    }
    let joined = parts.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

/// Dispatches to the per-kind decoder matching a scanner's declared
/// `ScannerKind`, so callers holding a `Scanner` trait object don't need
/// their own kind-to-decoder match.
pub fn normalize_raw(
    kind: ScannerKind,
    scan_job_id: &str,
    scanner: &str,
    raw: &[u8],
) -> Result<Vec<NormalizedFinding>, NormalizeError> {
    match kind {
        ScannerKind::Sca => normalize_sca(scan_job_id, scanner, raw),
        ScannerKind::Sast => normalize_sast(scan_job_id, scanner, raw),
        ScannerKind::Secrets => normalize_secrets(scan_job_id, scanner, raw),
        ScannerKind::Iac => normalize_iac(scan_job_id, scanner, raw),
    }
}

/// Dedup by lowercased (kind, fingerprint), preserving first occurrence.
/// Records with an empty kind string or fingerprint are dropped outright.
pub fn dedup_findings(findings: Vec<NormalizedFinding>) -> Vec<NormalizedFinding> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(findings.len());
    for f in findings {
        if f.fingerprint.trim().is_empty() {
            continue;
        }
        let key = (f.kind.to_string().to_ascii_lowercase(), f.fingerprint.to_ascii_lowercase());
        if seen.insert(key) {
            out.push(f);
        }
    }
    out
}

fn blank_finding(scan_job_id: &str, kind: ScannerKind, scanner: &str) -> NormalizedFinding {
    NormalizedFinding {
        scan_job_id: scan_job_id.to_string(),
        kind,
        scanner: scanner.to_string(),
        fingerprint: String::new(),
        severity: Severity::Medium,
        title: String::new(),
        file_path: String::new(),
        line: None,
        message: String::new(),
        package: None,
        version: None,
        fix: None,
        status: FindingStatus::Open,
        first_seen_at_ms: 0,
        last_seen_at_ms: 0,
        introduced: false,
        reintroduced: false,
    }
}

fn str_field(v: &serde_json::Value, key: &str) -> String {
    v.get(key).and_then(|x| x.as_str()).unwrap_or_default().to_string()
}

/// Decodes osv-scanner-shaped output: `{"results": [{"source": {"path": ...},
/// "packages": [{"package": {"name", "version"}, "vulnerabilities": [{"id",
/// "summary", "database_specific": {"severity"}, "fix_versions": [...]}]}]}]}`.
pub fn normalize_sca(scan_job_id: &str, scanner: &str, raw: &[u8]) -> Result<Vec<NormalizedFinding>, NormalizeError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let doc: serde_json::Value = serde_json::from_slice(raw)?;
    let mut findings = Vec::new();
    let results = doc.get("results").and_then(|r| r.as_array()).cloned().unwrap_or_default();
    for result in &results {
        let file_path = normalize_path(&str_field(result.get("source").unwrap_or(&serde_json::Value::Null), "path"));
        let packages = result.get("packages").and_then(|p| p.as_array()).cloned().unwrap_or_default();
        for package in &packages {
            let pkg = package.get("package").cloned().unwrap_or(serde_json::Value::Null);
            let name = str_field(&pkg, "name");
            let version = str_field(&pkg, "version");
            let vulns = package.get("vulnerabilities").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            for vuln in &vulns {
                let vuln_id = str_field(vuln, "id");
                let description = str_field(vuln, "summary");
                let severity = vuln
                    .get("database_specific")
                    .and_then(|d| d.get("severity"))
                    .and_then(|s| s.as_str())
                    .and_then(Severity::parse)
                    .unwrap_or(Severity::Medium);
                let fix = vuln
                    .get("fix_versions")
                    .and_then(|f| f.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.as_str())
                    .map(str::to_string);

                let mut finding = blank_finding(scan_job_id, ScannerKind::Sca, scanner);
                finding.title = vuln_id.clone();
                finding.message = description;
                finding.package = Some(name.clone());
                finding.version = Some(version.clone());
                finding.file_path = file_path.clone();
                finding.severity = severity;
                finding.fix = fix;
                finding.fingerprint = fingerprint(
                    ScannerKind::Sca,
                    scanner,
                    &vuln_id,
                    &name,
                    &version,
                    &file_path,
                    None,
                    "",
                );
                findings.push(finding);
            }
        }
    }
    Ok(findings)
}

/// Decodes semgrep-shaped output: `{"results": [{"check_id", "path",
/// "start": {"line"}, "extra": {"severity", "message"}}]}`.
pub fn normalize_sast(scan_job_id: &str, scanner: &str, raw: &[u8]) -> Result<Vec<NormalizedFinding>, NormalizeError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let doc: serde_json::Value = serde_json::from_slice(raw)?;
    let mut findings = Vec::new();
    let results = doc.get("results").and_then(|r| r.as_array()).cloned().unwrap_or_default();
    for result in &results {
        let rule_id = str_field(result, "check_id");
        let file_path = normalize_path(&str_field(result, "path"));
        let line = result.get("start").and_then(|s| s.get("line")).and_then(|l| l.as_u64());
        let extra = result.get("extra").cloned().unwrap_or(serde_json::Value::Null);
        let message = str_field(&extra, "message");
        let severity = extra.get("severity").and_then(|s| s.as_str()).map(map_sast_severity).unwrap_or(Severity::Medium);

        let mut finding = blank_finding(scan_job_id, ScannerKind::Sast, scanner);
        finding.title = rule_id.clone();
        finding.message = message.clone();
        finding.file_path = file_path.clone();
        finding.line = line;
        finding.severity = severity;
        finding.fingerprint =
            fingerprint(ScannerKind::Sast, scanner, &rule_id, "", "", &file_path, line, &message);
        findings.push(finding);
    }
    Ok(findings)
}

fn map_sast_severity(s: &str) -> Severity {
    match s.to_ascii_uppercase().as_str() {
        "ERROR" => Severity::High,
        "WARNING" => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Decodes gitleaks NDJSON output: one `{"RuleID", "File"/"Description",
/// "StartLine", "Verified"}` object per line.
pub fn normalize_secrets(scan_job_id: &str, scanner: &str, raw: &[u8]) -> Result<Vec<NormalizedFinding>, NormalizeError> {
    let text = String::from_utf8_lossy(raw);
    let mut findings = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let doc: serde_json::Value = serde_json::from_str(trimmed)?;
        let (file_path, line_no) = extract_secret_location(&doc);
        let file_path = normalize_path(&file_path.unwrap_or_default());
        let detector = str_field(&doc, "RuleID");
        let verified = doc.get("Verified").and_then(|v| v.as_bool()).unwrap_or(false);
        let severity = if verified { Severity::High } else { Severity::Medium };
        let message =
            if verified { "Verified secret detected".to_string() } else { "Unverified secret candidate".to_string() };

        let mut finding = blank_finding(scan_job_id, ScannerKind::Secrets, scanner);
        finding.title = detector.clone();
        finding.message = message;
        finding.file_path = file_path.clone();
        finding.line = line_no;
        finding.severity = severity;
        finding.fingerprint =
            fingerprint(ScannerKind::Secrets, scanner, &detector, "", "", &file_path, line_no, "");
        findings.push(finding);
    }
    Ok(findings)
}

/// Decodes trivy-config-shaped output: `{"Results": [{"Target",
/// "Misconfigurations": [{"ID", "Title", "Severity", "CauseMetadata":
/// {"StartLine"}, "Description"}]}]}`.
pub fn normalize_iac(scan_job_id: &str, scanner: &str, raw: &[u8]) -> Result<Vec<NormalizedFinding>, NormalizeError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    let doc: serde_json::Value = serde_json::from_slice(raw)?;
    let mut findings = Vec::new();
    let results = doc.get("Results").and_then(|r| r.as_array()).cloned().unwrap_or_default();
    for result in &results {
        let target = normalize_path(&str_field(result, "Target"));
        let misconfigs = result.get("Misconfigurations").and_then(|m| m.as_array()).cloned().unwrap_or_default();
        for misconfig in &misconfigs {
            let id = str_field(misconfig, "ID");
            let title = str_field(misconfig, "Title");
            let description = str_field(misconfig, "Description");
            let severity =
                misconfig.get("Severity").and_then(|s| s.as_str()).and_then(Severity::parse).unwrap_or(Severity::Medium);
            let line = misconfig
                .get("CauseMetadata")
                .and_then(|c| c.get("StartLine"))
                .and_then(|l| l.as_u64());
            let display_title = if title.is_empty() { id.clone() } else { format!("{id}: {title}") };

            let mut finding = blank_finding(scan_job_id, ScannerKind::Iac, scanner);
            finding.title = display_title.clone();
            finding.message = description.clone();
            finding.file_path = target.clone();
            finding.line = line;
            finding.severity = severity;
            finding.fingerprint =
                fingerprint(ScannerKind::Iac, scanner, &display_title, "", "", &target, line, &description);
            findings.push(finding);
        }
    }
    Ok(findings)
}

/// Breadth-first search over gitleaks' nested metadata for the first
/// string under {file, filepath, path} and first numeric under {line,
/// linenumber, line_number}, case-insensitively, preferring a nested
/// `Data` sub-map when present (spec.md §4.B).
pub fn extract_secret_location(doc: &serde_json::Value) -> (Option<String>, Option<u64>) {
    const PATH_KEYS: [&str; 3] = ["file", "filepath", "path"];
    const LINE_KEYS: [&str; 3] = ["line", "linenumber", "line_number"];

    let root = doc.get("Data").unwrap_or(doc);
    let mut queue = std::collections::VecDeque::new();
    queue.push_back(root);

    let mut found_path = None;
    let mut found_line = None;

    while let Some(node) = queue.pop_front() {
        match node {
            serde_json::Value::Object(map) => {
                for (key, value) in map {
                    let lower = key.to_ascii_lowercase();
                    if found_path.is_none() && PATH_KEYS.contains(&lower.as_str()) {
                        if let Some(s) = value.as_str() {
                            found_path = Some(s.to_string());
                        }
                    }
                    if found_line.is_none() && LINE_KEYS.contains(&lower.as_str()) {
                        found_line = coerce_numeric(value);
                    }
                    queue.push_back(value);
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    queue.push_back(item);
                }
            }
            _ => {}
        }
        if found_path.is_some() && found_line.is_some() {
            break;
        }
    }

    (found_path, found_line)
}

fn coerce_numeric(v: &serde_json::Value) -> Option<u64> {
    if let Some(i) = v.as_u64() {
        return Some(i);
    }
    if let Some(f) = v.as_f64() {
        if f >= 0.0 {
            return Some(f as u64);
        }
    }
    if let Some(s) = v.as_str() {
        return s.trim().parse::<u64>().ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_strips_clone_marker_prefix() {
        let p = normalize_path("/tmp/ctrlscan-clone-9f8a/src\\main.rs");
        assert_eq!(p, "src/main.rs");
    }

    #[test]
    fn normalize_path_preserves_empty() {
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn collapse_space_trims_and_collapses_runs() {
        assert_eq!(collapse_space("  hello   world  "), "hello world");
    }

    #[test]
    fn fingerprint_is_stable_across_identical_inputs() {
        let a = fingerprint(ScannerKind::Sca, "osv-scanner", "GHSA-1", "lodash", "4.17.0", "package.json", None, "");
        let b = fingerprint(ScannerKind::Sca, "osv-scanner", "ghsa-1", "LODASH", "4.17.0", "package.json", None, "");
        assert_eq!(a, b, "lowercasing/trimming should make these collapse");
    }

    #[test]
    fn sca_fingerprint_ignores_message_variation() {
        let a = fingerprint(ScannerKind::Sca, "osv-scanner", "GHSA-1", "lodash", "4.17.0", "pkg.json", None, "msg a");
        let b = fingerprint(ScannerKind::Sca, "osv-scanner", "GHSA-1", "lodash", "4.17.0", "pkg.json", None, "msg b");
        assert_eq!(a, b);
    }

    #[test]
    fn sast_fingerprint_is_sensitive_to_message() {
        let a = fingerprint(ScannerKind::Sast, "semgrep", "rule-1", "", "", "main.rs", Some(10), "msg a");
        let b = fingerprint(ScannerKind::Sast, "semgrep", "rule-1", "", "", "main.rs", Some(10), "msg b");
        assert_ne!(a, b);
    }

    #[test]
    fn secrets_fingerprint_is_sensitive_to_line() {
        let a = fingerprint(ScannerKind::Secrets, "gitleaks", "aws-key", "", "", ".env", Some(3), "");
        let b = fingerprint(ScannerKind::Secrets, "gitleaks", "aws-key", "", "", ".env", Some(4), "");
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_keeps_first_occurrence_and_drops_empty() {
        let mut a = NormalizedFinding::fixture().build();
        a.fingerprint = "abc".to_string();
        a.title = "first".to_string();
        let mut b = NormalizedFinding::fixture().build();
        b.fingerprint = "ABC".to_string();
        b.title = "second".to_string();
        let mut c = NormalizedFinding::fixture().build();
        c.fingerprint = String::new();

        let out = dedup_findings(vec![a, b, c]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "first");
    }

    #[test]
    fn extract_secret_location_finds_nested_data_fields() {
        let doc = serde_json::json!({
            "RuleID": "aws-key",
            "Data": {
                "file": "src/config.rs",
                "nested": { "line_number": "42" }
            }
        });
        let (path, line) = extract_secret_location(&doc);
        assert_eq!(path.as_deref(), Some("src/config.rs"));
        assert_eq!(line, Some(42));
    }

    #[test]
    fn extract_secret_location_coerces_float_line_numbers() {
        let doc = serde_json::json!({"filepath": "a.env", "line": 7.0});
        let (path, line) = extract_secret_location(&doc);
        assert_eq!(path.as_deref(), Some("a.env"));
        assert_eq!(line, Some(7));
    }

    #[test]
    fn normalize_secrets_sets_severity_from_verified_flag() {
        let ndjson = b"{\"RuleID\":\"aws-key\",\"Verified\":true,\"Data\":{\"file\":\"a.env\",\"line\":1}}\n{\"RuleID\":\"slack-token\",\"Verified\":false,\"Data\":{\"file\":\"b.env\",\"line\":2}}\n";
        let findings = normalize_secrets("scj-1", "gitleaks", ndjson).unwrap();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].message, "Verified secret detected");
        assert_eq!(findings[1].severity, Severity::Medium);
    }

    #[test]
    fn normalize_sca_extracts_package_and_vuln_fields() {
        let raw = serde_json::json!({
            "results": [{
                "source": {"path": "package-lock.json"},
                "packages": [{
                    "package": {"name": "lodash", "version": "4.17.0"},
                    "vulnerabilities": [{
                        "id": "GHSA-abcd",
                        "summary": "prototype pollution",
                        "database_specific": {"severity": "HIGH"},
                        "fix_versions": ["4.17.21"]
                    }]
                }]
            }]
        });
        let findings = normalize_sca("scj-1", "osv-scanner", raw.to_string().as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].package.as_deref(), Some("lodash"));
        assert_eq!(findings[0].fix.as_deref(), Some("4.17.21"));
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn normalize_iac_combines_id_and_title() {
        let raw = serde_json::json!({
            "Results": [{
                "Target": "main.tf",
                "Misconfigurations": [{
                    "ID": "AVD-AWS-0001",
                    "Title": "Unencrypted bucket",
                    "Severity": "CRITICAL",
                    "Description": "S3 bucket is not encrypted",
                    "CauseMetadata": {"StartLine": 12}
                }]
            }]
        });
        let findings = normalize_iac("scj-1", "trivy", raw.to_string().as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "AVD-AWS-0001: Unencrypted bucket");
        assert_eq!(findings[0].line, Some(12));
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn normalize_sast_maps_semgrep_severity_levels() {
        let raw = serde_json::json!({
            "results": [{
                "check_id": "rust.lang.security.unwrap",
                "path": "src/main.rs",
                "start": {"line": 5},
                "extra": {"severity": "ERROR", "message": "avoid unwrap() in production code"}
            }]
        });
        let findings = normalize_sast("scj-1", "semgrep", raw.to_string().as_bytes()).unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].line, Some(5));
    }

    #[test]
    fn normalize_raw_dispatches_on_scanner_kind() {
        let raw = serde_json::json!({"results": []});
        let findings = normalize_raw(ScannerKind::Sast, "scj-1", "semgrep", raw.to_string().as_bytes()).unwrap();
        assert!(findings.is_empty());
    }
}
