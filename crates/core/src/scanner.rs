// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-scanner outcomes and raw output persistence (spec.md §3's
//! `ScanJobScanner` and `RawScannerOutput`).

use serde::{Deserialize, Serialize};

/// The four scanner families the Normalizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    Sca,
    Sast,
    Secrets,
    Iac,
}

crate::display_as! {
    ScannerKind {
        Sca => "sca",
        Sast => "sast",
        Secrets => "secrets",
        Iac => "iac",
    }
}

impl ScannerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sca" => Some(Self::Sca),
            "sast" => Some(Self::Sast),
            "secrets" => Some(Self::Secrets),
            "iac" => Some(Self::Iac),
            _ => None,
        }
    }

    /// Content-type written with a scanner's raw output when it produces
    /// bytes. Every kind defaults to JSON except secrets, which is NDJSON.
    pub fn default_content_type(&self) -> &'static str {
        match self {
            Self::Secrets => "application/x-ndjson",
            _ => "application/json",
        }
    }
}

/// Outcome of one scanner adapter's run within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerRunStatus {
    Completed,
    Failed,
    Skipped,
}

crate::display_as! {
    ScannerRunStatus {
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// One row per scanner per job: spec.md §3's `ScanJobScanner`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobScanner {
    pub scan_job_id: String,
    pub scanner_name: String,
    pub scanner_type: ScannerKind,
    pub status: ScannerRunStatus,
    pub findings_count: u32,
    pub duration_ms: u64,
    pub error_msg: Option<String>,
    pub hint: Option<String>,
}

/// Opaque scanner payload bytes, keyed by (scan_job_id, scanner_name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawScannerOutput {
    pub scan_job_id: String,
    pub scanner_name: String,
    pub content_type: String,
    #[serde(with = "raw_bytes_as_base64")]
    pub payload: Vec<u8>,
}

/// Raw scanner payloads travel over the wire and through the WAL as JSON, so
/// they're base64-encoded rather than serialized as a byte array.
mod raw_bytes_as_base64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        base64_encode(bytes).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64_decode(&s).map_err(serde::de::Error::custom)
    }

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    fn base64_encode(data: &[u8]) -> String {
        let mut out = String::with_capacity((data.len() + 2) / 3 * 4);
        for chunk in data.chunks(3) {
            let b0 = chunk[0];
            let b1 = *chunk.get(1).unwrap_or(&0);
            let b2 = *chunk.get(2).unwrap_or(&0);
            out.push(ALPHABET[(b0 >> 2) as usize] as char);
            out.push(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
            out.push(if chunk.len() > 1 {
                ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
            } else {
                '='
            });
            out.push(if chunk.len() > 2 { ALPHABET[(b2 & 0x3f) as usize] as char } else { '=' });
        }
        out
    }

    fn base64_decode(s: &str) -> Result<Vec<u8>, String> {
        fn val(c: u8) -> Option<u8> {
            ALPHABET.iter().position(|&a| a == c).map(|p| p as u8)
        }
        let clean: Vec<u8> = s.bytes().filter(|&b| b != b'=').collect();
        let mut out = Vec::with_capacity(clean.len() * 3 / 4);
        for chunk in clean.chunks(4) {
            let vals: Vec<u8> = chunk
                .iter()
                .map(|&b| val(b).ok_or_else(|| format!("invalid base64 byte: {b}")))
                .collect::<Result<_, _>>()?;
            out.push((vals[0] << 2) | (vals.get(1).copied().unwrap_or(0) >> 4));
            if vals.len() > 2 {
                out.push((vals[1] << 4) | (vals[2] >> 2));
            }
            if vals.len() > 3 {
                out.push((vals[2] << 6) | vals[3]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_content_type_is_ndjson_only_for_secrets() {
        assert_eq!(ScannerKind::Secrets.default_content_type(), "application/x-ndjson");
        assert_eq!(ScannerKind::Sca.default_content_type(), "application/json");
        assert_eq!(ScannerKind::Iac.default_content_type(), "application/json");
    }

    #[test]
    fn raw_output_payload_round_trips_through_json() {
        let raw = RawScannerOutput {
            scan_job_id: "scj-1".into(),
            scanner_name: "osv-scanner".into(),
            content_type: "application/json".into(),
            payload: b"{\"ok\":true}".to_vec(),
        };
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawScannerOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, raw.payload);
    }

    #[test]
    fn kind_parse_round_trips_through_display() {
        for k in [ScannerKind::Sca, ScannerKind::Sast, ScannerKind::Secrets, ScannerKind::Iac] {
            assert_eq!(ScannerKind::parse(&k.to_string()), Some(k));
        }
    }
}
