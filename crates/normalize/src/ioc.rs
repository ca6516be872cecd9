// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Indicator-of-compromise extraction from known vendor shapes.
//!
//! Understands MISP `Attribute` arrays, OTX pulse `indicators`, and
//! VirusTotal object attributes. Unknown shapes yield an empty set.

use crate::path::get_path;
use sentra_core::IocSet;
use serde_json::Value;

/// Extract IOCs from a vendor payload into the four-bucket map.
pub fn extract_iocs(payload: &Value) -> IocSet {
    let mut set = IocSet::default();
    extract_misp(payload, &mut set);
    extract_otx(payload, &mut set);
    extract_virustotal(payload, &mut set);
    set
}

fn push_unique(bucket: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !bucket.iter().any(|v| v == value) {
        bucket.push(value.to_string());
    }
}

/// MISP events carry `Event.Attribute` (or a bare `Attribute`) arrays of
/// `{type, value}` pairs.
fn extract_misp(payload: &Value, set: &mut IocSet) {
    let attributes = get_path(payload, "Event.Attribute")
        .or_else(|| get_path(payload, "Attribute"))
        .and_then(Value::as_array);
    let Some(attributes) = attributes else { return };

    for attribute in attributes {
        let Some(ty) = attribute.get("type").and_then(Value::as_str) else { continue };
        let Some(value) = attribute.get("value").and_then(Value::as_str) else { continue };
        match ty {
            "ip-src" | "ip-dst" => push_unique(&mut set.ips, value),
            "domain" | "hostname" => push_unique(&mut set.domains, value),
            "md5" | "sha1" | "sha256" | "sha512" => push_unique(&mut set.hashes, value),
            "url" | "uri" => push_unique(&mut set.urls, value),
            _ => {}
        }
    }
}

/// OTX pulses carry `indicators` arrays of `{type, indicator}` pairs.
fn extract_otx(payload: &Value, set: &mut IocSet) {
    let Some(indicators) = payload.get("indicators").and_then(Value::as_array) else { return };

    for entry in indicators {
        let Some(ty) = entry.get("type").and_then(Value::as_str) else { continue };
        let Some(value) = entry.get("indicator").and_then(Value::as_str) else { continue };
        match ty {
            "IPv4" | "IPv6" => push_unique(&mut set.ips, value),
            "domain" | "hostname" => push_unique(&mut set.domains, value),
            "FileHash-MD5" | "FileHash-SHA1" | "FileHash-SHA256" => {
                push_unique(&mut set.hashes, value)
            }
            "URL" => push_unique(&mut set.urls, value),
            _ => {}
        }
    }
}

/// VirusTotal objects identify themselves via `type`/`id` and expose file
/// hashes under `attributes`.
fn extract_virustotal(payload: &Value, set: &mut IocSet) {
    let id = payload.get("id").and_then(Value::as_str);
    match payload.get("type").and_then(Value::as_str) {
        Some("ip_address") => {
            if let Some(id) = id {
                push_unique(&mut set.ips, id);
            }
        }
        Some("domain") => {
            if let Some(id) = id {
                push_unique(&mut set.domains, id);
            }
        }
        Some("url") => {
            if let Some(url) = get_path(payload, "attributes.url").and_then(Value::as_str) {
                push_unique(&mut set.urls, url);
            } else if let Some(id) = id {
                push_unique(&mut set.urls, id);
            }
        }
        _ => {}
    }
    for hash_key in ["attributes.sha256", "attributes.sha1", "attributes.md5"] {
        if let Some(hash) = get_path(payload, hash_key).and_then(Value::as_str) {
            push_unique(&mut set.hashes, hash);
        }
    }
}

#[cfg(test)]
#[path = "ioc_tests.rs"]
mod tests;
