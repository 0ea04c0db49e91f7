use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::jpeg::Jpeg;
use std::path::Path;

use super::{HIERARCHICAL_SUBJECT, MetadataRecord, MetadataSource, MetadataValue, SUBJECT};

const XMP_HEADER: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Native metadata source: reads the XMP APP1 packet out of the JPEG.
///
/// Holds no resources; each call reads and parses one file.
#[derive(Debug, Default)]
pub struct XmpSource;

impl XmpSource {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataSource for XmpSource {
    fn name(&self) -> &str {
        "xmp"
    }

    fn extract(&mut self, path: &Path) -> MetadataRecord {
        match read_xmp(path) {
            Ok(Some(xmp)) => fields_from_xmp(&xmp),
            Ok(None) => {
                log::debug!("No XMP packet in {}", path.display());
                MetadataRecord::new()
            }
            Err(e) => MetadataRecord::failed(format!("{e:#}")),
        }
    }
}

/// Read the raw XMP packet from a JPEG file, if it has one.
pub fn read_xmp(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path).context("Failed to read image file")?;
    let jpeg = Jpeg::from_bytes(Bytes::from(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let xmp = jpeg
        .segments()
        .iter()
        .find(|s| s.marker() == 0xE1 && s.contents().starts_with(XMP_HEADER))
        .map(|s| String::from_utf8_lossy(&s.contents()[XMP_HEADER.len()..]).to_string());
    Ok(xmp)
}

/// Build a record from an XMP packet.
///
/// Single-item bags are stored as plain text and multi-item bags as lists,
/// matching how exiftool reports the same tags.
pub fn fields_from_xmp(xmp: &str) -> MetadataRecord {
    let mut record = MetadataRecord::new();
    for (tag, field) in [
        ("lr:hierarchicalSubject", HIERARCHICAL_SUBJECT),
        ("dc:subject", SUBJECT),
    ] {
        let Some(mut items) = bag_items(xmp, tag) else {
            continue;
        };
        match items.len() {
            0 => {}
            1 => record.insert(field, MetadataValue::Text(items.remove(0))),
            _ => record.insert(field, items),
        }
    }
    record
}

/// Collect the `rdf:li` entries of the element `tag`.
fn bag_items(xml: &str, tag: &str) -> Option<Vec<String>> {
    let start = find_element(xml, tag)?;
    let open_end = start + xml[start..].find('>')?;
    if xml[..open_end].ends_with('/') {
        return Some(Vec::new());
    }

    let close = format!("</{tag}>");
    let body_end = open_end + xml[open_end..].find(&close)?;
    let body = &xml[open_end + 1..body_end];

    let mut items = Vec::new();
    let mut rest = body;
    while let Some(li) = find_element(rest, "rdf:li") {
        let Some(gt) = rest[li..].find('>').map(|p| li + p) else {
            break;
        };
        if rest[..gt].ends_with('/') {
            rest = &rest[gt + 1..];
            continue;
        }
        let Some(end) = rest[gt..].find("</rdf:li>").map(|p| gt + p) else {
            break;
        };
        let value = xml_unescape(&rest[gt + 1..end]);
        if !value.trim().is_empty() {
            items.push(value);
        }
        rest = &rest[end + "</rdf:li>".len()..];
    }
    Some(items)
}

/// Byte offset of `<tag` where the name is not merely a prefix of a longer one.
fn find_element(xml: &str, tag: &str) -> Option<usize> {
    let open = format!("<{tag}");
    let mut from = 0;
    while let Some(pos) = xml[from..].find(&open) {
        let abs = from + pos;
        let next = xml[abs + open.len()..].chars().next();
        if matches!(next, Some(c) if c == '>' || c == '/' || c.is_whitespace()) {
            return Some(abs);
        }
        from = abs + open.len();
    }
    None
}

/// Decode XML character and entity references.
fn xml_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest
            .find(';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
