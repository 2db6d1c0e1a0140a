use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use thiserror::Error;

const LINE_WIDTH: usize = 64;

#[derive(Error, Debug)]
pub enum ArmorError {
    #[error("missing '-----BEGIN SEALMAIL {0}-----' line")]
    MissingBegin(String),

    #[error("missing end line")]
    MissingEnd,

    #[error("malformed header line '{0}'")]
    MalformedHeader(String),

    #[error("payload is not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),
}

/// A parsed armored blob: its header lines and decoded payload.
#[derive(Debug)]
pub struct Block {
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

impl Block {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Wrap a binary payload into an armored text blob.
///
/// The format is a BEGIN line carrying the label, `Name: value` header
/// lines, a blank separator, the base64 payload wrapped at 64 columns,
/// and the matching END line.
pub fn enarmor(label: &str, headers: &[(&str, String)], payload: &[u8]) -> String {
    let mut out = format!("-----BEGIN SEALMAIL {}-----\n", label);
    for (name, value) in headers {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');

    let encoded = BASE64.encode(payload);
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(LINE_WIDTH));
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }

    out.push_str(&format!("-----END SEALMAIL {}-----\n", label));
    out
}

/// Parse an armored blob back into headers and payload.
///
/// The label must match the one the blob was written with; a blob armored
/// under a different label is rejected at the BEGIN line.
pub fn dearmor(label: &str, blob: &str) -> Result<Block, ArmorError> {
    let begin = format!("-----BEGIN SEALMAIL {}-----", label);
    let end = format!("-----END SEALMAIL {}-----", label);

    let mut lines = blob.lines().map(str::trim);
    let first = lines
        .by_ref()
        .find(|line| !line.is_empty())
        .ok_or_else(|| ArmorError::MissingBegin(label.to_string()))?;
    if first != begin {
        return Err(ArmorError::MissingBegin(label.to_string()));
    }

    let mut headers = Vec::new();
    let mut body = String::new();
    let mut in_body = false;
    let mut saw_end = false;
    for line in lines {
        if line == end {
            saw_end = true;
            break;
        }
        if !in_body {
            if line.is_empty() {
                in_body = true;
                continue;
            }
            match line.split_once(": ") {
                Some((name, value)) => headers.push((name.to_string(), value.to_string())),
                None => return Err(ArmorError::MalformedHeader(line.to_string())),
            }
        } else if !line.is_empty() {
            body.push_str(line);
        }
    }
    if !saw_end {
        return Err(ArmorError::MissingEnd);
    }

    let payload = BASE64.decode(body.as_bytes())?;
    Ok(Block { headers, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_headers_and_payload() {
        let payload: Vec<u8> = (0u8..200).collect();
        let blob = enarmor(
            "MESSAGE",
            &[("Recipient", "bob@example.com".to_string())],
            &payload,
        );
        let block = dearmor("MESSAGE", &blob).unwrap();
        assert_eq!(block.header("Recipient"), Some("bob@example.com"));
        assert_eq!(block.payload, payload);
    }

    #[test]
    fn rejects_wrong_label() {
        let blob = enarmor("PUBLIC KEY", &[], b"abc");
        assert!(matches!(
            dearmor("MESSAGE", &blob),
            Err(ArmorError::MissingBegin(_))
        ));
    }

    #[test]
    fn rejects_truncated_blob() {
        let blob = enarmor("MESSAGE", &[], b"abc");
        let truncated = &blob[..blob.len() / 2];
        assert!(matches!(
            dearmor("MESSAGE", truncated),
            Err(ArmorError::MissingEnd)
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        let blob = "-----BEGIN SEALMAIL MESSAGE-----\n\n!!!not base64!!!\n-----END SEALMAIL MESSAGE-----\n";
        assert!(matches!(
            dearmor("MESSAGE", blob),
            Err(ArmorError::Payload(_))
        ));
    }
}
