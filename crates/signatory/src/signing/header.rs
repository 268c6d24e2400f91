use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::SignatureError;
use crate::signatory::Algorithm;

/// Parsed `Signature` header.
///
/// `keyId="…",algorithm="…",headers="h1 h2 …",signature="<base64>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub key_id: String,
    pub algorithm: Option<String>,
    pub headers: Vec<String>,
    pub signature: String,
    /// Every `key=value` pair found, including unknown ones.
    pub fields: BTreeMap<String, String>,
}

impl SignatureHeader {
    pub fn new(
        key_id: impl Into<String>,
        algorithm: Algorithm,
        headers: Vec<String>,
        signature: impl Into<String>,
    ) -> Self {
        let key_id = key_id.into();
        let signature = signature.into();
        let fields = BTreeMap::from([
            ("keyId".to_string(), key_id.clone()),
            ("algorithm".to_string(), algorithm.as_str().to_string()),
            ("headers".to_string(), headers.join(" ")),
            ("signature".to_string(), signature.clone()),
        ]);
        Self {
            key_id,
            algorithm: Some(algorithm.as_str().to_string()),
            headers,
            signature,
            fields,
        }
    }

    pub fn parse(value: &str) -> Result<Self, SignatureError> {
        let mut fields = BTreeMap::new();
        for entry in value.split(',') {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            fields.insert(key.to_string(), value.to_string());
        }

        let required = |name: &str| {
            fields
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| SignatureError::MalformedHeader(format!("missing {name}")))
        };
        let key_id = required("keyId")?;
        let headers = required("headers")?
            .split_whitespace()
            .map(str::to_ascii_lowercase)
            .collect();
        let signature = required("signature")?;
        let algorithm = fields.get("algorithm").cloned();

        Ok(Self {
            key_id,
            algorithm,
            headers,
            signature,
            fields,
        })
    }

    /// Algorithm to verify with; unknown or absent means `rsa-sha256`.
    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from_header(self.algorithm.as_deref())
    }

    pub fn declares(&self, header: &str) -> bool {
        self.headers.iter().any(|name| name.eq_ignore_ascii_case(header))
    }
}

impl FromStr for SignatureHeader {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SignatureHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "keyId=\"{}\"", self.key_id)?;
        if let Some(algorithm) = &self.algorithm {
            write!(f, ",algorithm=\"{algorithm}\"")?;
        }
        write!(
            f,
            ",headers=\"{}\",signature=\"{}\"",
            self.headers.join(" "),
            self.signature
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"keyId="https://a.example/users/alice#main-key",algorithm="rsa-sha256",headers="(request-target) host date digest content-length",signature="c2lnbmF0dXJl==""#;

    #[test]
    fn parses_quoted_fields() {
        let header = SignatureHeader::parse(HEADER).unwrap();
        assert_eq!(header.key_id, "https://a.example/users/alice#main-key");
        assert_eq!(header.algorithm.as_deref(), Some("rsa-sha256"));
        assert_eq!(
            header.headers,
            ["(request-target)", "host", "date", "digest", "content-length"]
        );
        assert_eq!(header.signature, "c2lnbmF0dXJl==");
        assert_eq!(header.fields.len(), 4);
    }

    #[test]
    fn parses_unquoted_and_spaced_fields() {
        let header = SignatureHeader::parse(
            "keyId=https://a.example/k, headers=\"Date Host\", signature=abc=",
        )
        .unwrap();
        assert_eq!(header.key_id, "https://a.example/k");
        assert_eq!(header.headers, ["date", "host"]);
        assert_eq!(header.signature, "abc=");
        assert_eq!(header.algorithm, None);
        assert_eq!(header.algorithm(), Algorithm::RsaSha256);
    }

    #[test]
    fn unknown_algorithm_falls_back_to_sha256() {
        let header = SignatureHeader::parse(
            r#"keyId="k",algorithm="hs2019",headers="date",signature="s""#,
        )
        .unwrap();
        assert_eq!(header.algorithm(), Algorithm::RsaSha256);
        assert_eq!(header.fields["algorithm"], "hs2019");
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        for value in [
            r#"headers="date",signature="s""#,
            r#"keyId="k",signature="s""#,
            r#"keyId="k",headers="date""#,
            r#"keyId="",headers="date",signature="s""#,
            "",
        ] {
            assert!(
                matches!(
                    SignatureHeader::parse(value),
                    Err(SignatureError::MalformedHeader(_))
                ),
                "{value} should be malformed"
            );
        }
    }

    #[test]
    fn entries_without_equals_are_skipped() {
        let header =
            SignatureHeader::parse(r#"garbage,keyId="k",headers="date",signature="s""#).unwrap();
        assert_eq!(header.key_id, "k");
    }

    #[test]
    fn display_composes_wire_format() {
        let header = SignatureHeader::new(
            "https://a.example/users/alice#main-key",
            Algorithm::RsaSha512,
            vec!["(request-target)".into(), "date".into()],
            "c2ln",
        );
        assert_eq!(
            header.to_string(),
            r#"keyId="https://a.example/users/alice#main-key",algorithm="rsa-sha512",headers="(request-target) date",signature="c2ln""#
        );
        assert_eq!(SignatureHeader::parse(&header.to_string()).unwrap(), header);
    }
}
