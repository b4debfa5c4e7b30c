//! Symbol identities.
//!
//! Three hashes are derived per symbol:
//!
//! - `version_id`: pinned to one commit, `H(commit_sha, relative_path, kind,
//!   name, qualified_name, start_line, end_line)`.
//! - `fingerprint`: hash of the canonical AST node-type sequence; `None` when
//!   the adapter supplied no node types.
//! - `stable_id`: survives commits, `H(repo_id, kind, qualified_name,
//!   fingerprint)` when a fingerprint exists, else `H(repo_id, kind,
//!   qualified_name, name)`.
//!
//! # Encoding
//!
//! All hashes are SHA-256, rendered as 64 lowercase hex characters. The
//! hashed byte stream is a domain label followed by the fields, each written
//! as a one-byte tag plus payload:
//!
//! | tag    | meaning        | payload                                  |
//! |--------|----------------|------------------------------------------|
//! | `0x00` | absent option  | none                                     |
//! | `0x01` | string         | u64 big-endian byte length, UTF-8 bytes  |
//! | `0x02` | integer        | u64 big-endian                           |
//!
//! The domain label is itself a string field. Labels are
//! `repograph/version/v1`, `repograph/fingerprint/v1`,
//! `repograph/stable/fingerprint/v1` and `repograph/stable/name/v1`. Because
//! every field is self-delimiting, no two distinct field lists produce the
//! same byte stream.
//!
//! Changing anything in this module changes every persisted identity.

use sha2::{Digest, Sha256};

use crate::types::SymbolKind;

const VERSION_DOMAIN: &str = "repograph/version/v1";
const FINGERPRINT_DOMAIN: &str = "repograph/fingerprint/v1";
const STABLE_FP_DOMAIN: &str = "repograph/stable/fingerprint/v1";
const STABLE_NAME_DOMAIN: &str = "repograph/stable/name/v1";

const TAG_NONE: u8 = 0x00;
const TAG_STR: u8 = 0x01;
const TAG_INT: u8 = 0x02;

// ---------------------------------------------------------------------------
// Field encoder
// ---------------------------------------------------------------------------

/// Incremental hasher over tagged, length-prefixed fields.
struct FieldHasher {
    inner: Sha256,
}

impl FieldHasher {
    fn new(domain: &str) -> Self {
        let mut hasher = Self {
            inner: Sha256::new(),
        };
        hasher.str(domain);
        hasher
    }

    fn str(&mut self, value: &str) -> &mut Self {
        self.inner.update([TAG_STR]);
        self.inner.update((value.len() as u64).to_be_bytes());
        self.inner.update(value.as_bytes());
        self
    }

    fn opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.str(v),
            None => {
                self.inner.update([TAG_NONE]);
                self
            }
        }
    }

    fn int(&mut self, value: u64) -> &mut Self {
        self.inner.update([TAG_INT]);
        self.inner.update(value.to_be_bytes());
        self
    }

    fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

// ---------------------------------------------------------------------------
// Public identity functions
// ---------------------------------------------------------------------------

/// Inputs of a commit-scoped symbol identity.
#[derive(Debug, Clone, Copy)]
pub struct VersionKey<'a> {
    pub commit_sha: &'a str,
    pub relative_path: &'a str,
    pub kind: SymbolKind,
    pub name: &'a str,
    pub qualified_name: Option<&'a str>,
    pub start_line: u32,
    pub end_line: u32,
}

pub fn version_id(key: &VersionKey<'_>) -> String {
    let mut h = FieldHasher::new(VERSION_DOMAIN);
    h.str(key.commit_sha)
        .str(key.relative_path)
        .str(key.kind.as_str())
        .str(key.name)
        .opt_str(key.qualified_name)
        .int(u64::from(key.start_line))
        .int(u64::from(key.end_line));
    h.finish()
}

/// Hash a canonical node-type sequence. Empty input has no fingerprint.
pub fn fingerprint<S: AsRef<str>>(node_types: &[S]) -> Option<String> {
    if node_types.is_empty() {
        return None;
    }
    let mut h = FieldHasher::new(FINGERPRINT_DOMAIN);
    h.int(node_types.len() as u64);
    for t in node_types {
        h.str(t.as_ref());
    }
    Some(h.finish())
}

/// Cross-commit identity. Falls back to `name` when there is no fingerprint.
pub fn stable_id(
    repo_id: &str,
    kind: SymbolKind,
    qualified_name: Option<&str>,
    fingerprint: Option<&str>,
    name: &str,
) -> String {
    match fingerprint {
        Some(fp) => {
            let mut h = FieldHasher::new(STABLE_FP_DOMAIN);
            h.str(repo_id)
                .str(kind.as_str())
                .opt_str(qualified_name)
                .str(fp);
            h.finish()
        }
        None => {
            let mut h = FieldHasher::new(STABLE_NAME_DOMAIN);
            h.str(repo_id)
                .str(kind.as_str())
                .opt_str(qualified_name)
                .str(name);
            h.finish()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
