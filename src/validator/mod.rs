//! Launch-or-reject decisions for widget scripts.
//!
//! A script may only run once [`Validator::validate`] has accepted it. The
//! accepted path is returned as a [`ValidatedScript`], which has no public
//! constructor: the execution engine takes that type, so an unvalidated path
//! cannot reach a launch.
//!
//! Checks run in order and stop at the first failure:
//!
//! 1. the path resolves to a regular file
//! 2. the leaf entry is not a symlink
//! 3. the canonical path lies under an allow-listed root
//! 4. at least one execute bit is set (POSIX only)
//! 5. the SHA-256 fingerprint matches, where one is required

pub mod checksums;

use crate::config::Config;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a script lives relative to the allow-listed roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Shipped with the dashboard. Always fingerprinted.
    Bundled,
    /// Written by the user, under one of the custom roots.
    Custom,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Bundled => write!(f, "bundled"),
            Origin::Custom => write!(f, "custom"),
        }
    }
}

/// A widget or action script as named by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    pub path: PathBuf,
    /// Pinned hex SHA-256, if the configuration carries one.
    pub fingerprint: Option<String>,
}

impl ScriptReference {
    pub fn new(path: impl Into<PathBuf>, fingerprint: Option<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint,
        }
    }
}

/// A script path that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedScript {
    path: PathBuf,
    origin: Origin,
}

impl ValidatedScript {
    /// Canonical absolute path of the script.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Directory the script runs in.
    pub fn working_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }
}

/// Why a script was refused. Every message tells the user what to do next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Script '{}' does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("Script '{}' is not a regular file", .path.display())]
    NotRegularFile { path: PathBuf },

    #[error("Script '{}' is a symlink; symlinks are never executed. Point the widget at the real file instead", .path.display())]
    Symlink { path: PathBuf },

    #[error("Script '{}' is outside the allowed widget directories ({roots}). Move it into one of them or add its directory to settings.custom_roots", .path.display())]
    OutsideAllowedRoots { path: PathBuf, roots: String },

    #[error("Script '{}' is not executable (mode {mode:#o}). Run: chmod +x {}", .path.display(), .path.display())]
    NotExecutable { path: PathBuf, mode: u32 },

    #[error("Bundled script '{}' has no registered fingerprint. Bundled widgets must be listed in the compiled-in checksum table", .path.display())]
    MissingBundledFingerprint { path: PathBuf },

    #[error("Script '{}' has no pinned fingerprint. Compute it with `deck checksum {}` (or `sha256sum`) and add `sha256: <digest>` to the widget entry, or enable settings.dev_mode for local development", .path.display(), .path.display())]
    MissingFingerprint { path: PathBuf },

    #[error("Script '{}' fingerprint mismatch: expected {expected}, actual {actual}. The file changed since it was pinned; review it and update the sha256 entry", .path.display())]
    FingerprintMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Script '{}' could not be read: {reason}", .path.display())]
    Unreadable { path: PathBuf, reason: String },
}

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    requested: PathBuf,
    outcome: std::result::Result<ValidatedScript, RejectReason>,
}

impl ValidationVerdict {
    fn accept(requested: &Path, script: ValidatedScript) -> Self {
        Self {
            requested: requested.to_path_buf(),
            outcome: Ok(script),
        }
    }

    fn reject(requested: &Path, reason: RejectReason) -> Self {
        tracing::debug!("Rejected script {:?}: {}", requested, reason);
        Self {
            requested: requested.to_path_buf(),
            outcome: Err(reason),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Path as handed to the validator.
    pub fn requested_path(&self) -> &Path {
        &self.requested
    }

    pub fn validated(&self) -> Option<&ValidatedScript> {
        self.outcome.as_ref().ok()
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        self.outcome.as_ref().err()
    }

    pub fn into_result(self) -> std::result::Result<ValidatedScript, RejectReason> {
        self.outcome
    }
}

/// Validates scripts against a bundled root, custom roots and a fingerprint
/// table.
#[derive(Debug, Clone)]
pub struct Validator {
    bundled_root: PathBuf,
    custom_roots: Vec<PathBuf>,
    known_checksums: HashMap<String, String>,
}

impl Validator {
    /// Create a validator that uses the compiled-in bundled checksum table.
    pub fn new(bundled_root: impl Into<PathBuf>, custom_roots: Vec<PathBuf>) -> Self {
        let known_checksums = checksums::BUNDLED_CHECKSUMS
            .iter()
            .map(|(path, digest)| (path.to_string(), digest.to_string()))
            .collect();
        Self {
            bundled_root: bundled_root.into(),
            custom_roots,
            known_checksums,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let (bundled, custom) = config.allowed_roots();
        Self::new(bundled, custom)
    }

    /// Replace the fingerprint table for bundled scripts.
    pub fn with_checksums<I, K, V>(mut self, table: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.known_checksums = table
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn bundled_root(&self) -> &Path {
        &self.bundled_root
    }

    pub fn custom_roots(&self) -> &[PathBuf] {
        &self.custom_roots
    }

    /// Validate a script reference from configuration.
    pub fn validate_reference(&self, reference: &ScriptReference, dev_mode: bool) -> ValidationVerdict {
        self.validate(&reference.path, reference.fingerprint.as_deref(), dev_mode)
    }

    /// Decide whether `path` may be launched.
    ///
    /// `expected` takes priority over the compiled-in table. With `dev_mode`,
    /// custom scripts that have no fingerprint anywhere are accepted without
    /// hashing; bundled scripts never are.
    pub fn validate(&self, path: &Path, expected: Option<&str>, dev_mode: bool) -> ValidationVerdict {
        // 1. Existence (follows links so a dangling link reports as missing)
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::NotFound {
                        path: path.to_path_buf(),
                    },
                );
            }
            Err(e) => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::Unreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                );
            }
        };
        if !metadata.is_file() {
            return ValidationVerdict::reject(
                path,
                RejectReason::NotRegularFile {
                    path: path.to_path_buf(),
                },
            );
        }

        // 2. Symlink rejection on the leaf entry
        match fs::symlink_metadata(path) {
            Ok(link_meta) if link_meta.file_type().is_symlink() => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::Symlink {
                        path: path.to_path_buf(),
                    },
                );
            }
            Ok(_) => {}
            Err(e) => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::Unreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                );
            }
        }

        // 3. Containment
        let canonical = match fs::canonicalize(path) {
            Ok(p) => p,
            Err(e) => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::Unreadable {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    },
                );
            }
        };
        let Some((origin, relative)) = self.classify(&canonical) else {
            return ValidationVerdict::reject(
                path,
                RejectReason::OutsideAllowedRoots {
                    path: canonical,
                    roots: self.describe_roots(),
                },
            );
        };

        // 4. Execute bit
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::NotExecutable {
                        path: canonical,
                        mode: mode & 0o7777,
                    },
                );
            }
        }

        // 5. Fingerprint
        let expected = expected
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| match origin {
                Origin::Bundled => relative
                    .as_deref()
                    .and_then(|rel| self.known_checksums.get(rel).cloned()),
                Origin::Custom => None,
            });

        let Some(expected) = expected else {
            return match origin {
                Origin::Bundled => ValidationVerdict::reject(
                    path,
                    RejectReason::MissingBundledFingerprint { path: canonical },
                ),
                Origin::Custom if dev_mode => {
                    tracing::debug!(
                        "Dev mode: accepting custom script {:?} without fingerprint",
                        canonical
                    );
                    ValidationVerdict::accept(
                        path,
                        ValidatedScript {
                            path: canonical,
                            origin,
                        },
                    )
                }
                Origin::Custom => ValidationVerdict::reject(
                    path,
                    RejectReason::MissingFingerprint { path: canonical },
                ),
            };
        };

        let actual = match sha256_file(&canonical) {
            Ok(digest) => digest,
            Err(e) => {
                return ValidationVerdict::reject(
                    path,
                    RejectReason::Unreadable {
                        path: canonical,
                        reason: e.to_string(),
                    },
                );
            }
        };

        if !actual.eq_ignore_ascii_case(&expected) {
            tracing::warn!(
                "Fingerprint mismatch for {:?}: expected {}, actual {}",
                canonical,
                expected,
                actual
            );
            return ValidationVerdict::reject(
                path,
                RejectReason::FingerprintMismatch {
                    path: canonical,
                    expected,
                    actual,
                },
            );
        }

        ValidationVerdict::accept(
            path,
            ValidatedScript {
                path: canonical,
                origin,
            },
        )
    }

    /// Which root contains `canonical`. Bundled wins when roots overlap.
    /// For bundled scripts the `/`-separated relative path is returned too.
    fn classify(&self, canonical: &Path) -> Option<(Origin, Option<String>)> {
        let bundled = canonicalize_root(&self.bundled_root);
        if let Ok(rel) = canonical.strip_prefix(&bundled) {
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            return Some((Origin::Bundled, Some(key)));
        }

        self.custom_roots
            .iter()
            .map(|root| canonicalize_root(root))
            .any(|root| canonical.starts_with(&root))
            .then_some((Origin::Custom, None))
    }

    fn describe_roots(&self) -> String {
        std::iter::once(&self.bundled_root)
            .chain(self.custom_roots.iter())
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn canonicalize_root(root: &Path) -> PathBuf {
    fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Lowercase hex SHA-256 of a file's full contents.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes))
}
