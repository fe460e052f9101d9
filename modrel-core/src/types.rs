//! Domain types for module releases.
//!
//! Two layers live here:
//! - the *manifest* layer ([`ReleaseManifest`] and friends), which mirrors the
//!   cluster resource shape and round-trips through serde_yaml untouched;
//! - the *validated* layer ([`ModuleRelease`]), which the registry, selector
//!   and phase machine operate on.

use std::collections::BTreeMap;
use std::fmt;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Weight used when a release does not set `spec.weight`.
pub const DEFAULT_WEIGHT: u32 = 900;

pub const DEFAULT_API_VERSION: &str = "deckhouse.io/v1alpha1";
pub const DEFAULT_KIND: &str = "ExternalModuleRelease";

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a pluggable module (`spec.moduleName`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleName(pub String);

impl ModuleName {
    /// Validate a raw module name.
    ///
    /// The name ends up as the suffix of a directory entry, so it must be a
    /// single, non-empty path component.
    pub fn parse(release: &str, raw: &str) -> Result<Self, ValidationError> {
        let reason = if raw.is_empty() {
            Some("empty")
        } else if raw.contains('/') || raw.contains('\\') {
            Some("contains a path separator")
        } else if raw == "." || raw == ".." {
            Some("is a relative path component")
        } else if raw.contains('\0') {
            Some("contains a NUL byte")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ValidationError::InvalidModuleName {
                release: release.to_owned(),
                module_name: raw.to_owned(),
                reason,
            }),
            None => Ok(Self(raw.to_owned())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ModuleName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique name of a release object (`metadata.name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReleaseName(pub String);

impl ReleaseName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ReleaseName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ReleaseName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// On-disk ordering priority of a module entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(pub u32);

impl Default for Weight {
    fn default() -> Self {
        Self(DEFAULT_WEIGHT)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for Weight {
    fn from(w: u32) -> Self {
        Self(w)
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Lifecycle phase of a release (`status.phase`).
///
/// Legal moves are defined in [`crate::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Phase {
    #[default]
    Pending,
    Deployed,
    Superseded,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pending => write!(f, "Pending"),
            Phase::Deployed => write!(f, "Deployed"),
            Phase::Superseded => write!(f, "Superseded"),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest layer
// ---------------------------------------------------------------------------

/// A release object as it appears in a snapshot document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseManifest {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub metadata: ReleaseMetadata,
    #[serde(default)]
    pub spec: ReleaseSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReleaseStatus>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub name: String,
    /// Labels, annotations and anything else we do not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReleaseStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ReleaseManifest {
    /// Build a manifest with the conventional resource header.
    pub fn new(name: &str, module_name: &str, version: &str) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ReleaseMetadata {
                name: name.to_owned(),
                extra: BTreeMap::new(),
            },
            spec: ReleaseSpec {
                module_name: Some(module_name.to_owned()),
                version: Some(version.to_owned()),
                weight: None,
                extra: BTreeMap::new(),
            },
            status: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.spec.weight = Some(weight);
        self
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.status.get_or_insert_with(ReleaseStatus::default).phase = Some(phase);
        self
    }

    /// Recorded phase; an absent status means `Pending`.
    pub fn phase(&self) -> Phase {
        self.status
            .as_ref()
            .and_then(|s| s.phase)
            .unwrap_or_default()
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.status.get_or_insert_with(ReleaseStatus::default).phase = Some(phase);
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_owned()
}

fn default_kind() -> String {
    DEFAULT_KIND.to_owned()
}

/// Accept `version: 1` as well as `version: "1.0.0"`; YAML happily types bare
/// scalars as numbers.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a version string, got {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Validated layer
// ---------------------------------------------------------------------------

/// A release that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRelease {
    pub name: ReleaseName,
    pub module: ModuleName,
    pub version: Version,
    pub weight: Weight,
    pub phase: Phase,
}

impl ModuleRelease {
    pub fn is_deployed(&self) -> bool {
        self.phase == Phase::Deployed
    }
}

impl TryFrom<&ReleaseManifest> for ModuleRelease {
    type Error = ValidationError;

    fn try_from(manifest: &ReleaseManifest) -> Result<Self, Self::Error> {
        let release = manifest.metadata.name.as_str();
        if release.is_empty() {
            return Err(ValidationError::MissingName);
        }

        let module = match manifest.spec.module_name.as_deref() {
            Some(raw) => ModuleName::parse(release, raw)?,
            None => {
                return Err(ValidationError::MissingModuleName {
                    release: release.to_owned(),
                })
            }
        };

        let raw_version =
            manifest
                .spec
                .version
                .as_deref()
                .ok_or_else(|| ValidationError::MissingVersion {
                    release: release.to_owned(),
                })?;
        let version = parse_version(release, raw_version)?;

        Ok(Self {
            name: ReleaseName::from(release),
            module,
            version,
            weight: manifest.spec.weight.map(Weight).unwrap_or_default(),
            phase: manifest.phase(),
        })
    }
}

/// Parse a release version, tolerating a leading `v` (`v0.0.1`).
///
/// A purely numeric `major` or `major.minor` is padded with zero components,
/// so `1` reads as `1.0.0` and `v1.2` as `1.2.0`.
pub fn parse_version(release: &str, raw: &str) -> Result<Version, ValidationError> {
    let trimmed = raw.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    let padded = pad_partial(bare);
    Version::parse(padded.as_deref().unwrap_or(bare)).map_err(|e| {
        ValidationError::InvalidVersion {
            release: release.to_owned(),
            version: raw.to_owned(),
            reason: e.to_string(),
        }
    })
}

fn pad_partial(bare: &str) -> Option<String> {
    let parts: Vec<&str> = bare.split('.').collect();
    let numeric = parts
        .iter()
        .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    match parts.len() {
        1 if numeric => Some(format!("{bare}.0.0")),
        2 if numeric => Some(format!("{bare}.0")),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
