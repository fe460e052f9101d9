//! The `<weight>-<moduleName>` naming convention for module links.
//!
//! Weight and module name travel as separate typed fields everywhere else;
//! this module is the only place they are joined into, or split out of, a
//! file name.

use std::fmt;
use std::path::PathBuf;

use modrel_core::{ModuleName, ModuleRelease, Weight};

/// Parsed file name of a module link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkName {
    pub weight: Weight,
    pub module: ModuleName,
}

impl LinkName {
    pub fn new(weight: Weight, module: ModuleName) -> Self {
        Self { weight, module }
    }

    pub fn for_release(release: &ModuleRelease) -> Self {
        Self::new(release.weight, release.module.clone())
    }

    /// `<weight>-<module>`, weight without leading zeros.
    pub fn file_name(&self) -> String {
        format!("{}-{}", self.weight.0, self.module.0)
    }

    /// Split a directory entry name into weight and module.
    ///
    /// The weight is the all-digit prefix before the first `-`; the module
    /// name is everything after it. Returns `None` for names that do not
    /// follow the convention.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (prefix, module) = file_name.split_once('-')?;
        if prefix.is_empty() || module.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let weight = prefix.parse::<u32>().ok()?;
        Some(Self::new(Weight(weight), ModuleName::from(module)))
    }
}

impl fmt::Display for LinkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.weight, self.module)
    }
}

/// A symbolic link found in (or placed into) the modules directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleLink {
    pub name: LinkName,
    pub path: PathBuf,
    pub target: PathBuf,
}

impl ModuleLink {
    pub fn module(&self) -> &ModuleName {
        &self.name.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn default_weight_formats_as_900() {
        let name = LinkName::new(Weight::default(), ModuleName::from("echoserver"));
        assert_eq!(name.file_name(), "900-echoserver");
        assert_eq!(name.to_string(), "900-echoserver");
    }

    #[rstest]
    #[case("900-echoserver", 900, "echoserver")]
    #[case("987-echo-server", 987, "echo-server")]
    #[case("0-m", 0, "m")]
    #[case("0913-m", 913, "m")]
    fn parses_conventional_names(#[case] raw: &str, #[case] weight: u32, #[case] module: &str) {
        let name = LinkName::parse(raw).expect("parse");
        assert_eq!(name.weight, Weight(weight));
        assert_eq!(name.module, ModuleName::from(module));
    }

    #[rstest]
    #[case("echoserver")]
    #[case("-echoserver")]
    #[case("900-")]
    #[case("v1-echoserver")]
    #[case("+9-echoserver")]
    #[case(".900-echoserver.modrel.tmp")]
    #[case("99999999999-echoserver")]
    fn rejects_other_names(#[case] raw: &str) {
        assert!(LinkName::parse(raw).is_none(), "{raw:?} must not parse");
    }

    #[test]
    fn leading_zeros_do_not_roundtrip() {
        let parsed = LinkName::parse("0913-m").expect("parse");
        assert_eq!(parsed.file_name(), "913-m");
    }
}
