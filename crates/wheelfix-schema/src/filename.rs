//! Wheel filename grammar.
//!
//! ```text
//! {distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl
//! ```
//!
//! Every attribute the pipeline derives from a filename (package, version,
//! interpreter tag, platform independence, stable ABI) comes from the single
//! parser in this module. Malformed names are rejected instead of guessed at.

use thiserror::Error;

use crate::tag::InterpreterTag;
use crate::types::{PackageName, Version};

const WHEEL_SUFFIX: &str = ".whl";

/// Errors produced when a filename does not follow the wheel grammar.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WheelFilenameError {
    /// The name does not end in `.whl`.
    #[error("Not a wheel filename (missing .whl suffix): {0}")]
    MissingSuffix(String),

    /// The stem does not split into five or six dash-separated components.
    #[error("Wheel filename {name} has {found} components, expected 5 or 6")]
    WrongComponentCount {
        /// The offending filename.
        name: String,
        /// Number of components found.
        found: usize,
    },

    /// Two adjacent dashes or a leading/trailing dash.
    #[error("Wheel filename {0} has an empty component")]
    EmptyComponent(String),

    /// The optional build tag does not start with a digit.
    #[error("Wheel filename {name} has an invalid build tag: {tag}")]
    InvalidBuildTag {
        /// The offending filename.
        name: String,
        /// The rejected build tag.
        tag: String,
    },
}

/// A parsed wheel filename.
///
/// # Example
///
/// ```
/// use wheelfix_schema::WheelFilename;
///
/// let wheel = WheelFilename::parse("foo-1.0-cp311-cp311-linux_ppc64le.whl").unwrap();
/// assert_eq!(wheel.package().as_str(), "foo");
/// assert_eq!(wheel.interpreter_tag().unwrap().as_str(), "cp311");
/// assert!(!wheel.is_platform_independent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelFilename {
    raw: String,
    package: PackageName,
    version: Version,
    build: Option<String>,
    python_tag: String,
    abi_tag: String,
    platform_tag: String,
}

impl WheelFilename {
    /// Parse a wheel filename.
    ///
    /// # Errors
    ///
    /// Returns a [`WheelFilenameError`] describing the first grammar
    /// violation found.
    pub fn parse(name: &str) -> Result<Self, WheelFilenameError> {
        let stem = name
            .strip_suffix(WHEEL_SUFFIX)
            .ok_or_else(|| WheelFilenameError::MissingSuffix(name.to_string()))?;

        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(WheelFilenameError::EmptyComponent(name.to_string()));
        }

        let (package, version, build, python, abi, platform) = match parts.as_slice() {
            [pkg, ver, py, abi, plat] => (*pkg, *ver, None, *py, *abi, *plat),
            [pkg, ver, build, py, abi, plat] => {
                if !build.starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(WheelFilenameError::InvalidBuildTag {
                        name: name.to_string(),
                        tag: (*build).to_string(),
                    });
                }
                (*pkg, *ver, Some((*build).to_string()), *py, *abi, *plat)
            }
            _ => {
                return Err(WheelFilenameError::WrongComponentCount {
                    name: name.to_string(),
                    found: parts.len(),
                });
            }
        };

        Ok(Self {
            raw: name.to_string(),
            package: PackageName::new(package),
            version: Version::new(version),
            build,
            python_tag: python.to_string(),
            abi_tag: abi.to_string(),
            platform_tag: platform.to_string(),
        })
    }

    /// The full filename this was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Distribution name.
    pub fn package(&self) -> &PackageName {
        &self.package
    }

    /// Distribution version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Optional build tag.
    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }

    /// Python tag (may be a dotted set such as `py2.py3`).
    pub fn python_tag(&self) -> &str {
        &self.python_tag
    }

    /// ABI tag (`cp311`, `abi3`, `none`, ...).
    pub fn abi_tag(&self) -> &str {
        &self.abi_tag
    }

    /// Platform tag (`linux_ppc64le`, `any`, ...).
    pub fn platform_tag(&self) -> &str {
        &self.platform_tag
    }

    /// First concrete CPython tag in the python tag set, then the ABI tag.
    pub fn interpreter_tag(&self) -> Option<InterpreterTag> {
        self.python_tag
            .split('.')
            .chain(self.abi_tag.split('.'))
            .find_map(InterpreterTag::parse)
    }

    /// True for wheels with no platform-specific code (`*-none-any.whl`).
    pub fn is_platform_independent(&self) -> bool {
        self.abi_tag == "none" && self.platform_tag == "any"
    }

    /// True for wheels built against the CPython stable ABI.
    pub fn is_stable_abi(&self) -> bool {
        self.abi_tag.split('.').any(|t| t == "abi3")
    }
}

impl std::fmt::Display for WheelFilename {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for WheelFilename {
    type Err = WheelFilenameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
