//! CRN masks identifying cloud environments.
//!
//! A mask has the shape
//! `crn:v1:<cname>:<ctype>:<service-name>:<location>:<scope>:<service-instance>:<resource-type>:<resource>`.
//! Environments are keyed by their *comparable* mask, in which `local` and
//! `dedicated` environments lose their `l-`/`d-` name prefix and their
//! location, so the same short name matches regardless of region.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Location sentinel used in comparable masks.
pub const ANY_LOCATION: &str = "<any>";

const CRN_PREFIX: [&str; 2] = ["crn", "v1"];
const CRN_SEGMENTS: usize = 10;

/// Parsed CRN mask.
///
/// # Examples
///
/// ```
/// use catalog_merge_core::{ANY_LOCATION, CrnMask};
///
/// let mask: CrnMask = "crn:v1:l-acme:local::us-south::::".parse().unwrap();
/// let comparable = mask.comparable();
/// assert_eq!(comparable.cname, "acme");
/// assert_eq!(comparable.location, ANY_LOCATION);
/// assert_eq!(mask.to_string(), "crn:v1:l-acme:local::us-south::::");
/// ```
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct CrnMask {
    pub cname: String,
    pub ctype: String,
    pub service_name: String,
    pub location: String,
    pub scope: String,
    pub service_instance: String,
    pub resource_type: String,
    pub resource: String,
}

impl CrnMask {
    /// Parses a mask string.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidCrnMask`] unless the string has exactly
    /// ten `:`-separated segments starting with `crn:v1`.
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        let segments: Vec<&str> = raw.trim().split(':').collect();
        if segments.len() != CRN_SEGMENTS || segments[..2] != CRN_PREFIX {
            return Err(ModelError::InvalidCrnMask(raw.to_string()));
        }
        Ok(Self {
            cname: segments[2].to_string(),
            ctype: segments[3].to_string(),
            service_name: segments[4].to_string(),
            location: segments[5].to_string(),
            scope: segments[6].to_string(),
            service_instance: segments[7].to_string(),
            resource_type: segments[8].to_string(),
            resource: segments[9].to_string(),
        })
    }

    pub fn is_local(&self) -> bool {
        self.ctype == "local"
    }

    pub fn is_dedicated(&self) -> bool {
        self.ctype == "dedicated"
    }

    /// Returns the comparable form used as the environment map key.
    pub fn comparable(&self) -> Self {
        let mut mask = self.clone();
        let prefix = if self.is_local() {
            "l-"
        } else if self.is_dedicated() {
            "d-"
        } else {
            return mask;
        };
        if let Some(stripped) = mask.cname.strip_prefix(prefix) {
            mask.cname = stripped.to_string();
        }
        mask.location = ANY_LOCATION.to_string();
        mask
    }
}

impl fmt::Display for CrnMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "crn:v1:{}:{}:{}:{}:{}:{}:{}:{}",
            self.cname,
            self.ctype,
            self.service_name,
            self.location,
            self.scope,
            self.service_instance,
            self.resource_type,
            self.resource
        )
    }
}

impl FromStr for CrnMask {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CrnMask {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CrnMask> for String {
    fn from(mask: CrnMask) -> Self {
        mask.to_string()
    }
}
