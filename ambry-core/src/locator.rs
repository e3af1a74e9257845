use crate::error::{AmbryError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the namespace and the backend-specific id.
pub const LOCATOR_DELIMITER: char = ':';

/// Stable identifier for a stored blob: the namespace the backend was
/// registered under plus the id the backend handed back for the payload.
/// Formats as `<namespace>:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    namespace: String,
    id: String,
}

impl Locator {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Parse the textual form. The text must contain exactly one delimiter
    /// and a non-empty namespace component.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.split(LOCATOR_DELIMITER);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(namespace), Some(id), None) if !namespace.is_empty() => {
                Ok(Self::new(namespace, id))
            }
            _ => Err(AmbryError::MalformedLocator(text.to_string())),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Namespace consistency is a caller error, not a lookup miss.
    pub fn validate_namespace(&self, expected: &str) -> Result<()> {
        if self.namespace != expected {
            return Err(AmbryError::NamespaceMismatch {
                expected: expected.to_string(),
                got: self.namespace.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, LOCATOR_DELIMITER, self.id)
    }
}

impl FromStr for Locator {
    type Err = AmbryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Locator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Locator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Locator::parse(&text).map_err(serde::de::Error::custom)
    }
}
