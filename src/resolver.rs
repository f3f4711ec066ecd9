// Determine which platform a test run targets and whether it is known
use crate::platform::{KnownPlatforms, PlatformSetup};
use crate::properties::{Properties, PLATFORM};
use crate::server::DEFAULT_SERVER_NAME;
use std::fmt;
use std::sync::Arc;

/// A platform we know how to set up
#[derive(Clone)]
pub struct ResolvedPlatform {
    pub platform: String,
    pub db: String,
    pub setup: Arc<dyn PlatformSetup>,
}

impl fmt::Debug for ResolvedPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedPlatform")
            .field("platform", &self.platform)
            .field("db", &self.db)
            .field("local", &self.setup.is_local())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    /// `ebean.test.platform` absent or empty
    Unresolved,
    /// Platform named but not in the known table
    Unknown { platform: String, db: String },
    Known(ResolvedPlatform),
}

impl Resolution {
    pub fn is_known(&self) -> bool {
        matches!(self, Resolution::Known(_))
    }

    pub fn platform(&self) -> Option<&str> {
        match self {
            Resolution::Unresolved => None,
            Resolution::Unknown { platform, .. } => Some(platform),
            Resolution::Known(resolved) => Some(&resolved.platform),
        }
    }
}

pub struct PlatformResolver<'a> {
    known: &'a KnownPlatforms,
}

impl<'a> PlatformResolver<'a> {
    pub fn new(known: &'a KnownPlatforms) -> Self {
        Self { known }
    }

    /// Resolve the test platform from properties and an optional db hint
    ///
    /// With no hint the trimmed `ebean.test.platform` value names the
    /// platform and the db defaults to "db". A hint pins the platform
    /// instead (testing an alternate platform) and is also the db name.
    /// The property must still be set for either path to resolve.
    pub fn resolve(&self, db_hint: Option<&str>, properties: &Properties) -> Resolution {
        let Some(test_platform) = properties.get_trimmed(PLATFORM) else {
            tracing::trace!("{} not set, no platform to set up", PLATFORM);
            return Resolution::Unresolved;
        };

        let (platform, db) = match db_hint {
            None => (test_platform.to_string(), DEFAULT_SERVER_NAME.to_string()),
            Some(hint) => (hint.to_string(), hint.to_string()),
        };

        match self.known.get(&platform) {
            Some(setup) => {
                tracing::debug!(%platform, %db, local = setup.is_local(), "resolved test platform");
                Resolution::Known(ResolvedPlatform { platform, db, setup })
            }
            None => {
                tracing::warn!("unknown platform {} - skipping platform setup", platform);
                Resolution::Unknown { platform, db }
            }
        }
    }
}
