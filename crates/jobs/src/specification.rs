//! Job specifications: immutable descriptions of work to run.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::time::Duration;

use depot_core::new_guid;

/// Fields every specification carries.
///
/// Concrete specifications embed one of these and expose it via
/// [`JobSpecification::base`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecificationBase {
    guid: String,
    owner_user_nickname: Option<String>,
    supplied_data_guids: BTreeSet<String>,
    time_to_live: Option<Duration>,
}

impl SpecificationBase {
    /// A base with a freshly generated guid, no owner and no inputs.
    pub fn new() -> Self {
        Self::with_guid(new_guid())
    }

    /// A base with a caller-chosen guid.
    pub fn with_guid(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            owner_user_nickname: None,
            supplied_data_guids: BTreeSet::new(),
            time_to_live: None,
        }
    }

    pub fn owned_by(mut self, nickname: impl Into<String>) -> Self {
        self.owner_user_nickname = Some(nickname.into());
        self
    }

    pub fn supplying(mut self, data_guid: impl Into<String>) -> Self {
        self.supplied_data_guids.insert(data_guid.into());
        self
    }

    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn owner_user_nickname(&self) -> Option<&str> {
        self.owner_user_nickname.as_deref()
    }

    pub fn supplied_data_guids(&self) -> &BTreeSet<String> {
        &self.supplied_data_guids
    }

    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live
    }
}

impl Default for SpecificationBase {
    fn default() -> Self {
        Self::new()
    }
}

/// A description of work for the runner registered under
/// [`Self::job_type_code`].
///
/// Implementors supply the type code, the embedded base and `as_any` (for
/// the runner's typed downcast); everything else has defaults.
pub trait JobSpecification: Debug + Send + Sync + 'static {
    fn job_type_code(&self) -> &str;

    fn base(&self) -> &SpecificationBase;

    fn as_any(&self) -> &dyn Any;

    fn guid(&self) -> &str {
        self.base().guid()
    }

    /// `None` means the system / an anonymous caller owns the job.
    fn owner_user_nickname(&self) -> Option<&str> {
        self.base().owner_user_nickname()
    }

    /// Storage keys of pre-existing artifacts this job consumes.
    fn supplied_data_guids(&self) -> &BTreeSet<String> {
        self.base().supplied_data_guids()
    }

    /// Overrides the engine's default time-to-live.
    fn time_to_live(&self) -> Option<Duration> {
        self.base().time_to_live()
    }

    /// Whether `other` asks for the same work, for coalescing.
    ///
    /// The default treats any two specifications of the same type and owner
    /// as equivalent; types with parameters narrow this down.
    fn is_equivalent(&self, other: &dyn JobSpecification) -> bool {
        self.job_type_code() == other.job_type_code()
            && self.owner_user_nickname() == other.owner_user_nickname()
    }
}
