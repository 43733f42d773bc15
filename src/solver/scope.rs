//! Per-family solver state.

use super::slice::{VariantSlice, short_request_str};
use super::types::{Narrowed, Reduction, VariantSelectMode};
use super::variant::{Variant, VariantCache};
use crate::core::SolveError;
use crate::request::PackageRequest;
use crate::version::VersionRange;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// What the solver knows about one family in a phase.
///
/// A conflict scope only holds a negative request; no package of the family
/// has been required yet. A live scope holds the remaining candidates and a
/// request describing exactly their versions.
#[derive(Debug, Clone)]
pub enum PackageScope {
    /// Only a conflict (or weak) request is known
    Conflict(PackageRequest),

    /// Candidates are being narrowed
    Live {
        /// `family==v1|==v2...` over the candidates
        request: PackageRequest,
        /// The candidates
        slice: Arc<VariantSlice>,
    },
}

impl PackageScope {
    /// Create the scope for a request.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::PackageNotFound`] if no package matches a
    /// positive request, and the lookup errors of [`VariantCache`].
    pub fn new(request: &PackageRequest, cache: &VariantCache<'_>) -> Result<Self, SolveError> {
        if request.conflict() {
            return Ok(Self::Conflict(request.clone()));
        }

        let range = request.range().cloned().unwrap_or_default();
        match cache.get_variant_slice(request.name(), &range)? {
            Some(slice) => Ok(Self::live(slice)),
            None => Err(SolveError::PackageNotFound {
                request: request.to_string(),
            }),
        }
    }

    fn live(slice: VariantSlice) -> Self {
        Self::Live {
            request: PackageRequest::new(slice.family(), slice.range().clone()),
            slice: Arc::new(slice),
        }
    }

    /// Family name.
    #[must_use]
    pub fn family(&self) -> &str {
        match self {
            Self::Conflict(request) => request.name(),
            Self::Live {
                slice, ..
            } => slice.family(),
        }
    }

    /// The request this scope imposes on other scopes.
    #[must_use]
    pub const fn request(&self) -> &PackageRequest {
        match self {
            Self::Conflict(request)
            | Self::Live {
                request, ..
            } => request,
        }
    }

    /// True for a conflict scope.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// The candidates of a live scope.
    #[must_use]
    pub fn slice(&self) -> Option<&VariantSlice> {
        match self {
            Self::Conflict(_) => None,
            Self::Live {
                slice, ..
            } => Some(slice),
        }
    }

    /// Narrow to the versions in `range`.
    ///
    /// A conflict scope becomes live: it loads the candidates in `range`
    /// minus its own conflict range.
    ///
    /// # Errors
    ///
    /// Package lookup errors when a conflict scope loads its candidates.
    pub fn intersect(&self, range: &VersionRange, cache: &VariantCache<'_>) -> Result<Narrowed<Self>, SolveError> {
        let narrowed = match self {
            Self::Conflict(request) => {
                let new_range = match request.range() {
                    None => Some(range.clone()),
                    Some(conflict_range) => range.subtract(conflict_range),
                };
                let slice = match new_range {
                    Some(new_range) => cache.get_variant_slice(request.name(), &new_range)?,
                    None => None,
                };
                slice.map_or(Narrowed::Empty, |slice| Narrowed::Changed(Self::live(slice)))
            }
            Self::Live {
                slice, ..
            } => slice.intersect(range).map(Self::live),
        };

        match &narrowed {
            Narrowed::Empty => debug!("{} intersected with range '{}' resulted in no packages", self, range),
            Narrowed::Changed(scope) => debug!("{} was intersected to {} by range '{}'", self, scope, range),
            Narrowed::Unchanged => {}
        }
        Ok(narrowed)
    }

    /// Drop candidates whose requirements conflict with `request`.
    #[must_use]
    pub fn reduce_by(&self, request: &PackageRequest) -> (Narrowed<Self>, Vec<Reduction>) {
        let Self::Live {
            slice, ..
        } = self
        else {
            return (Narrowed::Unchanged, Vec::new());
        };

        let (narrowed, reductions) = slice.reduce_by(request);
        let narrowed = narrowed.map(Self::live);
        match &narrowed {
            Narrowed::Empty => debug!("{} was reduced to nothing by {}", self, short_request_str(request)),
            Narrowed::Changed(scope) => debug!("{} was reduced to {} by {}", self, scope, short_request_str(request)),
            Narrowed::Unchanged => {}
        }
        (narrowed, reductions)
    }

    /// Extract a dependency common to every candidate.
    #[must_use]
    pub fn extract(&self) -> Option<(Self, PackageRequest)> {
        let Self::Live {
            request,
            slice,
        } = self
        else {
            return None;
        };

        let (slice, extracted) = slice.extract()?;
        debug!("extracted {} from {}", extracted, self);
        let scope = Self::Live {
            request: request.clone(),
            slice: Arc::new(slice),
        };
        Some((scope, extracted))
    }

    /// Split a live scope with several candidates in two.
    #[must_use]
    pub fn split(&self, requests: &[PackageRequest], mode: VariantSelectMode) -> Option<(Self, Self)> {
        let (leading, rest) = self.slice()?.split(requests, mode)?;
        Some((Self::live(leading), Self::live(rest)))
    }

    /// True for a conflict scope, or a single candidate with nothing left to
    /// extract.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        match self {
            Self::Conflict(_) => true,
            Self::Live {
                slice, ..
            } => slice.len() == 1 && !slice.is_extractable(),
        }
    }

    /// The chosen variant of a solved live scope.
    #[must_use]
    pub fn solved_variant(&self) -> Option<&Arc<Variant>> {
        match self {
            Self::Live {
                slice, ..
            } if slice.len() == 1 && !slice.is_extractable() => slice.variants().first(),
            _ => None,
        }
    }
}

impl fmt::Display for PackageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict(request) => write!(f, "{request}"),
            Self::Live {
                slice, ..
            } => write!(f, "{slice}"),
        }
    }
}
