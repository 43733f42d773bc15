//! The resolver control loop.
//!
//! The resolver keeps a stack of phases. Each step pops the top phase,
//! splits it if it is exhausted (pushing the fallback half), solves it and
//! pushes the result. A failed phase sitting on top of other phases is moved
//! to the failure list on the next step, which backtracks to the phase below
//! it. The solve ends when the top phase is solved, cyclic, or the only
//! phase left and failed.

use super::graph::ResolveGraph;
use super::phase::ResolvePhase;
use super::types::{CallbackReturn, DependencyConflict, FailureReason, SolverState, SolverStatus};
use super::variant::{Variant, VariantCache};
use crate::config::SolverConfig;
use crate::core::SolveError;
use crate::order::{OrdererRegistry, PackageOrderList};
use crate::repository::PackageRepository;
use crate::request::{PackageRequest, PackageRequestList};
use crate::version::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Called after every solve step that leaves the resolver unsolved.
pub type SolveCallback<'r> = Box<dyn FnMut(&SolverState) -> CallbackReturn + 'r>;

/// One package of a successful resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    /// Family name
    pub name: String,
    /// Chosen version
    pub version: Version,
    /// Chosen variant, if the package has variants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Where the package lives
    pub location: String,
}

impl ResolvedPackage {
    fn from_variant(variant: &Variant) -> Self {
        Self {
            name: variant.name().to_string(),
            version: variant.version().clone(),
            index: variant.index(),
            location: variant.location().to_string(),
        }
    }
}

impl fmt::Display for ResolvedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.name)?;
        } else {
            write!(f, "{}-{}", self.name, self.version)?;
        }
        match self.index {
            Some(index) => write!(f, "[{index}]"),
            None => Ok(()),
        }
    }
}

/// Details of an unsuccessful resolve.
#[derive(Debug, Clone, Serialize)]
pub struct ResolveFailure {
    /// Final resolver status
    pub status: SolverStatus,
    /// Reason of the reported failure, if any phase failed
    #[serde(skip)]
    pub reason: Option<FailureReason>,
    /// One-line description of the failure
    pub description: String,
    /// Requests involved in the failure
    pub involved: Vec<String>,
    /// Every rejected phase, oldest first, as `phase: description`
    pub rejected_phases: Vec<String>,
    /// Diagnostic graph of the reported failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph: Option<ResolveGraph>,
}

/// Final result of a resolve.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResolveOutcome {
    /// Every request is satisfied by these packages, dependencies first
    Solved {
        /// Resolved packages
        packages: Vec<ResolvedPackage>,
    },
    /// No solution was found
    Failed(ResolveFailure),
}

/// Package resolver.
pub struct Resolver<'r> {
    requests: Vec<PackageRequest>,
    request_list: PackageRequestList,
    config: SolverConfig,
    cache: VariantCache<'r>,
    callback: Option<SolveCallback<'r>>,
    phase_stack: Vec<ResolvePhase>,
    failed_phase_list: Vec<ResolvePhase>,
    depth_counts: BTreeMap<usize, usize>,
    solve_count: usize,
    solve_begun: bool,
    solve_time: Duration,
    abort_reason: Option<String>,
    forced_fail: bool,
}

impl<'r> Resolver<'r> {
    /// Create a resolver using the built-in package orderers.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::ConfigError`] for an invalid orderer table, and
    /// the errors of [`Self::with_orderers`].
    pub fn new(
        requests: &[PackageRequest],
        repository: &'r dyn PackageRepository,
        config: &SolverConfig,
    ) -> Result<Self, SolveError> {
        let orderers = config.orderers(&OrdererRegistry::with_builtin())?;
        Self::with_orderers(requests, repository, config, orderers)
    }

    /// Create a resolver with explicit package orderers.
    ///
    /// The requests are merged first. If two of them conflict the resolver
    /// starts out failed.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::PackageFamilyNotFound`] or
    /// [`SolveError::PackageNotFound`] if a request matches no package, and
    /// any repository error.
    pub fn with_orderers(
        requests: &[PackageRequest],
        repository: &'r dyn PackageRepository,
        config: &SolverConfig,
        orderers: PackageOrderList,
    ) -> Result<Self, SolveError> {
        let request_list = PackageRequestList::new(requests);
        let mut resolver = Self {
            requests: requests.to_vec(),
            request_list,
            config: config.clone(),
            cache: VariantCache::new(repository, orderers),
            callback: None,
            phase_stack: Vec::new(),
            failed_phase_list: Vec::new(),
            depth_counts: BTreeMap::new(),
            solve_count: 0,
            solve_begun: false,
            solve_time: Duration::ZERO,
            abort_reason: None,
            forced_fail: false,
        };

        tracing::debug!("request: {}", join(&resolver.requests));
        if let Some((first, second)) = resolver.request_list.conflict() {
            tracing::debug!("conflict in request: {} <--!--> {}", first, second);
            let reason = FailureReason::DependencyConflicts(vec![DependencyConflict::new(first.clone(), second.clone())]);
            let phase = ResolvePhase::failed(&resolver.requests, reason);
            resolver.push_phase(phase);
        } else {
            tracing::debug!("merged request: {}", resolver.request_list);
            let phase = ResolvePhase::new(resolver.request_list.requirements(), &resolver.cache)?;
            resolver.push_phase(phase);
        }
        Ok(resolver)
    }

    /// Install a callback run after each unsolved step.
    #[must_use]
    pub fn with_callback(mut self, callback: SolveCallback<'r>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// The requests as given.
    #[must_use]
    pub fn requests(&self) -> &[PackageRequest] {
        &self.requests
    }

    /// The merged requests.
    #[must_use]
    pub const fn request_list(&self) -> &PackageRequestList {
        &self.request_list
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> SolverStatus {
        if self.request_list.conflict().is_some() || self.forced_fail {
            return SolverStatus::Failed;
        }
        let Some(top) = self.phase_stack.last() else {
            return SolverStatus::Failed;
        };

        match top.status() {
            SolverStatus::Cyclic => SolverStatus::Failed,
            SolverStatus::Solved => SolverStatus::Solved,
            _ if self.phase_stack.len() > 1 => SolverStatus::Unsolved,
            SolverStatus::Pending | SolverStatus::Exhausted => SolverStatus::Unsolved,
            status => status,
        }
    }

    /// Number of solve steps run.
    #[must_use]
    pub const fn num_solves(&self) -> usize {
        self.solve_count
    }

    /// Number of failed phases, including a failed or cyclic top phase.
    #[must_use]
    pub fn num_fails(&self) -> usize {
        let top_failed = self
            .phase_stack
            .last()
            .is_some_and(|p| matches!(p.status(), SolverStatus::Failed | SolverStatus::Cyclic));
        self.failed_phase_list.len() + usize::from(top_failed)
    }

    /// True if the solve failed because of a dependency cycle.
    #[must_use]
    pub fn cyclic_fail(&self) -> bool {
        self.phase_stack.last().is_some_and(|p| p.status() == SolverStatus::Cyclic)
    }

    /// Time spent in solve steps.
    #[must_use]
    pub const fn solve_time(&self) -> Duration {
        self.solve_time
    }

    /// Time spent loading packages.
    #[must_use]
    pub fn load_time(&self) -> Duration {
        self.cache.load_time()
    }

    /// Why the solve was stopped early, if it was.
    #[must_use]
    pub fn abort_reason(&self) -> Option<&str> {
        self.abort_reason.as_deref()
    }

    /// Run solve steps until the resolver is no longer unsolved, or the
    /// callback or a budget stops it.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::SolveAlreadyStarted`] if steps were already
    /// run, and any run-fatal error raised while solving.
    pub fn solve(&mut self) -> Result<(), SolveError> {
        if self.solve_begun {
            return Err(SolveError::SolveAlreadyStarted);
        }

        while self.status() == SolverStatus::Unsolved {
            self.solve_step()?;
            if self.status() == SolverStatus::Unsolved && !self.do_callback() {
                break;
            }
        }

        match self.status() {
            SolverStatus::Solved => tracing::info!(
                "Resolve succeeded after {} step(s) and {} failure(s) in {:?}",
                self.solve_count,
                self.num_fails(),
                self.solve_time
            ),
            SolverStatus::Failed => tracing::info!(
                "Resolve failed after {} step(s) and {} failure(s) in {:?}",
                self.solve_count,
                self.num_fails(),
                self.solve_time
            ),
            status => tracing::info!("Resolve stopped ({}) after {} step(s)", status, self.solve_count),
        }
        Ok(())
    }

    /// Run a single solve step.
    ///
    /// # Errors
    ///
    /// Returns any run-fatal error raised while solving the phase.
    pub fn solve_step(&mut self) -> Result<(), SolveError> {
        self.solve_begun = true;
        if self.status() != SolverStatus::Unsolved {
            return Ok(());
        }

        let start = Instant::now();
        let result = self.step();
        self.solve_time += start.elapsed();
        result
    }

    fn step(&mut self) -> Result<(), SolveError> {
        tracing::debug!("--- solve step #{} ---", self.solve_count + 1);

        let mut phase = self.pop_phase()?;
        if phase.status() == SolverStatus::Failed {
            self.failed_phase_list.push(phase);
            phase = self.pop_phase()?;
        }

        if phase.status() == SolverStatus::Exhausted {
            let (primary, fallback) = phase.split(&self.requests, self.config.variant_select_mode)?;
            self.push_phase(fallback);
            phase = primary;
        }

        let solved = phase.solve(&self.cache, self.config.optimised)?;
        self.solve_count += 1;

        match solved.status() {
            SolverStatus::Failed => {
                if let Some(reason) = solved.failure_reason() {
                    tracing::debug!("FAIL: {}", reason.description());
                }
                self.push_phase(solved);
            }
            SolverStatus::Solved => {
                let finalised = solved.finalise();
                if let Some(reason) = finalised.failure_reason() {
                    tracing::debug!("FAIL: {}", reason.description());
                } else {
                    tracing::debug!("SOLVED: {}", finalised);
                }
                self.push_phase(finalised);
            }
            _ => self.push_phase(solved),
        }
        Ok(())
    }

    fn do_callback(&mut self) -> bool {
        let num_fails = self.num_fails();

        if let Some(max_fails) = self.config.max_fails {
            if num_fails > 0 && num_fails >= max_fails {
                tracing::warn!("Reached max fails ({})", max_fails);
                self.abort_reason = Some(format!("fail limit reached: aborted after {num_fails} failures"));
                self.forced_fail = true;
                return false;
            }
        }

        if let Some(limit) = self.config.time_limit() {
            if self.solve_time > limit {
                tracing::warn!("Resolve timeout after {:?}", self.solve_time);
                self.abort_reason = Some(format!("time limit exceeded: aborted after {:?}", self.solve_time));
                self.forced_fail = num_fails > 0;
                return false;
            }
        }

        let Some(phase) = self.latest_nonfailed_phase() else {
            return true;
        };
        let state = SolverState {
            num_solves: self.solve_count,
            num_fails,
            phase: phase.to_string(),
        };
        let Some(callback) = self.callback.as_mut() else {
            return true;
        };

        match callback(&state) {
            CallbackReturn::KeepGoing => true,
            CallbackReturn::Abort(reason) => {
                tracing::debug!("solve aborted: {}", reason);
                self.abort_reason = Some(reason);
                false
            }
            CallbackReturn::Fail(reason) if num_fails > 0 => {
                tracing::debug!("solve failed: {}", reason);
                self.abort_reason = Some(reason);
                self.forced_fail = true;
                false
            }
            CallbackReturn::Fail(_) => true,
        }
    }

    /// Discard all progress and start over.
    ///
    /// A resolver whose requests conflict stays failed.
    ///
    /// # Errors
    ///
    /// As [`Self::with_orderers`].
    pub fn reset(&mut self) -> Result<(), SolveError> {
        if self.request_list.conflict().is_some() {
            return Ok(());
        }

        let phase = ResolvePhase::new(self.request_list.requirements(), &self.cache)?;
        tracing::debug!("resetting...");
        self.phase_stack.clear();
        self.failed_phase_list.clear();
        self.depth_counts.clear();
        self.solve_count = 0;
        self.solve_begun = false;
        self.solve_time = Duration::ZERO;
        self.abort_reason = None;
        self.forced_fail = false;
        self.push_phase(phase);
        Ok(())
    }

    /// The chosen variants, dependencies first, or `None` unless solved.
    #[must_use]
    pub fn resolved_packages(&self) -> Option<Vec<Arc<Variant>>> {
        if self.status() != SolverStatus::Solved {
            return None;
        }
        self.phase_stack.last().map(ResolvePhase::solved_variants)
    }

    /// The phase stack, bottom first.
    #[must_use]
    pub fn phases(&self) -> &[ResolvePhase] {
        &self.phase_stack
    }

    /// Phases rejected so far, oldest first.
    #[must_use]
    pub fn failed_phases(&self) -> &[ResolvePhase] {
        &self.failed_phase_list
    }

    fn latest_nonfailed_phase(&self) -> Option<&ResolvePhase> {
        if self.status() == SolverStatus::Failed {
            return None;
        }
        self.phase_stack
            .iter()
            .rev()
            .find(|p| !matches!(p.status(), SolverStatus::Failed | SolverStatus::Cyclic))
    }

    fn failures(&self) -> Vec<&ResolvePhase> {
        let mut fails: Vec<&ResolvePhase> = self.failed_phase_list.iter().collect();
        if let Some(top) = self.phase_stack.last() {
            if matches!(top.status(), SolverStatus::Failed | SolverStatus::Cyclic) {
                fails.push(top);
            }
        }
        fails
    }

    fn get_failed_phase(&self, index: Option<isize>) -> Result<(&ResolvePhase, String), SolveError> {
        let fails = self.failures();
        let index = index.unwrap_or(if self.forced_fail || self.cyclic_fail() { -1 } else { 0 });
        let available = fails.len();

        let position = if index < 0 { available.checked_sub(index.unsigned_abs()) } else { Some(index.unsigned_abs()) };
        let phase = position.and_then(|i| fails.get(i).copied()).ok_or(SolveError::FailureIndexOutOfRange {
            index,
            available,
        })?;

        let mut description = phase
            .failure_reason()
            .map_or_else(|| phase.status().description().to_string(), FailureReason::description);
        if self.forced_fail {
            if let Some(abort_reason) = &self.abort_reason {
                description = format!("{abort_reason}:\n{description}");
            }
        }
        Ok((phase, description))
    }

    /// Reason of a failed phase.
    ///
    /// `index` counts failures oldest first and may be negative to count
    /// from the latest. By default the latest failure is used after a cycle
    /// or a forced failure, otherwise the first.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::FailureIndexOutOfRange`] if there is no such
    /// failure.
    pub fn failure_reason(&self, index: Option<isize>) -> Result<&FailureReason, SolveError> {
        let (phase, _) = self.get_failed_phase(index)?;
        phase.failure_reason().ok_or_else(|| SolveError::Internal {
            message: format!("failed phase without a reason: {phase}"),
        })
    }

    /// Description of a failure, prefixed with the abort reason when the
    /// failure was forced.
    ///
    /// # Errors
    ///
    /// As [`Self::failure_reason`].
    pub fn failure_description(&self, index: Option<isize>) -> Result<String, SolveError> {
        self.get_failed_phase(index).map(|(_, description)| description)
    }

    /// Requests involved in a failure.
    ///
    /// # Errors
    ///
    /// As [`Self::failure_reason`].
    pub fn failure_packages(&self, index: Option<isize>) -> Result<Vec<PackageRequest>, SolveError> {
        self.failure_reason(index).map(FailureReason::involved_requirements)
    }

    /// Graph of the current state: the latest live phase while solving or
    /// once solved, otherwise the failure graph.
    ///
    /// # Errors
    ///
    /// As [`Self::get_fail_graph`].
    pub fn get_graph(&self) -> Result<ResolveGraph, SolveError> {
        match self.latest_nonfailed_phase() {
            Some(phase) if matches!(self.status(), SolverStatus::Solved | SolverStatus::Unsolved) => {
                Ok(phase.get_graph(self.config.prune_unfailed))
            }
            _ => self.get_fail_graph(None),
        }
    }

    /// Graph of a failure, selected as in [`Self::failure_reason`].
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::FailureIndexOutOfRange`] if there is no such
    /// failure.
    pub fn get_fail_graph(&self, index: Option<isize>) -> Result<ResolveGraph, SolveError> {
        let (phase, _) = self.get_failed_phase(index)?;
        Ok(phase.get_graph(self.config.prune_unfailed))
    }

    /// Summarize the final state.
    ///
    /// # Errors
    ///
    /// Returns a graph error only when `with_graph` is set.
    pub fn outcome(&self, with_graph: bool) -> Result<ResolveOutcome, SolveError> {
        if let Some(variants) = self.resolved_packages() {
            return Ok(ResolveOutcome::Solved {
                packages: variants.iter().map(|v| ResolvedPackage::from_variant(v)).collect(),
            });
        }

        let status = self.status();
        let limit = self.config.max_fails.unwrap_or(usize::MAX);
        let rejected_phases = self
            .failures()
            .into_iter()
            .take(limit)
            .map(|phase| match phase.failure_reason() {
                Some(reason) => format!("{phase}: {}", reason.description()),
                None => phase.to_string(),
            })
            .collect();

        if self.num_fails() == 0 {
            return Ok(ResolveOutcome::Failed(ResolveFailure {
                status,
                reason: None,
                description: self.abort_reason.clone().unwrap_or_else(|| status.description().to_string()),
                involved: Vec::new(),
                rejected_phases,
                graph: None,
            }));
        }

        let (phase, description) = self.get_failed_phase(None)?;
        let reason = phase.failure_reason().cloned();
        let involved = reason
            .as_ref()
            .map(|r| r.involved_requirements().iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        let graph = if with_graph { Some(phase.get_graph(self.config.prune_unfailed)) } else { None };

        Ok(ResolveOutcome::Failed(ResolveFailure {
            status,
            reason,
            description,
            involved,
            rejected_phases,
            graph,
        }))
    }

    /// Multi-line summary of the solve state.
    #[must_use]
    pub fn dump(&self) -> String {
        let status = self.status();
        let mut lines = vec![
            format!("status: {} ({})", status.name(), status.description()),
            format!("initial request: {}", join(&self.requests)),
            String::new(),
            "solve stack:".to_string(),
        ];
        let rows: Vec<[String; 3]> = self
            .phase_stack
            .iter()
            .enumerate()
            .map(|(i, phase)| [self.depth_label(i), phase.status().to_string(), phase.to_string()])
            .collect();
        lines.extend(columnise(&rows));

        if !self.failed_phase_list.is_empty() {
            let rows: Vec<[String; 3]> = self
                .failed_phase_list
                .iter()
                .enumerate()
                .map(|(i, phase)| [format!("#{i}"), phase.status().to_string(), phase.to_string()])
                .collect();
            lines.push(String::new());
            lines.push("previous failures:".to_string());
            lines.extend(columnise(&rows));
        }
        lines.join("\n")
    }

    fn depth_label(&self, depth: usize) -> String {
        let count = self.depth_counts.get(&depth).copied().unwrap_or(0);
        format!("{{{depth},{count}}}")
    }

    fn push_phase(&mut self, phase: ResolvePhase) {
        let depth = self.phase_stack.len();
        let count = self.depth_counts.get(&depth).map_or(0, |c| c + 1);
        self.depth_counts.insert(depth, count);
        tracing::debug!("pushed {}: {}", self.depth_label(depth), phase);
        self.phase_stack.push(phase);
    }

    fn pop_phase(&mut self) -> Result<ResolvePhase, SolveError> {
        let depth = self.phase_stack.len().saturating_sub(1);
        let label = self.depth_label(depth);
        let phase = self.phase_stack.pop().ok_or_else(|| SolveError::Internal {
            message: "the phase stack is empty".to_string(),
        })?;
        tracing::debug!("popped {}: {}", label, phase);
        Ok(phase)
    }
}

impl fmt::Display for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self.phase_stack.len().saturating_sub(1);
        match self.phase_stack.last() {
            Some(top) => write!(f, "{} {} {}", self.status(), self.depth_label(depth), top),
            None => write!(f, "{}", self.status()),
        }
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("requests", &self.requests)
            .field("status", &self.status())
            .field("num_solves", &self.solve_count)
            .field("num_fails", &self.num_fails())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

fn join(requests: &[PackageRequest]) -> String {
    requests.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}

fn columnise(rows: &[[String; 3]]) -> Vec<String> {
    let mut widths = [0usize; 3];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    rows.iter()
        .map(|[a, b, c]| format!("{a:<w0$}  {b:<w1$}  {c}", w0 = widths[0], w1 = widths[1]))
        .collect()
}
