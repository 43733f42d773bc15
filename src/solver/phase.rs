//! One node of the resolver's search.
//!
//! A phase holds a full copy of the solve state: one scope per family in
//! play. [`ResolvePhase::solve`] deduces as much as it can by extracting,
//! intersecting, adding and reducing until nothing changes. What is left is
//! either solved, failed, or exhausted; an exhausted phase must be split to
//! make further progress.

use super::dependency_graph::FamilyGraph;
use super::graph::{EdgeKind, GraphBuilder, NodeKind, ResolveGraph};
use super::scope::PackageScope;
use super::types::{DependencyConflict, FailureReason, Narrowed, SolverStatus, VariantSelectMode};
use super::variant::{Variant, VariantCache};
use crate::core::SolveError;
use crate::request::{PackageRequest, PackageRequestList};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

fn all_pairs(len: usize) -> BTreeSet<(usize, usize)> {
    (0..len).flat_map(|i| (0..len).filter(move |&j| j != i).map(move |j| (i, j))).collect()
}

/// A snapshot of the solve state.
#[derive(Debug, Clone)]
pub struct ResolvePhase {
    requests: Arc<[PackageRequest]>,
    scopes: Vec<Arc<PackageScope>>,
    status: SolverStatus,
    failure_reason: Option<FailureReason>,
    extractions: BTreeMap<(String, String), PackageRequest>,
    pending_reducts: BTreeSet<(usize, usize)>,
}

impl ResolvePhase {
    /// Create the initial phase with one scope per request.
    ///
    /// # Errors
    ///
    /// Returns the scope creation errors, e.g. a request with no matching
    /// package.
    pub fn new(requests: &[PackageRequest], cache: &VariantCache<'_>) -> Result<Self, SolveError> {
        let scopes = requests
            .iter()
            .map(|request| PackageScope::new(request, cache).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            requests: requests.into(),
            pending_reducts: all_pairs(scopes.len()),
            scopes,
            status: SolverStatus::Pending,
            failure_reason: None,
            extractions: BTreeMap::new(),
        })
    }

    /// A phase that failed before any scope was created.
    #[must_use]
    pub fn failed(requests: &[PackageRequest], reason: FailureReason) -> Self {
        Self {
            requests: requests.into(),
            scopes: Vec::new(),
            status: SolverStatus::Failed,
            failure_reason: Some(reason),
            extractions: BTreeMap::new(),
            pending_reducts: BTreeSet::new(),
        }
    }

    /// Requests the phase was created from.
    #[must_use]
    pub fn requests(&self) -> &[PackageRequest] {
        &self.requests
    }

    /// Scopes, in phase order.
    #[must_use]
    pub fn scopes(&self) -> &[Arc<PackageScope>] {
        &self.scopes
    }

    /// The scope of `family`.
    #[must_use]
    pub fn scope(&self, family: &str) -> Option<&Arc<PackageScope>> {
        self.scopes.iter().find(|s| s.family() == family)
    }

    /// Phase status.
    #[must_use]
    pub const fn status(&self) -> SolverStatus {
        self.status
    }

    /// Why the phase failed.
    #[must_use]
    pub const fn failure_reason(&self) -> Option<&FailureReason> {
        self.failure_reason.as_ref()
    }

    /// Requests extracted during the last solve, keyed by
    /// `(source family, extracted family)`.
    #[must_use]
    pub const fn extractions(&self) -> &BTreeMap<(String, String), PackageRequest> {
        &self.extractions
    }

    /// Scope pairs `(i, j)` still to be checked: reduce `j` by `i`.
    #[must_use]
    pub const fn pending_reducts(&self) -> &BTreeSet<(usize, usize)> {
        &self.pending_reducts
    }

    /// True if every scope is solved.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.scopes.iter().all(|s| s.is_solved())
    }

    /// The chosen variants, in scope order.
    #[must_use]
    pub fn solved_variants(&self) -> Vec<Arc<Variant>> {
        self.scopes.iter().filter_map(|s| s.solved_variant().cloned()).collect()
    }

    /// Run deductions until no more are possible.
    ///
    /// A phase that is not pending is returned unchanged. Otherwise the
    /// result is solved, exhausted, or failed with a reason.
    ///
    /// # Errors
    ///
    /// Returns run-fatal errors from loading packages. A family or version
    /// that cannot be found fails the phase instead.
    pub fn solve(&self, cache: &VariantCache<'_>, optimised: bool) -> Result<Self, SolveError> {
        if self.status != SolverStatus::Pending {
            return Ok(self.clone());
        }

        let mut scopes = self.scopes.clone();
        let mut extractions = BTreeMap::new();
        let mut pending = self.pending_reducts.clone();

        let failure = 'solve: loop {
            loop {
                trace!("extracting");
                let mut common_requests = Vec::new();
                for scope in &mut scopes {
                    while let Some((extracted, request)) = scope.extract() {
                        extractions.insert((scope.family().to_string(), request.name().to_string()), request.clone());
                        common_requests.push(request);
                        *scope = Arc::new(extracted);
                    }
                }

                if common_requests.is_empty() {
                    break;
                }

                let request_list = PackageRequestList::new(&common_requests);
                if let Some((first, second)) = request_list.conflict() {
                    debug!("extracted requests conflict: {} <--!--> {}", first, second);
                    break 'solve Some(FailureReason::DependencyConflicts(vec![DependencyConflict::new(
                        first.clone(),
                        second.clone(),
                    )]));
                }
                debug!("merged extractions: {}", request_list);

                let mut intersected = BTreeSet::new();
                for i in 0..scopes.len() {
                    let Some(request) = request_list.get(scopes[i].family()) else {
                        continue;
                    };
                    intersected.insert(request.name().to_string());

                    let range = request.range().cloned().unwrap_or_default();
                    let narrowed = match scopes[i].intersect(&range, cache) {
                        Ok(narrowed) => narrowed,
                        Err(e) if e.is_branch_local() => {
                            break 'solve Some(FailureReason::PackageNotFound(request.clone()));
                        }
                        Err(e) => return Err(e),
                    };

                    match narrowed {
                        Narrowed::Empty => {
                            break 'solve Some(FailureReason::DependencyConflicts(vec![DependencyConflict::new(
                                request.clone(),
                                scopes[i].request().clone(),
                            )]));
                        }
                        Narrowed::Changed(scope) => {
                            scopes[i] = Arc::new(scope);
                            pending.extend((0..scopes.len()).filter(|&j| j != i).map(|j| (i, j)));
                        }
                        Narrowed::Unchanged => {}
                    }
                }

                let new_requests: Vec<&PackageRequest> =
                    request_list.iter().filter(|r| !intersected.contains(r.name())).collect();
                if !new_requests.is_empty() {
                    let n = scopes.len();
                    let m = new_requests.len();
                    for request in new_requests {
                        let scope = match PackageScope::new(request, cache) {
                            Ok(scope) => scope,
                            Err(e) if e.is_branch_local() => {
                                debug!("could not add {}: {}", request, e);
                                break 'solve Some(FailureReason::PackageNotFound(request.clone()));
                            }
                            Err(e) => return Err(e),
                        };
                        debug!("added {}", scope);
                        scopes.push(Arc::new(scope));
                    }

                    for i in n..n + m {
                        pending.extend((0..n + m).filter(|&j| j != i).map(|j| (i, j)));
                    }
                    for i in 0..n {
                        pending.extend((n..n + m).map(|j| (i, j)));
                    }
                }
            }

            if pending.is_empty() {
                break None;
            }

            trace!("reducing");
            if !optimised {
                pending = all_pairs(scopes.len());
            }

            while !pending.is_empty() {
                let mut next_pending = BTreeSet::new();
                for &(i, j) in &pending {
                    let request = scopes[i].request().clone();
                    let (narrowed, reductions) = scopes[j].reduce_by(&request);
                    match narrowed {
                        Narrowed::Empty => break 'solve Some(FailureReason::TotalReduction(reductions)),
                        Narrowed::Changed(scope) => {
                            scopes[j] = Arc::new(scope);
                            next_pending.extend((0..scopes.len()).filter(|&k| k != j).map(|k| (j, k)));
                        }
                        Narrowed::Unchanged => {}
                    }
                }
                pending = next_pending;
            }
        };

        let status = match &failure {
            Some(_) => SolverStatus::Failed,
            None if scopes.iter().all(|s| s.is_solved()) => SolverStatus::Solved,
            None => SolverStatus::Exhausted,
        };

        let phase = Self {
            requests: Arc::clone(&self.requests),
            scopes,
            status,
            failure_reason: failure,
            extractions,
            pending_reducts: BTreeSet::new(),
        };
        match &phase.failure_reason {
            Some(reason) => debug!("phase failed: {}", reason.description()),
            None => debug!("phase {}: {}", phase.status, phase),
        }
        Ok(phase)
    }

    /// Turn a solved phase into its final form.
    ///
    /// Conflict scopes are dropped and the remaining scopes are ordered so
    /// every family follows the families it depends on, keeping request
    /// order where possible. If the chosen variants depend on each other in
    /// a cycle, the phase is marked cyclic instead.
    #[must_use]
    pub fn finalise(&self) -> Self {
        let mut graph = FamilyGraph::new();
        for variant in self.solved_variants() {
            graph.add_node(variant.name());
        }
        for variant in self.solved_variants() {
            for request in variant.requires().iter().filter(|r| !r.conflict()) {
                if let Some(dependency) = self.scope(request.name()).and_then(|s| s.solved_variant()) {
                    graph.add_dependency(variant.name(), dependency.name());
                }
            }
        }

        if let Some(cycle) = graph.find_cycle() {
            let packages = cycle
                .iter()
                .filter_map(|family| self.scope(family).and_then(|s| s.solved_variant()))
                .map(|variant| variant.versioned_object())
                .collect();
            let reason = FailureReason::Cycle(packages);
            debug!("{}", reason.description());
            return Self {
                scopes: self.scopes.iter().filter(|s| !s.is_conflict()).cloned().collect(),
                status: SolverStatus::Cyclic,
                failure_reason: Some(reason),
                ..self.clone()
            };
        }

        let preferred: Vec<String> = self.requests.iter().map(|r| r.name().to_string()).collect();
        let scopes = graph
            .dependency_order(&preferred)
            .iter()
            .filter_map(|family| self.scope(family))
            .filter(|s| !s.is_conflict())
            .cloned()
            .collect();

        Self {
            scopes,
            ..self.clone()
        }
    }

    /// Split an exhausted phase in two.
    ///
    /// The first splittable scope is split; the primary phase gets the
    /// leading block of its variants and the fallback phase the rest. Both
    /// are pending, with the split scope scheduled to reduce every other.
    ///
    /// # Errors
    ///
    /// Returns [`SolveError::Internal`] if no scope can be split.
    pub fn split(&self, requests: &[PackageRequest], mode: VariantSelectMode) -> Result<(Self, Self), SolveError> {
        let mut scopes = Vec::with_capacity(self.scopes.len());
        let mut next_scopes = Vec::with_capacity(self.scopes.len());
        let mut split = None;

        for (i, scope) in self.scopes.iter().enumerate() {
            if split.is_none() {
                if let Some((leading, rest)) = scope.split(requests, mode) {
                    scopes.push(Arc::new(leading));
                    next_scopes.push(Arc::new(rest));
                    split = Some(i);
                    continue;
                }
            }
            scopes.push(Arc::clone(scope));
            next_scopes.push(Arc::clone(scope));
        }

        let Some(split) = split else {
            return Err(SolveError::Internal {
                message: format!("no scope of the exhausted phase can be split: {self}"),
            });
        };
        debug!("split {} into {} and {}", self.scopes[split], scopes[split], next_scopes[split]);

        let pending_reducts: BTreeSet<(usize, usize)> =
            (0..scopes.len()).filter(|&i| i != split).map(|i| (split, i)).collect();

        let phase = Self {
            scopes,
            status: SolverStatus::Pending,
            pending_reducts,
            ..self.clone()
        };
        let next_phase = Self {
            scopes: next_scopes,
            ..phase.clone()
        };
        Ok((phase, next_phase))
    }

    /// Diagnostic graph of this phase.
    ///
    /// With `prune_unfailed`, a failed phase's graph keeps only the nodes
    /// that lead to the failure.
    #[must_use]
    pub fn get_graph(&self, prune_unfailed: bool) -> ResolveGraph {
        let mut g = PhaseGraph::default();

        for request in self.requests.iter() {
            g.request_node(request, true);
        }

        for scope in &self.scopes {
            if scope.is_conflict() {
                if let Some(pos) = g.requests.iter().position(|(r, _)| r == scope.request()) {
                    let (_, node) = g.requests.remove(pos);
                    g.builder.set_kind(node, NodeKind::ConflictScope);
                    g.scopes.insert(scope.family().to_string(), node);
                    continue;
                }
            }
            g.scope_node(scope);
        }

        for request in self.requests.iter() {
            if let (Some(id1), Some(&id2)) = (g.find_request(request), g.scopes.get(request.name())) {
                g.builder.add_edge(id1, id2, EdgeKind::Requires, None);
            }
        }

        for scope in &self.scopes {
            if let Some(variant) = scope.solved_variant() {
                if let Some(&id1) = g.scopes.get(scope.family()) {
                    for request in variant.requires() {
                        let id2 = g.request_node(request, false);
                        g.builder.add_edge(id1, id2, EdgeKind::Requires, None);
                    }
                }
            }
        }

        for ((source, _), request) in &self.extractions {
            if let Some(&id1) = g.scopes.get(source) {
                let id2 = g.request_node(request, false);
                g.builder.add_edge(id1, id2, EdgeKind::VariantChoice, None);
            }
        }

        let extracted_fams: BTreeSet<&str> = self.extractions.keys().map(|(_, family)| family.as_str()).collect();
        for family in extracted_fams {
            let requests: Vec<&PackageRequest> =
                self.extractions.iter().filter(|((_, f), _)| f == family).map(|(_, r)| r).collect();
            if requests.len() < 2 {
                continue;
            }
            let merged_list = PackageRequestList::new(requests.iter().copied());
            if merged_list.conflict().is_some() {
                continue;
            }
            if let Some(merged) = merged_list.get(family) {
                for request in requests.into_iter().filter(|r| *r != merged) {
                    let id1 = g.request_node(request, false);
                    let id2 = g.request_node(merged, false);
                    g.builder.add_edge(id1, id2, EdgeKind::Requires, Some("merged".to_string()));
                }
            }
        }

        if let Some(reason) = &self.failure_reason {
            g.add_failure(reason);
        }

        let leaves: Vec<(PackageRequest, NodeIndex)> =
            g.requests.iter().filter(|(_, node)| !g.builder.has_out_edges(*node)).cloned().collect();
        for (request, id1) in leaves {
            if let (Some(&id2), Some(scope)) = (g.scopes.get(request.name()), self.scope(request.name())) {
                if !request.conflicts_with(scope.request()) {
                    g.builder.add_edge(id1, id2, EdgeKind::Requires, None);
                }
            }
        }

        g.builder.finish(prune_unfailed)
    }
}

impl fmt::Display for ResolvePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.scopes.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" "))
    }
}

#[derive(Default)]
struct PhaseGraph {
    builder: GraphBuilder,
    requests: Vec<(PackageRequest, NodeIndex)>,
    scopes: BTreeMap<String, NodeIndex>,
}

impl PhaseGraph {
    fn find_request(&self, request: &PackageRequest) -> Option<NodeIndex> {
        self.requests.iter().find(|(r, _)| r == request).map(|(_, node)| *node)
    }

    fn request_node(&mut self, request: &PackageRequest, initial: bool) -> NodeIndex {
        if let Some(node) = self.find_request(request) {
            return node;
        }
        let kind = if initial { NodeKind::InitialRequest } else { NodeKind::Request };
        let node = self.builder.add_node(request.to_string(), kind);
        self.requests.push((request.clone(), node));
        node
    }

    fn scope_node(&mut self, scope: &PackageScope) -> NodeIndex {
        if let Some(&node) = self.scopes.get(scope.family()) {
            return node;
        }
        let node = match scope.solved_variant() {
            Some(variant) => self.builder.add_node(variant.to_string(), NodeKind::SolvedScope),
            None if scope.is_conflict() => self.builder.add_node(scope.to_string(), NodeKind::ConflictScope),
            None => self.builder.add_node(scope.to_string(), NodeKind::Scope),
        };
        self.scopes.insert(scope.family().to_string(), node);
        node
    }

    fn add_failure(&mut self, reason: &FailureReason) {
        match reason {
            FailureReason::DependencyConflicts(conflicts) => {
                for conflict in conflicts {
                    let id1 = self.request_node(&conflict.dependency, false);
                    let id2 = match self.scopes.get(conflict.conflicting_request.name()) {
                        Some(&node) => node,
                        None => self.request_node(&conflict.conflicting_request, false),
                    };
                    self.builder.add_edge(id1, id2, EdgeKind::Conflict, None);
                    self.builder.mark_failed(id1);
                    self.builder.mark_failed(id2);
                }
            }
            FailureReason::TotalReduction(reductions) if reductions.len() == 1 => {
                let reduction = &reductions[0];
                let id1 = self.scopes.get(&reduction.name).copied();
                let id3 = self.scopes.get(reduction.conflicting_request.name()).copied();
                if let (Some(id1), Some(id3)) = (id1, id3) {
                    let id2 = self.request_node(&reduction.dependency, false);
                    self.builder.add_edge(id1, id2, EdgeKind::Requires, None);
                    self.builder.add_edge(id2, id3, EdgeKind::Conflict, None);
                    for node in [id1, id2, id3] {
                        self.builder.mark_failed(node);
                    }
                }
            }
            FailureReason::TotalReduction(reductions) => {
                for reduction in reductions {
                    let id1 = self.scopes.get(&reduction.name).copied();
                    let id3 = self.scopes.get(reduction.conflicting_request.name()).copied();
                    if let (Some(id1), Some(id3)) = (id1, id3) {
                        let id2 = self.builder.add_node(reduction.dependency.to_string(), NodeKind::Reduction);
                        self.builder.add_edge(id1, id2, EdgeKind::Reduce, Some(reduction.reducee_str()));
                        self.builder.add_edge(id2, id3, EdgeKind::Conflict, None);
                        for node in [id1, id2, id3] {
                            self.builder.mark_failed(node);
                        }
                    }
                }
            }
            FailureReason::Cycle(packages) => {
                for (i, package) in packages.iter().enumerate() {
                    let next = &packages[(i + 1) % packages.len()];
                    let id1 = self.scopes.get(package.name()).copied();
                    let id2 = self.scopes.get(next.name()).copied();
                    if let (Some(id1), Some(id2)) = (id1, id2) {
                        self.builder.add_edge(id1, id2, EdgeKind::Cycle, None);
                        self.builder.mark_failed(id1);
                    }
                }
            }
            FailureReason::PackageNotFound(request) => {
                let node = self.request_node(request, false);
                self.builder.mark_failed(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::PackageOrderList;
    use crate::repository::{MemoryRepository, PackageMetadata};

    fn req(s: &str) -> PackageRequest {
        s.parse().unwrap()
    }

    fn reqs(items: &[&str]) -> Vec<PackageRequest> {
        items.iter().map(|s| req(s)).collect()
    }

    fn repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for v in ["2.5.2", "2.6.0", "2.6.8", "2.7.0"] {
            repo.add(PackageMetadata::new("python", v.parse().unwrap()));
        }
        repo.add(PackageMetadata::new("pyfoo", "3.0.0".parse().unwrap()).with_requires(reqs(&["python-2.5"])));
        repo.add(PackageMetadata::new("pyfoo", "3.1.0".parse().unwrap()).with_requires(reqs(&["python-2.6"])));
        repo.add(PackageMetadata::new("app", "1".parse().unwrap()).with_requires(reqs(&["missing"])));
        repo
    }

    #[test]
    fn test_new_phase_schedules_all_pairs() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let phase = ResolvePhase::new(&reqs(&["pyfoo", "python"]), &cache).unwrap();
        assert_eq!(phase.status(), SolverStatus::Pending);
        assert_eq!(phase.pending_reducts().len(), 2);
        assert_eq!(phase.to_string(), "pyfoo[3.0.0..3.1.0(2)]* python[2.5.2..2.7.0(4)]");
    }

    #[test]
    fn test_solve_to_exhaustion() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let phase = ResolvePhase::new(&reqs(&["pyfoo"]), &cache).unwrap();
        let solved = phase.solve(&cache, true).unwrap();
        assert_eq!(solved.status(), SolverStatus::Exhausted);
        assert!(solved.pending_reducts().is_empty());
        assert_eq!(solved.extractions().len(), 1);
        assert_eq!(solved.scope("python").unwrap().request().to_string(), "python==2.5.2|==2.6.0|==2.6.8");

        let (primary, fallback) = solved.split(&reqs(&["pyfoo"]), VariantSelectMode::VersionPriority).unwrap();
        assert_eq!(primary.status(), SolverStatus::Pending);
        assert_eq!(primary.pending_reducts().iter().copied().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(fallback.scopes()[0].to_string(), "[pyfoo==3.0.0]*");

        let solved = primary.solve(&cache, true).unwrap();
        assert_eq!(solved.status(), SolverStatus::Exhausted);
        let (primary, _) = solved.split(&reqs(&["pyfoo"]), VariantSelectMode::VersionPriority).unwrap();
        let solved = primary.solve(&cache, true).unwrap();
        assert_eq!(solved.status(), SolverStatus::Solved);

        let finalised = solved.finalise();
        let names: Vec<String> = finalised.solved_variants().iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["python-2.6.8[]", "pyfoo-3.1.0[]"]);
    }

    #[test]
    fn test_extraction_conflict_fails() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let phase = ResolvePhase::new(&reqs(&["pyfoo-3.1", "python-2.5"]), &cache).unwrap();
        let solved = phase.solve(&cache, true).unwrap();
        assert_eq!(solved.status(), SolverStatus::Failed);
        assert!(matches!(solved.failure_reason(), Some(FailureReason::DependencyConflicts(_))));

        let graph = solved.get_graph(true);
        assert_eq!(graph.edges_of_kind(EdgeKind::Conflict).count(), 1);
    }

    #[test]
    fn test_missing_dependency_is_branch_local() {
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let phase = ResolvePhase::new(&reqs(&["app"]), &cache).unwrap();
        let solved = phase.solve(&cache, true).unwrap();
        assert_eq!(solved.status(), SolverStatus::Failed);
        assert_eq!(solved.failure_reason(), Some(&FailureReason::PackageNotFound(req("missing"))));
    }

    #[test]
    fn test_non_pending_phase_is_unchanged() {
        let phase = ResolvePhase::failed(
            &reqs(&["nada", "!nada"]),
            FailureReason::DependencyConflicts(vec![DependencyConflict::new(req("nada"), req("!nada"))]),
        );
        let repo = repo();
        let cache = VariantCache::new(&repo, PackageOrderList::default());
        let again = phase.solve(&cache, true).unwrap();
        assert_eq!(again.status(), SolverStatus::Failed);
        assert!(again.scopes().is_empty());

        let graph = again.get_graph(true);
        assert_eq!(graph.edge("nada", "!nada").unwrap().kind, EdgeKind::Conflict);
    }
}
