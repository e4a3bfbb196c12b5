//! The plan: every operation needed to reconcile the destination with the source.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::classify::{AdoptConflict, Classifier, FolderOp, LinkConflict, LinkOp, PlanItem};
use super::ignore::IgnoreMatcher;
use super::path::RelativePath;
use super::resolve::{self, Conflict, Policy, ResolvedAction};
use super::scan::{EntryKind, TreeScanner};
use crate::error::TraversalError;
use crate::platform::Platform;

/// Knobs for building a plan.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Treat paths differing only in case as the same destination slot.
    pub case_insensitive: bool,
    /// Absolute path of the running program; an entry at this path is ignored.
    pub self_path: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            case_insensitive: Platform::detect().case_insensitive_paths(),
            self_path: None,
        }
    }
}

/// A computed, not-yet-applied description of the work.
///
/// Building a plan reads both trees but never mutates either.  Conflicts
/// start out pending; [`resolve`](Self::resolve) moves each one into the
/// adoption, link-fix, or unresolved set.
#[derive(Debug)]
pub struct Plan {
    source_root: PathBuf,
    destination_root: PathBuf,
    items: Vec<PlanItem>,
    folders_to_create: Vec<FolderOp>,
    links_to_create: Vec<LinkOp>,
    pending_conflicts: Vec<Conflict>,
    resolved_adoptions: Vec<AdoptConflict>,
    resolved_link_fixes: Vec<LinkConflict>,
    unresolved: Vec<Conflict>,
    warnings: Vec<TraversalError>,
}

impl Plan {
    /// Aggregate classified items into a plan.
    ///
    /// Pure: performs no I/O.
    #[must_use]
    pub fn build(
        source_root: PathBuf,
        destination_root: PathBuf,
        items: Vec<PlanItem>,
        warnings: Vec<TraversalError>,
    ) -> Self {
        let mut folders_to_create = Vec::new();
        let mut links_to_create = Vec::new();
        let mut pending_conflicts = Vec::new();
        for item in &items {
            match item {
                PlanItem::FolderCreate(op) => folders_to_create.push(op.clone()),
                PlanItem::LinkCreate(op) => links_to_create.push(op.clone()),
                PlanItem::AdoptConflict(c) => pending_conflicts.push(Conflict::Adopt(c.clone())),
                PlanItem::LinkConflict(c) => pending_conflicts.push(Conflict::Link(c.clone())),
                PlanItem::Satisfied { .. } | PlanItem::Ignored { .. } => {}
            }
        }
        Self {
            source_root,
            destination_root,
            items,
            folders_to_create,
            links_to_create,
            pending_conflicts,
            resolved_adoptions: Vec::new(),
            resolved_link_fixes: Vec::new(),
            unresolved: Vec::new(),
            warnings,
        }
    }

    /// Scan `source_root`, classify every entry against `destination_root`,
    /// and aggregate the result.
    ///
    /// Roots are taken as given; validating them is the caller's job.
    /// Traversal problems never abort the build: the affected entry is
    /// skipped and the error is kept in [`warnings`](Self::warnings).
    #[must_use]
    pub fn scan(
        source_root: &Path,
        destination_root: &Path,
        ignore: &IgnoreMatcher,
        options: &BuildOptions,
    ) -> Self {
        let classifier = Classifier::new(source_root, destination_root, ignore)
            .with_self_path(options.self_path.as_deref());
        let mut seen: HashMap<String, RelativePath> = HashMap::new();
        let mut items = Vec::new();
        let mut warnings = Vec::new();

        for result in TreeScanner::new(source_root).scan() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(err);
                    continue;
                }
            };

            if options.case_insensitive {
                let key = entry.relative.folded();
                if let Some(first) = seen.get(&key) {
                    warnings.push(TraversalError::Collision {
                        first: first.clone(),
                        second: entry.relative.clone(),
                    });
                    continue;
                }
                seen.insert(key, entry.relative.clone());
            }

            match classifier.classify(&entry) {
                Ok(item) => items.push(item),
                Err(err) => warnings.push(err),
            }
        }

        Self::build(
            source_root.to_path_buf(),
            destination_root.to_path_buf(),
            items,
            warnings,
        )
    }

    /// Decide every pending conflict under `policy`.
    ///
    /// # Errors
    ///
    /// Propagates errors from the decision source; the plan is consumed and
    /// nothing has been applied.
    pub fn resolve(mut self, policy: &mut Policy<'_>) -> Result<Self> {
        let pending = std::mem::take(&mut self.pending_conflicts);
        for action in resolve::resolve(&pending, policy)? {
            match action {
                ResolvedAction::Adopt(c) => self.resolved_adoptions.push(c),
                ResolvedAction::FixLink(c) => self.resolved_link_fixes.push(c),
                ResolvedAction::Unresolved(c) => self.unresolved.push(c),
            }
        }
        Ok(self)
    }

    /// The source root the plan was built from.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// The destination root the plan reconciles.
    #[must_use]
    pub fn destination_root(&self) -> &Path {
        &self.destination_root
    }

    /// One item per classified entry, in scan order.
    #[must_use]
    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    /// Folders to create, parents before children.
    #[must_use]
    pub fn folders_to_create(&self) -> &[FolderOp] {
        &self.folders_to_create
    }

    /// Links for empty destination slots.
    #[must_use]
    pub fn links_to_create(&self) -> &[LinkOp] {
        &self.links_to_create
    }

    /// Conflicts not yet decided.
    #[must_use]
    pub fn pending_conflicts(&self) -> &[Conflict] {
        &self.pending_conflicts
    }

    /// Accepted adoptions.
    #[must_use]
    pub fn resolved_adoptions(&self) -> &[AdoptConflict] {
        &self.resolved_adoptions
    }

    /// Accepted link fixes.
    #[must_use]
    pub fn resolved_link_fixes(&self) -> &[LinkConflict] {
        &self.resolved_link_fixes
    }

    /// Rejected conflicts, kept for reporting.
    #[must_use]
    pub fn unresolved(&self) -> &[Conflict] {
        &self.unresolved
    }

    /// Entries skipped while scanning or classifying.
    #[must_use]
    pub fn warnings(&self) -> &[TraversalError] {
        &self.warnings
    }

    /// Number of entries of `kind` that already match.
    #[must_use]
    pub fn satisfied_count(&self, kind: EntryKind) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, PlanItem::Satisfied { kind: k, .. } if *k == kind))
            .count()
    }

    /// Number of ignored entries.
    #[must_use]
    pub fn ignored_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, PlanItem::Ignored { .. }))
            .count()
    }

    /// Whether applying the plan would change anything.
    #[must_use]
    pub fn has_work(&self) -> bool {
        !(self.folders_to_create.is_empty()
            && self.links_to_create.is_empty()
            && self.resolved_adoptions.is_empty()
            && self.resolved_link_fixes.is_empty())
    }

    /// Whether the destination already mirrors the source: nothing to do and
    /// nothing in conflict.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        !self.items.iter().any(PlanItem::is_actionable)
    }
}
