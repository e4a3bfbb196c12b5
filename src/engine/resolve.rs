//! Conflict resolution: turning conflicts into actions, one decision at a time.
//!
//! Adoption conflicts are resolved in a first pass and link conflicts in a
//! second.  Within a pass, conflicts are decided in scan order and an
//! [`Decision::AcceptAll`] or [`Decision::RejectAll`] answer settles every
//! remaining conflict of that pass without asking again.
use std::collections::VecDeque;
use std::fmt;

use anyhow::{Result, bail};

use super::classify::{AdoptConflict, LinkConflict};
use super::path::RelativePath;

/// A conflict awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    /// A real object occupies the destination slot.
    Adopt(AdoptConflict),
    /// A link in the destination slot points to the wrong target.
    Link(LinkConflict),
}

impl Conflict {
    /// Source-relative identity of the conflict.
    #[must_use]
    pub const fn relative(&self) -> &RelativePath {
        match self {
            Self::Adopt(c) => &c.relative,
            Self::Link(c) => &c.relative,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Adopt(c) => write!(
                f,
                "{} is not a link; move it to {} (replacing the source copy) and link it",
                c.link_path.display(),
                c.source_path.display()
            ),
            Self::Link(c) => write!(
                f,
                "{} points to {}; relink it to {}",
                c.link_path.display(),
                c.current_target.display(),
                c.expected_target.display()
            ),
        }
    }
}

/// The answer for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Resolve this conflict.
    Accept,
    /// Leave this conflict unresolved.
    Reject,
    /// Resolve this and every remaining conflict of the same pass.
    AcceptAll,
    /// Leave this and every remaining conflict of the same pass unresolved.
    RejectAll,
}

impl Decision {
    /// Every choice, in prompt order.
    pub const ALL: [Self; 4] = [Self::Accept, Self::Reject, Self::AcceptAll, Self::RejectAll];

    const fn accepts(self) -> bool {
        matches!(self, Self::Accept | Self::AcceptAll)
    }

    const fn is_sticky(self) -> bool {
        matches!(self, Self::AcceptAll | Self::RejectAll)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accept => "Accept",
            Self::Reject => "Reject",
            Self::AcceptAll => "Accept all remaining",
            Self::RejectAll => "Reject all remaining",
        })
    }
}

/// Supplies a [`Decision`] for each conflict.
#[cfg_attr(test, mockall::automock)]
pub trait DecisionSource {
    /// Decide one conflict.
    ///
    /// # Errors
    ///
    /// Returns an error if no decision can be obtained (e.g., the terminal
    /// went away); resolution stops and nothing is applied.
    fn decide(&mut self, conflict: &Conflict) -> Result<Decision>;
}

/// How conflicts are decided.
pub enum Policy<'a> {
    /// Accept every conflict without asking.
    AutoApprove,
    /// Ask a decision source for each conflict.
    Ask(&'a mut dyn DecisionSource),
}

impl fmt::Debug for Policy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApprove => f.write_str("AutoApprove"),
            Self::Ask(_) => f.write_str("Ask(..)"),
        }
    }
}

/// What was decided for one conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    /// Move the destination object into the source tree, then link.
    Adopt(AdoptConflict),
    /// Remove the stale link, then link.
    FixLink(LinkConflict),
    /// Leave the slot as it is; reported at the end.
    Unresolved(Conflict),
}

/// Run both resolution passes over `conflicts`.
///
/// The returned actions hold every adoption conflict (in scan order) followed
/// by every link conflict (in scan order).
///
/// # Errors
///
/// Propagates the first error from the decision source.
pub fn resolve(conflicts: &[Conflict], policy: &mut Policy<'_>) -> Result<Vec<ResolvedAction>> {
    let adoptions = conflicts
        .iter()
        .filter(|c| matches!(c, Conflict::Adopt(_)));
    let links = conflicts.iter().filter(|c| matches!(c, Conflict::Link(_)));

    let mut actions = run_pass(adoptions, policy)?;
    actions.extend(run_pass(links, policy)?);
    Ok(actions)
}

fn run_pass<'c>(
    conflicts: impl Iterator<Item = &'c Conflict>,
    policy: &mut Policy<'_>,
) -> Result<Vec<ResolvedAction>> {
    let mut sticky: Option<Decision> = None;
    let mut actions = Vec::new();
    for conflict in conflicts {
        let decision = match (sticky, &mut *policy) {
            (Some(decision), _) => decision,
            (None, Policy::AutoApprove) => Decision::Accept,
            (None, Policy::Ask(source)) => {
                let decision = source.decide(conflict)?;
                if decision.is_sticky() {
                    sticky = Some(decision);
                }
                decision
            }
        };
        actions.push(action_for(conflict, decision));
    }
    Ok(actions)
}

fn action_for(conflict: &Conflict, decision: Decision) -> ResolvedAction {
    if !decision.accepts() {
        return ResolvedAction::Unresolved(conflict.clone());
    }
    match conflict {
        Conflict::Adopt(c) => ResolvedAction::Adopt(c.clone()),
        Conflict::Link(c) => ResolvedAction::FixLink(c.clone()),
    }
}

/// Asks the operator on the terminal.
#[derive(Debug, Default)]
pub struct PromptDecisions;

impl DecisionSource for PromptDecisions {
    fn decide(&mut self, conflict: &Conflict) -> Result<Decision> {
        let choice = dialoguer::Select::new()
            .with_prompt(conflict.to_string())
            .items(&Decision::ALL)
            .default(1)
            .interact_opt()?;
        // Escape counts as a rejection of this item only.
        Ok(choice
            .and_then(|i| Decision::ALL.get(i).copied())
            .unwrap_or(Decision::Reject))
    }
}

/// Replays a fixed sequence of decisions.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    queue: VecDeque<Decision>,
}

impl ScriptedDecisions {
    /// Decisions are handed out in the given order.
    #[must_use]
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            queue: decisions.into_iter().collect(),
        }
    }

    /// Decisions not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn decide(&mut self, conflict: &Conflict) -> Result<Decision> {
        match self.queue.pop_front() {
            Some(decision) => Ok(decision),
            None => bail!("no decision left for '{}'", conflict.relative()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn adopt(rel: &str) -> Conflict {
        Conflict::Adopt(AdoptConflict {
            relative: RelativePath::new(rel),
            link_path: PathBuf::from("/dst").join(rel),
            source_path: PathBuf::from("/src").join(rel),
        })
    }

    fn link(rel: &str) -> Conflict {
        Conflict::Link(LinkConflict {
            relative: RelativePath::new(rel),
            link_path: PathBuf::from("/dst").join(rel),
            current_target: PathBuf::from("/old").join(rel),
            expected_target: PathBuf::from("/src").join(rel),
        })
    }

    fn summary(actions: &[ResolvedAction]) -> Vec<String> {
        actions
            .iter()
            .map(|a| match a {
                ResolvedAction::Adopt(c) => format!("adopt {}", c.relative),
                ResolvedAction::FixLink(c) => format!("fix {}", c.relative),
                ResolvedAction::Unresolved(c) => format!("skip {}", c.relative()),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // ordering
    // -----------------------------------------------------------------------

    #[test]
    fn auto_approve_accepts_everything_adoptions_first() {
        let conflicts = vec![link("a"), adopt("b"), link("c"), adopt("d")];
        let actions = resolve(&conflicts, &mut Policy::AutoApprove).unwrap();
        assert_eq!(
            summary(&actions),
            vec!["adopt b", "adopt d", "fix a", "fix c"]
        );
    }

    #[test]
    fn adoptions_are_asked_before_links() {
        let conflicts = vec![link("first"), adopt("second")];
        let mut asked = Vec::new();
        let mut source = MockDecisionSource::new();
        source.expect_decide().times(2).returning(move |c| {
            asked.push(c.relative().to_string());
            assert_eq!(asked.first().map(String::as_str), Some("second"));
            Ok(Decision::Accept)
        });
        resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap();
    }

    // -----------------------------------------------------------------------
    // sticky decisions
    // -----------------------------------------------------------------------

    #[test]
    fn accept_all_stops_prompting_for_the_pass() {
        let conflicts = vec![adopt("a"), adopt("b"), adopt("c")];
        let mut source = MockDecisionSource::new();
        source
            .expect_decide()
            .times(1)
            .returning(|_| Ok(Decision::AcceptAll));
        let actions = resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap();
        assert_eq!(summary(&actions), vec!["adopt a", "adopt b", "adopt c"]);
    }

    #[test]
    fn reject_all_leaves_the_rest_unresolved() {
        let conflicts = vec![adopt("a"), adopt("b"), adopt("c")];
        let mut source = ScriptedDecisions::new([Decision::Accept, Decision::RejectAll]);
        let actions = resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap();
        assert_eq!(summary(&actions), vec!["adopt a", "skip b", "skip c"]);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn sticky_decision_does_not_cross_passes() {
        let conflicts = vec![adopt("a"), adopt("b"), link("c"), link("d")];
        let mut source = ScriptedDecisions::new([
            Decision::RejectAll,
            Decision::Accept,
            Decision::Reject,
        ]);
        let actions = resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap();
        assert_eq!(
            summary(&actions),
            vec!["skip a", "skip b", "fix c", "skip d"]
        );
    }

    #[test]
    fn single_reject_keeps_asking() {
        let conflicts = vec![link("a"), link("b")];
        let mut source = ScriptedDecisions::new([Decision::Reject, Decision::Accept]);
        let actions = resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap();
        assert_eq!(summary(&actions), vec!["skip a", "fix b"]);
    }

    // -----------------------------------------------------------------------
    // errors
    // -----------------------------------------------------------------------

    #[test]
    fn decision_source_error_propagates() {
        let conflicts = vec![adopt("a")];
        let mut source = MockDecisionSource::new();
        source
            .expect_decide()
            .returning(|_| Err(anyhow::anyhow!("terminal closed")));
        let err = resolve(&conflicts, &mut Policy::Ask(&mut source)).unwrap_err();
        assert!(err.to_string().contains("terminal closed"));
    }

    #[test]
    fn exhausted_script_is_an_error() {
        let conflicts = vec![link("a")];
        let mut source = ScriptedDecisions::default();
        assert!(resolve(&conflicts, &mut Policy::Ask(&mut source)).is_err());
    }

    #[test]
    fn no_conflicts_asks_nothing() {
        let mut source = MockDecisionSource::new();
        source.expect_decide().never();
        let actions = resolve(&[], &mut Policy::Ask(&mut source)).unwrap();
        assert!(actions.is_empty());
    }
}
