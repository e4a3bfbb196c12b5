//! Human-readable rendering of plans and reports.
//!
//! Everything here is pure string building so output can be snapshot-tested;
//! commands decide which log level each line goes to.
use super::apply::Report;
use super::classify::PlanItem;
use super::plan::Plan;
use super::resolve::Conflict;
use super::scan::EntryKind;

/// One line per actionable item, in scan order.
///
/// Satisfied and ignored entries are summarized by [`plan_summary`] instead.
#[must_use]
pub fn plan_lines(plan: &Plan) -> Vec<String> {
    plan.items()
        .iter()
        .filter(|item| item.is_actionable())
        .map(|item| match item {
            PlanItem::LinkConflict(c) => format!(
                "{:<15} {} (now -> {})",
                item.label(),
                c.relative,
                c.current_target.display()
            ),
            _ => format!("{:<15} {}", item.label(), item.relative()),
        })
        .collect()
}

/// Counts of every item kind, e.g. `"1 folder(s), 2 link(s) to create, ..."`.
#[must_use]
pub fn plan_summary(plan: &Plan) -> String {
    let (mut adopt, mut relink) = (0, 0);
    for item in plan.items() {
        match item {
            PlanItem::AdoptConflict(_) => adopt += 1,
            PlanItem::LinkConflict(_) => relink += 1,
            _ => {}
        }
    }
    format!(
        "{} folder(s) and {} link(s) to create, {} to adopt, {} to relink, {} already linked, {} ignored",
        plan.folders_to_create().len(),
        plan.links_to_create().len(),
        adopt,
        relink,
        plan.satisfied_count(EntryKind::File),
        plan.ignored_count()
    )
}

/// Warning shown before confirmation when accepted adoptions will overwrite
/// source content.
#[must_use]
pub fn adoption_warning(plan: &Plan) -> Option<String> {
    let adoptions = plan.resolved_adoptions();
    if adoptions.is_empty() {
        return None;
    }
    let mut msg = format!(
        "{} destination object(s) will be moved into {}, overwriting the source copy:",
        adoptions.len(),
        plan.source_root().display()
    );
    for c in adoptions {
        msg.push_str("\n  ");
        msg.push_str(c.relative.as_str());
    }
    Some(msg)
}

/// One line per conflict the operator rejected.
#[must_use]
pub fn unresolved_lines(plan: &Plan) -> Vec<String> {
    plan.unresolved()
        .iter()
        .map(|c| {
            let what = match c {
                Conflict::Adopt(_) => "adopt",
                Conflict::Link(_) => "relink",
            };
            format!("left unresolved ({what}): {}", c.relative())
        })
        .collect()
}

/// Final one-line report.
#[must_use]
pub fn report_summary(report: &Report, dry_run: bool) -> String {
    if dry_run {
        format!("would apply: {report}")
    } else if report.is_empty() {
        "nothing to do".to_string()
    } else {
        report.to_string()
    }
}
