//! Status transition resolution across the three workflow shapes trackers
//! expose: an explicit transition graph keyed by the issue's current status,
//! a first-step plus previous/next step table, or a flat status enumeration
//! with no edges at all.

use std::collections::HashMap;

use crate::model::StatusOption;

/// One edge reachable from the current status of a specific issue.
#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub transition_id: String,
    pub to_id: String,
    pub to_label: String,
}

/// One previous -> next row of a step-table workflow.
#[derive(Debug, Clone)]
pub struct StepEdge {
    pub previous: String,
    pub next: String,
}

/// Tracker workflow shape, rebuilt per resolve call. Trackers key the graph
/// form by the current status of a specific issue, so nothing here is
/// cacheable across issues.
#[derive(Debug, Clone)]
pub enum TransitionModel {
    Graph { edges: Vec<GraphEdge> },
    Steps {
        first: Option<StatusOption>,
        steps: Vec<StepEdge>,
        labels: HashMap<String, String>,
    },
    Flat { statuses: Vec<StatusOption> },
}

/// What to do with the requested status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Apply `handle` on the wire: a transition id for graph workflows, the
    /// status value itself for the other shapes.
    Apply { handle: String },
    /// No matching edge; the record is saved without a status change and the
    /// previous status is reported back unchanged.
    Unchanged,
}

/// Resolves a requested target status against the workflow model. A
/// requested status with no enumerated equivalent is passed through opaque
/// rather than rejected; status sets are configurable per project.
pub fn resolve(model: &TransitionModel, requested: &str) -> Resolution {
    match model {
        TransitionModel::Graph { edges } => edges
            .iter()
            .find(|edge| edge.to_id == requested)
            .map(|edge| Resolution::Apply {
                handle: edge.transition_id.clone(),
            })
            .unwrap_or(Resolution::Unchanged),
        TransitionModel::Steps { .. } | TransitionModel::Flat { .. } => Resolution::Apply {
            handle: requested.to_string(),
        },
    }
}

/// Statuses selectable from `current` (or for a brand-new record when
/// `current` is `None`).
pub fn status_options(model: &TransitionModel, current: Option<&str>) -> Vec<StatusOption> {
    match model {
        TransitionModel::Graph { edges } => edges
            .iter()
            .map(|edge| StatusOption::new(&edge.to_id, &edge.to_label))
            .collect(),
        TransitionModel::Steps { first, steps, labels } => {
            let label = |key: &str| labels.get(key).cloned().unwrap_or_else(|| key.to_string());
            match current {
                None => first
                    .clone()
                    .map(|option| vec![option])
                    .unwrap_or_else(|| {
                        let mut seen = Vec::new();
                        for step in steps {
                            if !seen.iter().any(|o: &StatusOption| o.id == step.previous) {
                                seen.push(StatusOption::new(&step.previous, label(&step.previous)));
                            }
                        }
                        seen
                    }),
                Some(current) => {
                    let mut options = Vec::new();
                    for step in steps.iter().filter(|step| step.previous == current) {
                        if !options.iter().any(|o: &StatusOption| o.id == step.next) {
                            options.push(StatusOption::new(&step.next, label(&step.next)));
                        }
                    }
                    options
                }
            }
        }
        TransitionModel::Flat { statuses } => statuses.clone(),
    }
}

/// Companion fields a flat-enum tracker requires alongside a terminal
/// status: a resolution date for `resolved`, a close date plus a default
/// resolution for `closed`. Supplied values win over the defaults.
pub fn terminal_companions(
    requested: &str,
    now: &str,
    has_resolution: bool,
) -> Vec<(String, String)> {
    match requested {
        "resolved" => vec![("resolvedDate".to_string(), now.to_string())],
        "closed" => {
            let mut fields = vec![("closedDate".to_string(), now.to_string())];
            if !has_resolution {
                fields.push(("resolution".to_string(), "fixed".to_string()));
            }
            fields
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> TransitionModel {
        TransitionModel::Graph {
            edges: vec![
                GraphEdge {
                    transition_id: "11".into(),
                    to_id: "10002".into(),
                    to_label: "In Progress".into(),
                },
                GraphEdge {
                    transition_id: "21".into(),
                    to_id: "10003".into(),
                    to_label: "Done".into(),
                },
            ],
        }
    }

    #[test]
    fn graph_resolves_matching_edge_to_transition_id() {
        assert_eq!(
            resolve(&graph(), "10003"),
            Resolution::Apply { handle: "21".into() }
        );
    }

    #[test]
    fn graph_without_matching_edge_is_silently_unchanged() {
        assert_eq!(resolve(&graph(), "99999"), Resolution::Unchanged);
    }

    #[test]
    fn step_table_offers_first_step_for_new_records() {
        let model = TransitionModel::Steps {
            first: Some(StatusOption::new("new", "New")),
            steps: vec![
                StepEdge { previous: "new".into(), next: "in_progress".into() },
                StepEdge { previous: "in_progress".into(), next: "resolved".into() },
                StepEdge { previous: "in_progress".into(), next: "rejected".into() },
            ],
            labels: HashMap::from([("in_progress".to_string(), "In Progress".to_string())]),
        };
        let fresh = status_options(&model, None);
        assert_eq!(fresh, vec![StatusOption::new("new", "New")]);

        let next = status_options(&model, Some("in_progress"));
        let ids: Vec<&str> = next.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["resolved", "rejected"]);
    }

    #[test]
    fn unknown_status_passes_through_on_non_graph_trackers() {
        let model = TransitionModel::Flat { statuses: Vec::new() };
        assert_eq!(
            resolve(&model, "wontfix"),
            Resolution::Apply { handle: "wontfix".into() }
        );
    }

    #[test]
    fn closed_fills_close_date_and_default_resolution() {
        let fields = terminal_companions("closed", "2026-08-25 10:00:00", false);
        assert!(fields.contains(&("closedDate".to_string(), "2026-08-25 10:00:00".to_string())));
        assert!(fields.contains(&("resolution".to_string(), "fixed".to_string())));

        let supplied = terminal_companions("closed", "2026-08-25 10:00:00", true);
        assert!(!supplied.iter().any(|(k, _)| k == "resolution"));
        assert!(terminal_companions("active", "x", false).is_empty());
    }
}
