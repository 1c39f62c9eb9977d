//! Embedding text projection
//!
//! Every case is flattened into the same sequence of `label: value` lines so
//! that embeddings of different cases are comparable section by section.
//! Sections are always emitted, even when the case leaves them empty.

use crate::case::Case;

/// Separator placed between items of a list section
pub const LIST_SEPARATOR: &str = " | ";

/// Project a case into the text submitted to the embedding model.
///
/// Section order: id, title, problem_summary, user_symptoms,
/// resolution_steps, root_causes, origin, layer.
pub fn project(case: &Case) -> String {
    let sections = [
        ("id", case.id.clone()),
        ("title", case.title.clone().unwrap_or_default()),
        (
            "problem_summary",
            case.problem_summary.clone().unwrap_or_default(),
        ),
        ("user_symptoms", join(&case.user_symptoms)),
        ("resolution_steps", join(&case.resolution_steps)),
        ("root_causes", join(&case.root_cause_descriptions())),
        ("origin", join(&case.origin)),
        ("layer", join(&case.layer)),
    ];

    sections
        .iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn join(items: &[String]) -> String {
    items.join(LIST_SEPARATOR)
}
