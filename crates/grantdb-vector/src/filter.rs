//! Translation of [`DocumentFilters`] into LanceDB SQL predicates.
//!
//! One clause per populated filter category, joined with AND; membership
//! within a category becomes an IN list (OR semantics). Returns `None` when
//! no category is populated so callers can skip `only_if` entirely.

use std::collections::BTreeSet;

use grantdb_core::types::DocumentFilters;

/// SQL string literal with single quotes doubled.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn in_list(column: &str, values: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{column} IN ({})", quoted.join(", "))
}

pub fn filter_predicate(filters: &DocumentFilters) -> Option<String> {
    let mut clauses: Vec<String> = Vec::new();

    if let Some(doc_types) = &filters.doc_types {
        clauses.push(in_list("doc_type", doc_types));
    }
    if let Some(years) = &filters.years {
        let list: Vec<String> = years.iter().map(ToString::to_string).collect();
        clauses.push(format!("year IN ({})", list.join(", ")));
    }
    if let Some((start, end)) = filters.date_range {
        clauses.push(format!("year >= {start}"));
        clauses.push(format!("year <= {end}"));
    }
    if let Some(programs) = &filters.programs {
        // programs is stored as "|a|b|"; any-overlap becomes an OR of LIKEs.
        let likes: Vec<String> = programs
            .iter()
            .map(|p| format!("programs LIKE {}", quote(&format!("%|{p}|%"))))
            .collect();
        clauses.push(format!("({})", likes.join(" OR ")));
    }
    if let Some(outcomes) = &filters.outcomes {
        clauses.push(in_list("outcome", outcomes));
    }
    if let Some(excluded) = &filters.exclude_docs {
        let quoted: Vec<String> = excluded.iter().map(|v| quote(v)).collect();
        clauses.push(format!("doc_id NOT IN ({})", quoted.join(", ")));
    }

    if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" AND "))
    }
}
