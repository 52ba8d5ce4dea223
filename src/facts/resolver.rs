use std::collections::BTreeSet;

use super::DEFAULT_SUBSET;

/// Resolved set of subsets to execute for one gather
pub type RunSet = BTreeSet<String>;

const ALL: &str = "all";
const NEGATION: char = '!';

/// Typed error for an unknown subset name, so the API layer can map it
/// to a 400 without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSubsetError {
    pub subset: String,
    pub valid: Vec<String>,
}

impl std::fmt::Display for InvalidSubsetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Subset must be one of [{}], got {}",
            self.valid.join(", "),
            self.subset
        )
    }
}

impl std::error::Error for InvalidSubsetError {}

/// Resolve gather_subset tokens against the valid subset names.
///
/// Tokens are `name`, `all`, or either prefixed with `!`. An empty include
/// set means every subset is a candidate. Exclusions win over inclusions,
/// and `default` is always part of the result.
pub fn resolve_subsets<S: AsRef<str>>(
    tokens: &[S],
    valid: &[&str],
) -> Result<RunSet, InvalidSubsetError> {
    let mut include: BTreeSet<&str> = BTreeSet::new();
    let mut exclude: BTreeSet<&str> = BTreeSet::new();

    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }

        if token == ALL {
            include.extend(valid.iter().copied());
            continue;
        }

        let (name, negated) = match token.strip_prefix(NEGATION) {
            Some(rest) => (rest.trim(), true),
            None => (token, false),
        };

        if negated && name == ALL {
            exclude.extend(valid.iter().copied());
            continue;
        }

        let Some(known) = valid.iter().copied().find(|v| *v == name) else {
            return Err(InvalidSubsetError {
                subset: name.to_string(),
                valid: valid.iter().map(|v| v.to_string()).collect(),
            });
        };

        if negated {
            exclude.insert(known);
        } else {
            include.insert(known);
        }
    }

    if include.is_empty() {
        include.extend(valid.iter().copied());
    }

    let mut run_set: RunSet = include
        .difference(&exclude)
        .map(|name| name.to_string())
        .collect();
    run_set.insert(DEFAULT_SUBSET.to_string());

    Ok(run_set)
}
