//! Requirement resolution.

use kiln_schema::{DependencySpec, OptionSet};

use crate::recipe::Requirements;

/// Resolves the ordered requirement list for the given option values.
///
/// Base requirements come first in declaration order. Each conditional
/// requirement whose predicate holds is then appended in table order, so
/// adding a conditional dependency never reorders the base set. The result
/// depends only on the inputs: two calls with equal option values return
/// equal lists.
pub fn resolve(requirements: &Requirements, options: &OptionSet) -> Vec<DependencySpec> {
    let conditional = requirements
        .conditional
        .iter()
        .filter(|c| c.applies(options))
        .map(|c| c.require.clone());

    let resolved: Vec<DependencySpec> = requirements
        .base
        .iter()
        .cloned()
        .chain(conditional)
        .collect();

    tracing::debug!(
        "resolved {} requirement(s) ({} conditional)",
        resolved.len(),
        resolved.len() - requirements.base.len()
    );

    resolved
}
