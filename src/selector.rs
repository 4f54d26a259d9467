// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector matching.
//!
//! Evaluates a `metav1.LabelSelector` (`matchLabels` plus `matchExpressions`)
//! against a label map locally, the way the API server would for a list call.
//! Used to decide whether an `AzureClusterIdentity` selects a namespace.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Whether a selector has no requirements at all.
///
/// An empty selector in `allowedNamespaces` selects nothing.
#[must_use]
pub fn is_empty(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().is_none_or(BTreeMap::is_empty)
        && selector.match_expressions.as_ref().is_none_or(Vec::is_empty)
}

/// Whether `labels` satisfy every requirement of `selector`.
///
/// Requirements with an unknown operator, or with values that contradict
/// their operator, never match.
#[must_use]
pub fn matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    let labels_ok = selector
        .match_labels
        .as_ref()
        .is_none_or(|wanted| wanted.iter().all(|(k, v)| labels.get(k) == Some(v)));

    labels_ok
        && selector
            .match_expressions
            .as_ref()
            .is_none_or(|reqs| reqs.iter().all(|req| requirement_matches(req, labels)))
}

fn requirement_matches(req: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let values = req.values.as_deref().unwrap_or_default();
    let value = labels.get(&req.key);

    match req.operator.as_str() {
        "In" => !values.is_empty() && value.is_some_and(|v| values.contains(v)),
        "NotIn" => !values.is_empty() && value.is_none_or(|v| !values.contains(v)),
        "Exists" => values.is_empty() && value.is_some(),
        "DoesNotExist" => values.is_empty() && value.is_none(),
        _ => false,
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
