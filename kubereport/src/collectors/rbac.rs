use std::collections::BTreeSet;

use jiff::Timestamp;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding};

use super::{name, namespace, Collector};
use crate::{
    error::CollectError,
    table::SortKey,
    utils::{age, bracketed, join_map},
};

/// The core API group is the empty string.
fn group_label(group: &str) -> &str {
    if group.is_empty() {
        "core"
    } else {
        group
    }
}

fn rule_groups(rule: &PolicyRule) -> Vec<&str> {
    rule.api_groups
        .iter()
        .flatten()
        .map(|g| group_label(g))
        .collect()
}

fn rule_resources(rule: &PolicyRule) -> Vec<&str> {
    rule.resources.iter().flatten().map(String::as_str).collect()
}

/// Distinct values across every rule, in sorted order.
fn union<'a>(rules: &'a [PolicyRule], pick: impl Fn(&'a PolicyRule) -> Vec<&'a str>) -> String {
    let set: BTreeSet<&str> = rules.iter().flat_map(pick).collect();
    bracketed(set)
}

#[derive(Debug, Clone, Copy)]
pub struct RoleCollector;

impl Collector for RoleCollector {
    type Resource = Role;
    type Context = ();
    const KIND: &'static str = "role";

    fn columns(&self) -> &'static [&'static str] {
        &["ROLE NAME", "NAMESPACE", "RULES", "AGE", "ANNOTATIONS"]
    }

    fn build_row(&self, role: &Role, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let rules = role
            .rules
            .iter()
            .flatten()
            .map(|r| format!("{} on {}", bracketed(&r.verbs), bracketed(rule_resources(r))))
            .collect::<Vec<_>>()
            .join("; ");

        Ok(vec![
            name(&role.metadata),
            namespace(&role.metadata),
            rules,
            age(role.metadata.creation_timestamp.as_ref(), now),
            join_map(role.metadata.annotations.as_ref()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoleBindingCollector;

impl Collector for RoleBindingCollector {
    type Resource = RoleBinding;
    type Context = ();
    const KIND: &'static str = "rolebinding";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "ROLEBINDING NAME",
            "NAMESPACE",
            "ROLE NAME",
            "SUBJECTS",
            "KIND",
            "API GROUP",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn build_row(
        &self,
        binding: &RoleBinding,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let subjects = binding.subjects.iter().flatten().map(|s| s.name.as_str());

        Ok(vec![
            name(&binding.metadata),
            namespace(&binding.metadata),
            binding.role_ref.name.clone(),
            bracketed(subjects),
            binding.role_ref.kind.clone(),
            binding.role_ref.api_group.clone(),
            age(binding.metadata.creation_timestamp.as_ref(), now),
            join_map(binding.metadata.annotations.as_ref()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterRoleCollector;

impl Collector for ClusterRoleCollector {
    type Resource = ClusterRole;
    type Context = ();
    const KIND: &'static str = "clusterrole";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "CLUSTERROLE NAME",
            "RULES",
            "API GROUPS",
            "RESOURCES",
            "VERBS",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn build_row(
        &self,
        role: &ClusterRole,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let rules = role.rules.as_deref().unwrap_or_default();
        let described = rules.iter().map(|r| {
            format!(
                "APIGroups: {}, Resources: {}, Verbs: {}",
                bracketed(rule_groups(r)),
                bracketed(rule_resources(r)),
                bracketed(&r.verbs),
            )
        });

        Ok(vec![
            name(&role.metadata),
            format!("[{}]", described.collect::<Vec<_>>().join("; ")),
            union(rules, rule_groups),
            union(rules, rule_resources),
            union(rules, |r| r.verbs.iter().map(String::as_str).collect()),
            age(role.metadata.creation_timestamp.as_ref(), now),
            join_map(role.metadata.annotations.as_ref()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterRoleBindingCollector;

impl Collector for ClusterRoleBindingCollector {
    type Resource = ClusterRoleBinding;
    type Context = ();
    const KIND: &'static str = "clusterrolebinding";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "CLUSTERROLEBINDING NAME",
            "CLUSTERROLE NAME",
            "SUBJECTS",
            "ROLEREF API GROUP",
            "ROLEREF KIND",
            "ROLEREF NAME",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn build_row(
        &self,
        binding: &ClusterRoleBinding,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let subjects = binding
            .subjects
            .iter()
            .flatten()
            .map(|s| format!("{}/{}", s.kind, s.name));

        Ok(vec![
            name(&binding.metadata),
            binding.role_ref.name.clone(),
            bracketed(subjects),
            binding.role_ref.api_group.clone(),
            binding.role_ref.kind.clone(),
            binding.role_ref.name.clone(),
            age(binding.metadata.creation_timestamp.as_ref(), now),
            join_map(binding.metadata.annotations.as_ref()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{run, testing};
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_role_rules() {
        let source = InMemorySource::new("t").with_objects(
            "Role",
            vec![json!({
                "metadata": testing::meta("reader", Some("prod")),
                "rules": [
                    {"apiGroups": [""], "resources": ["pods", "pods/log"], "verbs": ["get", "list"]},
                    {"apiGroups": ["apps"], "resources": ["deployments"], "verbs": ["watch"]},
                ],
            })],
        );
        let table = run(&RoleCollector, &source, testing::now()).unwrap();
        assert_eq!(
            table.rows()[0][2],
            "[get, list] on [pods, pods/log]; [watch] on [deployments]"
        );
    }

    #[test]
    fn test_role_binding_subjects() {
        let source = InMemorySource::new("t").with_objects(
            "RoleBinding",
            vec![json!({
                "metadata": testing::meta("read-pods", Some("prod")),
                "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": "reader"},
                "subjects": [
                    {"kind": "User", "name": "jane"},
                    {"kind": "ServiceAccount", "name": "ci", "namespace": "prod"},
                ],
            })],
        );
        let table = run(&RoleBindingCollector, &source, testing::now()).unwrap();
        assert_eq!(
            table.rows()[0],
            vec![
                "read-pods",
                "prod",
                "reader",
                "[jane, ci]",
                "Role",
                "rbac.authorization.k8s.io",
                "72h0m0s",
                "",
            ]
        );
    }

    #[test]
    fn test_cluster_role_unions_rules() {
        let source = InMemorySource::new("t").with_objects(
            "ClusterRole",
            vec![
                json!({
                    "metadata": testing::meta("view", None),
                    "rules": [
                        {"apiGroups": [""], "resources": ["pods"], "verbs": ["list", "get"]},
                        {"apiGroups": ["apps"], "resources": ["deployments", "pods"], "verbs": ["get"]},
                    ],
                }),
                json!({"metadata": testing::meta("aggregate", None)}),
            ],
        );
        let table = run(&ClusterRoleCollector, &source, testing::now()).unwrap();

        assert_eq!(table.rows()[0][0], "aggregate");
        assert_eq!(table.rows()[0][1], "[]");
        assert_eq!(table.rows()[0][2], "[]");

        let view = &table.rows()[1];
        assert_eq!(
            view[1],
            "[APIGroups: [core], Resources: [pods], Verbs: [list, get]; \
             APIGroups: [apps], Resources: [deployments, pods], Verbs: [get]]"
        );
        assert_eq!(view[2], "[apps, core]");
        assert_eq!(view[3], "[deployments, pods]");
        assert_eq!(view[4], "[get, list]");
    }

    #[test]
    fn test_cluster_role_binding_subjects() {
        let source = InMemorySource::new("t").with_objects(
            "ClusterRoleBinding",
            vec![json!({
                "metadata": testing::meta("admins", None),
                "roleRef": {"apiGroup": "rbac.authorization.k8s.io", "kind": "ClusterRole", "name": "cluster-admin"},
                "subjects": [{"kind": "Group", "name": "system:masters"}],
            })],
        );
        let table = run(&ClusterRoleBindingCollector, &source, testing::now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row[1], "cluster-admin");
        assert_eq!(row[2], "[Group/system:masters]");
        assert_eq!(row[4], "ClusterRole");
    }
}
