use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::api::core::v1::{Node, Pod};

use super::{
    gibibytes, mebibytes, millicores, name, pod::node_name, pod::PodResources, resource_quantity,
    Collector,
};
use crate::{
    error::CollectError,
    quantity::{Quantity, UnitClass},
    source::{self, DataSource, ListScope},
    table::{ColumnWidths, SortKey},
    utils::{age, yes_no, UNKNOWN},
};

const ROLE_LABEL_PREFIX: &str = "node-role.kubernetes.io/";

/// Totals over the pods bound to one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeLoad {
    pub resources: PodResources,
    pub pods: usize,
    pub ephemeral_requests: Quantity,
}

impl Default for NodeLoad {
    fn default() -> Self {
        Self {
            resources: PodResources::default(),
            pods: 0,
            ephemeral_requests: Quantity::zero(UnitClass::Storage),
        }
    }
}

#[derive(Debug, Default)]
pub struct NodeLoads(BTreeMap<String, NodeLoad>);

impl NodeLoads {
    /// Groups every scheduled pod by the node it runs on.
    pub fn load(source: &dyn DataSource) -> Result<Self, CollectError> {
        let scope = ListScope::all().with_field_selector("spec.nodeName!=");
        let pods: Vec<Pod> =
            source::list(source, &scope).map_err(CollectError::unavailable("pod"))?;

        let mut loads: BTreeMap<String, NodeLoad> = BTreeMap::new();
        for pod in &pods {
            let Some(node) = node_name(pod) else { continue };
            let entry = loads.entry(node.to_string()).or_default();
            entry.resources = entry.resources.add(PodResources::of(pod)?)?;
            entry.pods += 1;
            for container in pod.spec.iter().flat_map(|s| &s.containers) {
                let requests = container.resources.as_ref().and_then(|r| r.requests.as_ref());
                entry.ephemeral_requests = entry.ephemeral_requests.add(resource_quantity(
                    requests,
                    "ephemeral-storage",
                    UnitClass::Storage,
                ))?;
            }
        }
        Ok(Self(loads))
    }

    pub fn get(&self, node: &str) -> NodeLoad {
        self.0.get(node).copied().unwrap_or_default()
    }
}

fn ready_status(node: &Node) -> Option<bool> {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|conds| conds.iter().find(|c| c.type_ == "Ready"))
        .map(|c| c.status == "True")
}

fn allocatable(node: &Node, key: &str, class: UnitClass) -> Quantity {
    resource_quantity(node.status.as_ref().and_then(|s| s.allocatable.as_ref()), key, class)
}

fn capacity(node: &Node, key: &str, class: UnitClass) -> Quantity {
    resource_quantity(node.status.as_ref().and_then(|s| s.capacity.as_ref()), key, class)
}

/// Node Resource Details: `name [Ready]` with allocatable and scheduled load.
#[derive(Debug, Clone, Copy)]
pub struct NodeResourceCollector;

impl Collector for NodeResourceCollector {
    type Resource = Node;
    type Context = NodeLoads;
    const KIND: &'static str = "node";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "Node Name[Status]",
            "CPU Allo(mCPU)",
            "Memory Allo(MiB)",
            "CPU Lim(mCPU)",
            "CPU Req(mCPU)",
            "Memory Lim(MiB)",
            "Memory Req(MiB)",
        ]
    }

    fn widths(&self) -> ColumnWidths {
        ColumnWidths::Fixed(vec![78.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0])
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<NodeLoads, CollectError> {
        NodeLoads::load(source)
    }

    fn build_row(
        &self,
        node: &Node,
        loads: &NodeLoads,
        _: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let node_name = name(&node.metadata);
        let status = match ready_status(node) {
            Some(true) => "Ready",
            Some(false) => "NotReady",
            None => UNKNOWN,
        };
        let load = loads.get(&node_name).resources;

        Ok(vec![
            format!("{node_name} [{status}]"),
            millicores(allocatable(node, "cpu", UnitClass::Cpu)),
            mebibytes(allocatable(node, "memory", UnitClass::Memory)),
            millicores(load.cpu_limits),
            millicores(load.cpu_requests),
            mebibytes(load.memory_limits),
            mebibytes(load.memory_requests),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodeDetailCollector;

impl Collector for NodeDetailCollector {
    type Resource = Node;
    type Context = NodeLoads;
    const KIND: &'static str = "node";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "NODE NAME",
            "STATUS",
            "SCHEDULABLE",
            "ROLES",
            "CPU CAPACITY",
            "CPU REQUESTS",
            "CPU LIMITS",
            "MEMORY CAPACITY",
            "MEMORY REQUESTS",
            "MEMORY LIMITS",
            "DISK CAPACITY",
            "DISK USAGE",
            "NODE AGE",
            "POD COUNT",
            "CONDITIONS",
            "TAINTS",
        ]
    }

    fn sort_key(&self) -> SortKey {
        SortKey::by_name()
    }

    fn context(&self, source: &dyn DataSource) -> Result<NodeLoads, CollectError> {
        NodeLoads::load(source)
    }

    fn build_row(
        &self,
        node: &Node,
        loads: &NodeLoads,
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let node_name = name(&node.metadata);
        let status = match ready_status(node) {
            Some(true) => "Healthy",
            Some(false) => "Unhealthy",
            None => UNKNOWN,
        };
        let unschedulable = node
            .spec
            .as_ref()
            .and_then(|s| s.unschedulable)
            .unwrap_or(false);
        let load = loads.get(&node_name);

        let conditions = node
            .status
            .as_ref()
            .and_then(|s| s.conditions.as_ref())
            .map(|conds| {
                conds
                    .iter()
                    .map(|c| format!("{}={}", c.type_, c.status))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let taints = node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .map(|t| {
                        format!(
                            "{}={}:{}",
                            t.key,
                            t.value.as_deref().unwrap_or_default(),
                            t.effect
                        )
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        Ok(vec![
            node_name,
            status.to_string(),
            yes_no(!unschedulable),
            roles(node),
            format!("{}m", millicores(capacity(node, "cpu", UnitClass::Cpu))),
            format!("{}m", millicores(load.resources.cpu_requests)),
            format!("{}m", millicores(load.resources.cpu_limits)),
            gibibytes(capacity(node, "memory", UnitClass::Memory)),
            gibibytes(load.resources.memory_requests),
            gibibytes(load.resources.memory_limits),
            gibibytes(capacity(node, "ephemeral-storage", UnitClass::Storage)),
            gibibytes(load.ephemeral_requests),
            age(node.metadata.creation_timestamp.as_ref(), now),
            load.pods.to_string(),
            conditions,
            taints,
        ])
    }
}

/// `node-role.kubernetes.io/<role>` label suffixes; unlabelled nodes are workers.
fn roles(node: &Node) -> String {
    let roles: Vec<&str> = node
        .metadata
        .labels
        .iter()
        .flatten()
        .filter_map(|(k, _)| k.strip_prefix(ROLE_LABEL_PREFIX))
        .filter(|role| !role.is_empty())
        .collect();
    if roles.is_empty() {
        "worker".to_string()
    } else {
        roles.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{run, testing};
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::json;

    fn source() -> InMemorySource {
        let mut master = testing::node("cp-1", "2", "4Gi");
        master["metadata"]["labels"] = json!({"node-role.kubernetes.io/control-plane": ""});
        master["spec"] = json!({
            "unschedulable": true,
            "taints": [{"key": "node-role.kubernetes.io/control-plane", "effect": "NoSchedule"}],
        });
        let mut lost = testing::node("lost", "1", "1Gi");
        lost["status"]["conditions"] = json!([]);

        InMemorySource::new("t")
            .with_objects(
                "Node",
                vec![testing::node("worker-1", "4", "8Gi"), master, lost],
            )
            .with_objects(
                "Pod",
                vec![
                    testing::pod("a", "prod", Some("worker-1"), Some("100m")),
                    testing::pod("b", "prod", Some("worker-1"), Some("250m")),
                    testing::pod("c", "dev", None, Some("1")),
                ],
            )
    }

    #[test]
    fn test_node_resource_rows() {
        let table = run(&NodeResourceCollector, &source(), testing::now()).unwrap();
        let names: Vec<_> = table.rows().iter().map(|r| r[0].as_str()).collect();
        assert_eq!(
            names,
            vec!["cp-1 [Ready]", "lost [Unknown]", "worker-1 [Ready]"]
        );

        let worker = &table.rows()[2];
        assert_eq!(worker[1], "4000");
        assert_eq!(worker[2], "8192");
        assert_eq!(worker[4], "350");
        assert_eq!(worker[5], "256");
        assert_eq!(worker[6], "128");
    }

    #[test]
    fn test_unscheduled_pods_are_not_attributed() {
        let loads = NodeLoads::load(&source()).unwrap();
        assert_eq!(loads.get("worker-1").pods, 2);
        assert_eq!(loads.get("cp-1").pods, 0);
    }

    #[test]
    fn test_node_detail_row() {
        let table = run(&NodeDetailCollector, &source(), testing::now()).unwrap();
        let cp = &table.rows()[0];
        assert_eq!(cp[0], "cp-1");
        assert_eq!(cp[1], "Healthy");
        assert_eq!(cp[2], "No");
        assert_eq!(cp[3], "control-plane");
        assert_eq!(cp[4], "2000m");
        assert_eq!(cp[7], "4.00Gi");
        assert_eq!(cp[10], "100.00Gi");
        assert_eq!(cp[12], "72h0m0s");
        assert_eq!(cp[15], "node-role.kubernetes.io/control-plane=:NoSchedule");

        let worker = &table.rows()[2];
        assert_eq!(worker[2], "Yes");
        assert_eq!(worker[3], "worker");
        assert_eq!(worker[13], "2");
        assert_eq!(worker[14], "Ready=True");
    }
}
