use jiff::Timestamp;
use k8s_openapi::api::{
    apps::v1::{DaemonSet, Deployment, ReplicaSet, StatefulSet},
    autoscaling::v2::{HorizontalPodAutoscaler, HPAScalingRules},
};

use super::{name, namespace, Collector};
use crate::{
    error::CollectError,
    utils::{age, join_map, opt, or_sentinel, timestamp_or, true_conditions, NOT_AVAILABLE},
};

const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

/// Status counters are required in some API versions and optional in others;
/// absent counts as zero.
fn count(value: impl Into<Option<i32>>) -> String {
    opt::<i32>(value).unwrap_or(0).to_string()
}

/// Unset replica counts take the API server default of one.
fn desired(value: Option<i32>) -> String {
    value.unwrap_or(1).to_string()
}

fn all_types<'a>(types: impl Iterator<Item = &'a str>) -> String {
    types.collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy)]
pub struct DeploymentCollector;

impl Collector for DeploymentCollector {
    type Resource = Deployment;
    type Context = ();
    const KIND: &'static str = "deployment";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "DEPLOYMENT NAME",
            "NAMESPACE",
            "REPLICAS",
            "AVAILABLE REPLICAS",
            "PODS READY",
            "PODS DESIRED",
            "STRATEGY TYPE",
            "REVISION",
            "AGE",
            "CONDITIONS",
        ]
    }

    fn build_row(&self, d: &Deployment, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = d.spec.as_ref();
        let status = d.status.as_ref();
        let revision = d
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(REVISION_ANNOTATION).cloned())
            .or_else(|| status.and_then(|s| s.observed_generation).map(|g| g.to_string()));

        Ok(vec![
            name(&d.metadata),
            namespace(&d.metadata),
            desired(spec.and_then(|s| s.replicas)),
            count(status.and_then(|s| s.available_replicas)),
            count(status.and_then(|s| s.ready_replicas)),
            count(status.and_then(|s| s.replicas)),
            or_sentinel(
                spec.and_then(|s| s.strategy.as_ref()).and_then(|s| s.type_.clone()),
                NOT_AVAILABLE,
            ),
            or_sentinel(revision, NOT_AVAILABLE),
            age(d.metadata.creation_timestamp.as_ref(), now),
            all_types(
                status
                    .and_then(|s| s.conditions.as_ref())
                    .into_iter()
                    .flatten()
                    .map(|c| c.type_.as_str()),
            ),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReplicaSetCollector;

impl Collector for ReplicaSetCollector {
    type Resource = ReplicaSet;
    type Context = ();
    const KIND: &'static str = "replicaset";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "REPLICASET NAME",
            "NAMESPACE",
            "DESIRED REPLICAS",
            "CURRENT REPLICAS",
            "PODS READY",
            "PODS DESIRED",
            "AGE",
            "CONDITIONS",
        ]
    }

    fn build_row(&self, rs: &ReplicaSet, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let status = rs.status.as_ref();
        let replicas = status.map(|s| count(s.replicas)).unwrap_or_else(|| "0".to_string());
        let conditions = true_conditions(
            status
                .and_then(|s| s.conditions.as_ref())
                .into_iter()
                .flatten()
                .map(|c| (c.type_.as_str(), c.status.as_str())),
        );

        Ok(vec![
            name(&rs.metadata),
            namespace(&rs.metadata),
            desired(rs.spec.as_ref().and_then(|s| s.replicas)),
            replicas.clone(),
            count(status.and_then(|s| s.ready_replicas)),
            replicas,
            age(rs.metadata.creation_timestamp.as_ref(), now),
            or_sentinel(Some(conditions), "No conditions met"),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatefulSetCollector;

impl Collector for StatefulSetCollector {
    type Resource = StatefulSet;
    type Context = ();
    const KIND: &'static str = "statefulset";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "STATEFULSET NAME",
            "NAMESPACE",
            "DESIRED REPLICAS",
            "CURRENT REPLICAS",
            "PODS READY",
            "PODS DESIRED",
            "SERVICE NAME",
            "AGE",
            "CONDITIONS",
        ]
    }

    fn build_row(&self, ss: &StatefulSet, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = ss.spec.as_ref();
        let status = ss.status.as_ref();
        let replicas = status.map(|s| count(s.replicas)).unwrap_or_else(|| "0".to_string());
        let service = spec.and_then(|s| opt::<String>(s.service_name.clone()));

        Ok(vec![
            name(&ss.metadata),
            namespace(&ss.metadata),
            desired(spec.and_then(|s| s.replicas)),
            replicas.clone(),
            count(status.and_then(|s| s.ready_replicas)),
            replicas,
            or_sentinel(service, NOT_AVAILABLE),
            age(ss.metadata.creation_timestamp.as_ref(), now),
            true_conditions(
                status
                    .and_then(|s| s.conditions.as_ref())
                    .into_iter()
                    .flatten()
                    .map(|c| (c.type_.as_str(), c.status.as_str())),
            ),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DaemonSetCollector;

impl Collector for DaemonSetCollector {
    type Resource = DaemonSet;
    type Context = ();
    const KIND: &'static str = "daemonset";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "DAEMONSET NAME",
            "NAMESPACE",
            "DESIRED PODS",
            "CURRENT PODS",
            "PODS READY",
            "PODS DESIRED",
            "NODE SELECTOR",
            "AGE",
            "CONDITIONS",
        ]
    }

    fn build_row(&self, ds: &DaemonSet, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let status = ds.status.as_ref();
        let desired_pods = status
            .map(|s| count(s.desired_number_scheduled))
            .unwrap_or_else(|| "0".to_string());
        let node_selector = ds
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|s| s.node_selector.as_ref());

        Ok(vec![
            name(&ds.metadata),
            namespace(&ds.metadata),
            desired_pods.clone(),
            status
                .map(|s| count(s.current_number_scheduled))
                .unwrap_or_else(|| "0".to_string()),
            status
                .map(|s| count(s.number_ready))
                .unwrap_or_else(|| "0".to_string()),
            desired_pods,
            join_map(node_selector),
            age(ds.metadata.creation_timestamp.as_ref(), now),
            all_types(
                status
                    .and_then(|s| s.conditions.as_ref())
                    .into_iter()
                    .flatten()
                    .map(|c| c.type_.as_str()),
            ),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HorizontalPodAutoscalerCollector;

impl Collector for HorizontalPodAutoscalerCollector {
    type Resource = HorizontalPodAutoscaler;
    type Context = ();
    const KIND: &'static str = "horizontalpodautoscaler";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "HPA NAME",
            "NAMESPACE",
            "SCALE TARGET REF",
            "MIN REPLICAS",
            "MAX REPLICAS",
            "TARGET CPU UTILIZATION",
            "CURRENT REPLICAS",
            "AGE",
            "CONDITIONS",
            "METRICS",
            "CURRENT CPU UTILIZATION",
            "LAST SCALE TIME",
            "BEHAVIOR",
        ]
    }

    fn build_row(
        &self,
        hpa: &HorizontalPodAutoscaler,
        _: &(),
        now: Timestamp,
    ) -> Result<Vec<String>, CollectError> {
        let spec = hpa.spec.as_ref();
        let status = hpa.status.as_ref();

        let target = spec
            .map(|s| format!("{}/{}", s.scale_target_ref.kind, s.scale_target_ref.name))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        let target_cpu = spec
            .and_then(|s| s.metrics.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|m| m.resource.as_ref())
            .find(|r| r.name == "cpu")
            .and_then(|r| r.target.average_utilization);
        let current_cpu = status
            .and_then(|s| s.current_metrics.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|m| m.resource.as_ref())
            .find(|r| r.name == "cpu")
            .and_then(|r| r.current.average_utilization);
        let metrics: Vec<String> = spec
            .and_then(|s| s.metrics.as_ref())
            .into_iter()
            .flatten()
            .map(|m| match &m.resource {
                Some(r) => format!("{}/{}", m.type_, r.name),
                None => m.type_.clone(),
            })
            .collect();
        let behavior = spec.and_then(|s| s.behavior.as_ref()).map(|b| {
            format!(
                "ScaleUp: {}; ScaleDown: {}",
                scaling_rules(b.scale_up.as_ref()),
                scaling_rules(b.scale_down.as_ref())
            )
        });

        Ok(vec![
            name(&hpa.metadata),
            namespace(&hpa.metadata),
            target,
            spec.and_then(|s| s.min_replicas).unwrap_or(1).to_string(),
            spec.map(|s| s.max_replicas.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            percent_or_na(target_cpu),
            count(status.and_then(|s| opt::<i32>(s.current_replicas))),
            age(hpa.metadata.creation_timestamp.as_ref(), now),
            true_conditions(
                status
                    .and_then(|s| s.conditions.as_ref())
                    .into_iter()
                    .flatten()
                    .map(|c| (c.type_.as_str(), c.status.as_str())),
            ),
            or_sentinel(Some(metrics.join(", ")), NOT_AVAILABLE),
            percent_or_na(current_cpu),
            timestamp_or(status.and_then(|s| s.last_scale_time.as_ref()), NOT_AVAILABLE),
            or_sentinel(behavior, NOT_AVAILABLE),
        ])
    }
}

fn percent_or_na(value: Option<i32>) -> String {
    value
        .map(|v| format!("{v}%"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn scaling_rules(rules: Option<&HPAScalingRules>) -> String {
    let Some(rules) = rules else {
        return "default".to_string();
    };
    let window = rules
        .stabilization_window_seconds
        .map(|s| format!("{s}s"))
        .unwrap_or_else(|| "default".to_string());
    let policy = rules.select_policy.as_deref().unwrap_or("Max");
    format!("{policy} policy, {window} window")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{run, testing};
    use crate::source::InMemorySource;
    use k8s_openapi::serde_json::json;

    #[test]
    fn test_deployment_row() {
        let source = InMemorySource::new("t").with_objects(
            "Deployment",
            vec![
                json!({
                    "metadata": testing::meta("web", Some("prod")),
                    "spec": {
                        "replicas": 3,
                        "selector": {"matchLabels": {"app": "web"}},
                        "strategy": {"type": "RollingUpdate"},
                        "template": {},
                    },
                    "status": {
                        "replicas": 3,
                        "availableReplicas": 2,
                        "readyReplicas": 2,
                        "observedGeneration": 7,
                        "conditions": [
                            {"type": "Available", "status": "True"},
                            {"type": "Progressing", "status": "False"},
                        ],
                    },
                }),
                json!({
                    "metadata": testing::meta("web", Some("dev")),
                    "spec": {"selector": {}, "template": {}},
                }),
            ],
        );
        let table = run(&DeploymentCollector, &source, testing::now()).unwrap();
        assert_eq!(
            table.rows()[1],
            vec![
                "web", "prod", "3", "2", "2", "3", "RollingUpdate", "7", "72h0m0s",
                "Available, Progressing"
            ]
        );
        assert_eq!(
            table.rows()[0],
            vec!["web", "dev", "1", "0", "0", "0", "N/A", "N/A", "72h0m0s", ""]
        );
    }

    #[test]
    fn test_replicaset_without_true_conditions() {
        let source = InMemorySource::new("t").with_objects(
            "ReplicaSet",
            vec![json!({
                "metadata": testing::meta("web-123", Some("prod")),
                "spec": {"replicas": 2, "selector": {}},
                "status": {"replicas": 2, "readyReplicas": 1},
            })],
        );
        let table = run(&ReplicaSetCollector, &source, testing::now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(&row[2..6], &["2", "2", "1", "2"]);
        assert_eq!(row[7], "No conditions met");
    }

    #[test]
    fn test_statefulset_service_name() {
        let source = InMemorySource::new("t").with_objects(
            "StatefulSet",
            vec![json!({
                "metadata": testing::meta("db", Some("prod")),
                "spec": {"serviceName": "db-headless", "selector": {}, "template": {}},
                "status": {"replicas": 1},
            })],
        );
        let table = run(&StatefulSetCollector, &source, testing::now()).unwrap();
        assert_eq!(table.rows()[0][6], "db-headless");
        assert_eq!(table.rows()[0][4], "0");
    }

    #[test]
    fn test_daemonset_node_selector() {
        let source = InMemorySource::new("t").with_objects(
            "DaemonSet",
            vec![json!({
                "metadata": testing::meta("agent", Some("kube-system")),
                "spec": {
                    "selector": {},
                    "template": {"spec": {
                        "containers": [],
                        "nodeSelector": {"kubernetes.io/os": "linux"},
                    }},
                },
                "status": {
                    "currentNumberScheduled": 3,
                    "desiredNumberScheduled": 3,
                    "numberMisscheduled": 0,
                    "numberReady": 2,
                },
            })],
        );
        let table = run(&DaemonSetCollector, &source, testing::now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(&row[2..6], &["3", "3", "2", "3"]);
        assert_eq!(row[6], "kubernetes.io/os=linux");
    }

    #[test]
    fn test_hpa_metrics() {
        let source = InMemorySource::new("t").with_objects(
            "HorizontalPodAutoscaler",
            vec![json!({
                "metadata": testing::meta("web", Some("prod")),
                "spec": {
                    "scaleTargetRef": {"kind": "Deployment", "name": "web", "apiVersion": "apps/v1"},
                    "minReplicas": 2,
                    "maxReplicas": 10,
                    "metrics": [{
                        "type": "Resource",
                        "resource": {"name": "cpu", "target": {"type": "Utilization", "averageUtilization": 70}},
                    }],
                },
                "status": {
                    "currentReplicas": 4,
                    "desiredReplicas": 4,
                    "currentMetrics": [{
                        "type": "Resource",
                        "resource": {"name": "cpu", "current": {"averageUtilization": 55}},
                    }],
                    "conditions": [{"type": "AbleToScale", "status": "True"}],
                },
            })],
        );
        let table = run(&HorizontalPodAutoscalerCollector, &source, testing::now()).unwrap();
        let row = &table.rows()[0];
        assert_eq!(row[2], "Deployment/web");
        assert_eq!(row[3], "2");
        assert_eq!(row[4], "10");
        assert_eq!(row[5], "70%");
        assert_eq!(row[6], "4");
        assert_eq!(row[8], "AbleToScale");
        assert_eq!(row[9], "Resource/cpu");
        assert_eq!(row[10], "55%");
        assert_eq!(row[11], "N/A");
        assert_eq!(row[12], "N/A");
    }
}
