use jiff::Timestamp;

use super::{
    batch::{CronJobCollector, JobCollector},
    cluster,
    configuration::{ConfigMapCollector, SecretCollector, ServiceAccountCollector},
    namespace::{NamespaceDetailCollector, NamespaceResourceCollector, NamespaceSummaryCollector},
    network::{EndpointsCollector, IngressCollector, NetworkPolicyCollector, ServiceCollector},
    node::{NodeDetailCollector, NodeResourceCollector},
    pod::{self, PodDetailCollector, PodResourceCollector, PodStatusCollector},
    policy::{LimitRangeCollector, ResourceQuotaCollector},
    rbac::{
        ClusterRoleBindingCollector, ClusterRoleCollector, RoleBindingCollector, RoleCollector,
    },
    run,
    storage::{PersistentVolumeClaimCollector, PersistentVolumeCollector, StorageClassCollector},
    workload::{
        DaemonSetCollector, DeploymentCollector, HorizontalPodAutoscalerCollector,
        ReplicaSetCollector, StatefulSetCollector,
    },
    Collector,
};
use crate::{error::CollectError, source::DataSource, table::RecordTable};

/// Every table a report section can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorKind {
    ClusterSummary,
    NodeResources,
    NodeDetails,
    NamespaceResources,
    NamespaceSummary,
    NamespaceDetails,
    PodsByNamespace,
    PodsByNode,
    PodResources,
    PodStatus,
    PodDetails,
    Deployments,
    Services,
    Endpoints,
    ReplicaSets,
    StatefulSets,
    DaemonSets,
    ConfigMaps,
    Secrets,
    ServiceAccounts,
    PersistentVolumes,
    PersistentVolumeClaims,
    StorageClasses,
    Ingresses,
    NetworkPolicies,
    ResourceQuotas,
    LimitRanges,
    HorizontalPodAutoscalers,
    Jobs,
    CronJobs,
    Roles,
    RoleBindings,
    ClusterRoles,
    ClusterRoleBindings,
}

impl CollectorKind {
    /// Resource kind the table is primarily built from, for logs and errors.
    pub fn kind(self) -> &'static str {
        match self {
            CollectorKind::ClusterSummary => "cluster",
            CollectorKind::NodeResources | CollectorKind::NodeDetails => "node",
            CollectorKind::NamespaceResources
            | CollectorKind::NamespaceSummary
            | CollectorKind::NamespaceDetails => "namespace",
            CollectorKind::PodsByNamespace
            | CollectorKind::PodsByNode
            | CollectorKind::PodResources
            | CollectorKind::PodStatus
            | CollectorKind::PodDetails => "pod",
            CollectorKind::Deployments => DeploymentCollector::KIND,
            CollectorKind::Services => ServiceCollector::KIND,
            CollectorKind::Endpoints => EndpointsCollector::KIND,
            CollectorKind::ReplicaSets => ReplicaSetCollector::KIND,
            CollectorKind::StatefulSets => StatefulSetCollector::KIND,
            CollectorKind::DaemonSets => DaemonSetCollector::KIND,
            CollectorKind::ConfigMaps => ConfigMapCollector::KIND,
            CollectorKind::Secrets => SecretCollector::KIND,
            CollectorKind::ServiceAccounts => ServiceAccountCollector::KIND,
            CollectorKind::PersistentVolumes => PersistentVolumeCollector::KIND,
            CollectorKind::PersistentVolumeClaims => PersistentVolumeClaimCollector::KIND,
            CollectorKind::StorageClasses => StorageClassCollector::KIND,
            CollectorKind::Ingresses => IngressCollector::KIND,
            CollectorKind::NetworkPolicies => NetworkPolicyCollector::KIND,
            CollectorKind::ResourceQuotas => ResourceQuotaCollector::KIND,
            CollectorKind::LimitRanges => LimitRangeCollector::KIND,
            CollectorKind::HorizontalPodAutoscalers => HorizontalPodAutoscalerCollector::KIND,
            CollectorKind::Jobs => JobCollector::KIND,
            CollectorKind::CronJobs => CronJobCollector::KIND,
            CollectorKind::Roles => RoleCollector::KIND,
            CollectorKind::RoleBindings => RoleBindingCollector::KIND,
            CollectorKind::ClusterRoles => ClusterRoleCollector::KIND,
            CollectorKind::ClusterRoleBindings => ClusterRoleBindingCollector::KIND,
        }
    }

    pub fn collect(self, source: &dyn DataSource, now: Timestamp) -> Result<RecordTable, CollectError> {
        match self {
            CollectorKind::ClusterSummary => cluster::cluster_summary(source, now),
            CollectorKind::NodeResources => run(&NodeResourceCollector, source, now),
            CollectorKind::NodeDetails => run(&NodeDetailCollector, source, now),
            CollectorKind::NamespaceResources => run(&NamespaceResourceCollector, source, now),
            CollectorKind::NamespaceSummary => run(&NamespaceSummaryCollector, source, now),
            CollectorKind::NamespaceDetails => run(&NamespaceDetailCollector, source, now),
            CollectorKind::PodsByNamespace => pod::pods_by_namespace(source),
            CollectorKind::PodsByNode => pod::pods_by_node(source),
            CollectorKind::PodResources => run(&PodResourceCollector, source, now),
            CollectorKind::PodStatus => run(&PodStatusCollector, source, now),
            CollectorKind::PodDetails => run(&PodDetailCollector, source, now),
            CollectorKind::Deployments => run(&DeploymentCollector, source, now),
            CollectorKind::Services => run(&ServiceCollector, source, now),
            CollectorKind::Endpoints => run(&EndpointsCollector, source, now),
            CollectorKind::ReplicaSets => run(&ReplicaSetCollector, source, now),
            CollectorKind::StatefulSets => run(&StatefulSetCollector, source, now),
            CollectorKind::DaemonSets => run(&DaemonSetCollector, source, now),
            CollectorKind::ConfigMaps => run(&ConfigMapCollector, source, now),
            CollectorKind::Secrets => run(&SecretCollector, source, now),
            CollectorKind::ServiceAccounts => run(&ServiceAccountCollector, source, now),
            CollectorKind::PersistentVolumes => run(&PersistentVolumeCollector, source, now),
            CollectorKind::PersistentVolumeClaims => {
                run(&PersistentVolumeClaimCollector, source, now)
            }
            CollectorKind::StorageClasses => run(&StorageClassCollector, source, now),
            CollectorKind::Ingresses => run(&IngressCollector, source, now),
            CollectorKind::NetworkPolicies => run(&NetworkPolicyCollector, source, now),
            CollectorKind::ResourceQuotas => run(&ResourceQuotaCollector, source, now),
            CollectorKind::LimitRanges => run(&LimitRangeCollector, source, now),
            CollectorKind::HorizontalPodAutoscalers => {
                run(&HorizontalPodAutoscalerCollector, source, now)
            }
            CollectorKind::Jobs => run(&JobCollector, source, now),
            CollectorKind::CronJobs => run(&CronJobCollector, source, now),
            CollectorKind::Roles => run(&RoleCollector, source, now),
            CollectorKind::RoleBindings => run(&RoleBindingCollector, source, now),
            CollectorKind::ClusterRoles => run(&ClusterRoleCollector, source, now),
            CollectorKind::ClusterRoleBindings => run(&ClusterRoleBindingCollector, source, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing;
    use crate::source::InMemorySource;

    #[test]
    fn test_empty_kind_yields_header_only_table() {
        let table = CollectorKind::Jobs
            .collect(&InMemorySource::new("t"), testing::now())
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns()[0], "JOB NAME");
    }

    #[test]
    fn test_failure_carries_kind() {
        let source = InMemorySource::new("t").with_failure("ClusterRole", "forbidden");
        let err = CollectorKind::ClusterRoles
            .collect(&source, testing::now())
            .unwrap_err();
        assert!(matches!(
            err,
            CollectError::CollectionUnavailable { kind: "clusterrole", .. }
        ));
        assert_eq!(CollectorKind::ClusterRoles.kind(), "clusterrole");
    }
}
