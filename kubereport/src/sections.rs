//! The ordered section lists of each report profile.

use crate::{collectors::CollectorKind, config::ReportProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section {
    pub title: &'static str,
    pub kind: CollectorKind,
}

const fn section(title: &'static str, kind: CollectorKind) -> Section {
    Section { title, kind }
}

pub const GENERAL: &[Section] = &[
    section("Cluster Resource Details", CollectorKind::ClusterSummary),
    section("Node Resource Details", CollectorKind::NodeResources),
    section("Namespace Resource Details", CollectorKind::NamespaceResources),
    section("Namespace Summary", CollectorKind::NamespaceSummary),
    section("Pod Distribution By Namespace", CollectorKind::PodsByNamespace),
    section("Pod Distribution By Node", CollectorKind::PodsByNode),
    section("Pod Resource Details", CollectorKind::PodResources),
    section("Pod Status", CollectorKind::PodStatus),
];

pub const DETAILED: &[Section] = &[
    section("[ CLUSTER RESOURCE DETAILS ]", CollectorKind::ClusterSummary),
    section("[ NODE RESOURCE DETAILS ]", CollectorKind::NodeDetails),
    section("[ NAMESPACE DETAILS ]", CollectorKind::NamespaceDetails),
    section("[ POD DETAILS ]", CollectorKind::PodDetails),
    section("[ DEPLOYMENT DETAILS ]", CollectorKind::Deployments),
    section("[ SERVICE DETAILS ]", CollectorKind::Services),
    section("[ ENDPOINTS DETAILS ]", CollectorKind::Endpoints),
    section("[ REPLICASET DETAILS ]", CollectorKind::ReplicaSets),
    section("[ STATEFULSET DETAILS ]", CollectorKind::StatefulSets),
    section("[ DAEMONSETS DETAILS ]", CollectorKind::DaemonSets),
    section("[ CONFIGMAP DETAILS ]", CollectorKind::ConfigMaps),
    section("[ SECRET DETAILS ]", CollectorKind::Secrets),
    section("[ SERVICEACCOUNT DETAILS ]", CollectorKind::ServiceAccounts),
    section("[ PERSISTENT VOLUMES DETAILS ]", CollectorKind::PersistentVolumes),
    section("[ PERSISTENT VOLUME CLAIM DETAILS ]", CollectorKind::PersistentVolumeClaims),
    section("[ STORAGE CLASS DETAILS ]", CollectorKind::StorageClasses),
    section("[ INGRESS RESOURCES DETAILS ]", CollectorKind::Ingresses),
    section("[ NETWORK POLICY DETAILS ]", CollectorKind::NetworkPolicies),
    section("[ RESOURCE QUOTA DETAILS ]", CollectorKind::ResourceQuotas),
    section("[ LIMIT RANGE DETAILS ]", CollectorKind::LimitRanges),
    section("[ HORIZONTAL POD AUTOSCALERS DETAILS ]", CollectorKind::HorizontalPodAutoscalers),
    section("[ JOB DETAILS ]", CollectorKind::Jobs),
    section("[ CRONJOB DETAILS ]", CollectorKind::CronJobs),
    section("[ ROLE DETAILS ]", CollectorKind::Roles),
    section("[ ROLEBINDING DETAILS ]", CollectorKind::RoleBindings),
    section("[ CLUSTERROLE DETAILS ]", CollectorKind::ClusterRoles),
    section("[ CLUSTERROLEBINDING DETAILS ]", CollectorKind::ClusterRoleBindings),
];

pub fn catalog(profile: ReportProfile) -> &'static [Section] {
    match profile {
        ReportProfile::General => GENERAL,
        ReportProfile::Detailed => DETAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_cluster_summary_leads_both_profiles() {
        for profile in [ReportProfile::General, ReportProfile::Detailed] {
            assert_eq!(catalog(profile)[0].kind, CollectorKind::ClusterSummary);
        }
    }

    #[test]
    fn test_titles_are_unique() {
        for sections in [GENERAL, DETAILED] {
            let titles: BTreeSet<_> = sections.iter().map(|s| s.title).collect();
            assert_eq!(titles.len(), sections.len());
        }
    }

    #[test]
    fn test_detailed_section_order() {
        assert_eq!(DETAILED.len(), 27);
        assert_eq!(DETAILED.last().map(|s| s.kind), Some(CollectorKind::ClusterRoleBindings));
    }
}
