use jiff::Timestamp;
use k8s_openapi::{
    api::{
        core::v1::{Endpoints, Service},
        networking::v1::{Ingress, NetworkPolicy, NetworkPolicyPeer},
    },
    apimachinery::pkg::{apis::meta::v1::LabelSelector, util::intstr::IntOrString},
};

use super::{name, namespace, Collector};
use crate::{
    error::CollectError,
    utils::{
        age, bracketed, join_map, label_selector, opt, or_sentinel, true_conditions, yes_no, NONE,
        NOT_AVAILABLE,
    },
};

const INGRESS_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

fn port_protocol(port: i32, protocol: Option<&str>) -> String {
    format!("{port}/{}", protocol.unwrap_or("TCP"))
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceCollector;

impl Collector for ServiceCollector {
    type Resource = Service;
    type Context = ();
    const KIND: &'static str = "service";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "SERVICE NAME",
            "NAMESPACE",
            "TYPE",
            "CLUSTER IP",
            "EXTERNAL IP",
            "PORT(S)",
            "TARGET PORT",
            "SELECTOR",
            "SESSION AFFINITY",
            "AGE",
            "CONDITIONS",
        ]
    }

    fn build_row(&self, svc: &Service, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = svc.spec.as_ref();
        let status = svc.status.as_ref();
        let ports = spec.and_then(|s| s.ports.as_ref()).into_iter().flatten();

        let external: Vec<String> = status
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref())
            .into_iter()
            .flatten()
            .filter_map(|i| i.ip.clone().or_else(|| i.hostname.clone()))
            .chain(spec.and_then(|s| s.external_ips.clone()).into_iter().flatten())
            .collect();
        let target_ports: Vec<String> = ports
            .clone()
            .map(|p| match &p.target_port {
                Some(IntOrString::Int(i)) => i.to_string(),
                Some(IntOrString::String(s)) => s.clone(),
                None => p.port.to_string(),
            })
            .collect();

        Ok(vec![
            name(&svc.metadata),
            namespace(&svc.metadata),
            or_sentinel(spec.and_then(|s| s.type_.clone()), "ClusterIP"),
            or_sentinel(spec.and_then(|s| s.cluster_ip.clone()), NONE),
            external.join(", "),
            ports
                .map(|p| port_protocol(p.port, p.protocol.as_deref()))
                .collect::<Vec<_>>()
                .join(", "),
            target_ports.join(", "),
            join_map(spec.and_then(|s| s.selector.as_ref())),
            or_sentinel(spec.and_then(|s| s.session_affinity.clone()), "None"),
            age(svc.metadata.creation_timestamp.as_ref(), now),
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
pub struct EndpointsCollector;

impl Collector for EndpointsCollector {
    type Resource = Endpoints;
    type Context = ();
    const KIND: &'static str = "endpoints";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "ENDPOINT NAME",
            "NAMESPACE",
            "SUBSETS",
            "IP ADDRESSES",
            "PORTS",
            "AGE",
        ]
    }

    fn build_row(&self, ep: &Endpoints, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let subsets = ep.subsets.as_deref().unwrap_or_default();
        let addresses = subsets
            .iter()
            .flat_map(|s| s.addresses.iter().flatten())
            .map(|a| a.ip.as_str());
        let ports: Vec<String> = subsets
            .iter()
            .flat_map(|s| s.ports.iter().flatten())
            .map(|p| port_protocol(p.port, p.protocol.as_deref()))
            .collect();

        Ok(vec![
            name(&ep.metadata),
            namespace(&ep.metadata),
            subsets.len().to_string(),
            bracketed(addresses),
            ports.join(", "),
            age(ep.metadata.creation_timestamp.as_ref(), now),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IngressCollector;

impl Collector for IngressCollector {
    type Resource = Ingress;
    type Context = ();
    const KIND: &'static str = "ingress";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "INGRESS NAME",
            "NAMESPACE",
            "HOST(S)",
            "PATH(S)",
            "BACKEND SERVICE NAME",
            "BACKEND SERVICE PORT",
            "TLS ENABLED",
            "TLS SECRET NAME",
            "INGRESS CLASS",
            "RULES",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn build_row(&self, ing: &Ingress, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = ing.spec.as_ref();
        let mut hosts = Vec::new();
        let mut paths = Vec::new();
        let mut backends = Vec::new();
        let mut ports = Vec::new();
        let mut rules = Vec::new();

        for rule in spec.and_then(|s| s.rules.as_ref()).into_iter().flatten() {
            let host = rule.host.clone().filter(|h| !h.is_empty()).unwrap_or_else(|| "*".into());
            let mut rule_paths = Vec::new();
            for path in rule.http.iter().flat_map(|h| &h.paths) {
                let p = path.path.clone().unwrap_or_else(|| "/".into());
                rule_paths.push(p.clone());
                paths.push(p);
                if let Some(svc) = &path.backend.service {
                    backends.push(svc.name.clone());
                    ports.push(
                        svc.port
                            .as_ref()
                            .and_then(|port| {
                                port.number.map(|n| n.to_string()).or_else(|| port.name.clone())
                            })
                            .unwrap_or_default(),
                    );
                }
            }
            rules.push(format!("{host}: {}", rule_paths.join(",")));
            hosts.push(host);
        }

        let tls = spec.and_then(|s| s.tls.as_deref()).unwrap_or_default();
        let class = spec
            .and_then(|s| s.ingress_class_name.clone())
            .or_else(|| {
                ing.metadata
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(INGRESS_CLASS_ANNOTATION).cloned())
            });

        Ok(vec![
            name(&ing.metadata),
            namespace(&ing.metadata),
            hosts.join(","),
            paths.join(","),
            backends.join(","),
            ports.join(","),
            yes_no(!tls.is_empty()),
            tls.first()
                .and_then(|t| t.secret_name.clone())
                .unwrap_or_default(),
            or_sentinel(class, NOT_AVAILABLE),
            rules.join("; "),
            age(ing.metadata.creation_timestamp.as_ref(), now),
            join_map(ing.metadata.annotations.as_ref()),
        ])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkPolicyCollector;

impl Collector for NetworkPolicyCollector {
    type Resource = NetworkPolicy;
    type Context = ();
    const KIND: &'static str = "networkpolicy";

    fn columns(&self) -> &'static [&'static str] {
        &[
            "NETWORK POLICY NAME",
            "NAMESPACE",
            "POD SELECTOR",
            "NAMESPACE SELECTOR",
            "POLICY TYPES",
            "INGRESS RULES",
            "EGRESS RULES",
            "INGRESS ACTION",
            "EGRESS ACTION",
            "MATCH LABELS",
            "AGE",
            "ANNOTATIONS",
        ]
    }

    fn build_row(&self, np: &NetworkPolicy, _: &(), now: Timestamp) -> Result<Vec<String>, CollectError> {
        let spec = np.spec.as_ref();
        let pod_selector = spec.and_then(|s| opt::<LabelSelector>(s.pod_selector.clone()));
        let ingress = spec.and_then(|s| s.ingress.as_deref()).unwrap_or_default();
        let egress = spec.and_then(|s| s.egress.as_deref()).unwrap_or_default();

        // Without declared types the API server enforces Ingress, plus Egress
        // when egress rules exist.
        let types: Vec<String> = match spec.and_then(|s| s.policy_types.clone()) {
            Some(types) if !types.is_empty() => types,
            _ if egress.is_empty() => vec!["Ingress".into()],
            _ => vec!["Ingress".into(), "Egress".into()],
        };
        let restricts = |t: &str| types.iter().any(|d| d == t);

        let namespace_selectors: Vec<String> = ingress
            .iter()
            .flat_map(|r| r.from.iter().flatten())
            .chain(egress.iter().flat_map(|r| r.to.iter().flatten()))
            .filter_map(|p| p.namespace_selector.as_ref())
            .map(|sel| label_selector(Some(sel)))
            .collect();

        let (ingress_rules, ingress_action) = direction(
            restricts("Ingress"),
            "from",
            ingress.iter().map(|r| r.from.as_deref().unwrap_or_default()),
        );
        let (egress_rules, egress_action) = direction(
            restricts("Egress"),
            "to",
            egress.iter().map(|r| r.to.as_deref().unwrap_or_default()),
        );

        Ok(vec![
            name(&np.metadata),
            namespace(&np.metadata),
            label_selector(pod_selector.as_ref()),
            or_sentinel(Some(namespace_selectors.join("; ")), NONE),
            types.join(", "),
            ingress_rules,
            egress_rules,
            ingress_action.to_string(),
            egress_action.to_string(),
            join_map(pod_selector.as_ref().and_then(|s| s.match_labels.as_ref())),
            age(np.metadata.creation_timestamp.as_ref(), now),
            join_map(np.metadata.annotations.as_ref()),
        ])
    }
}

/// Summarises one traffic direction as `(rules, action)`.
fn direction<'a, I>(restricted: bool, preposition: &str, rules: I) -> (String, &'static str)
where
    I: ExactSizeIterator<Item = &'a [NetworkPolicyPeer]>,
{
    if !restricted {
        return ("Not restricted".to_string(), "Allow");
    }
    if rules.len() == 0 {
        return (format!("Deny {preposition} all"), "Deny");
    }
    let described: Vec<String> = rules
        .map(|peers| {
            if peers.is_empty() {
                format!("Allow {preposition} all")
            } else {
                let peers: Vec<String> = peers.iter().map(peer).collect();
                format!("Allow {preposition} {}", peers.join(", "))
            }
        })
        .collect();
    (described.join("; "), "Allow")
}

fn peer(peer: &NetworkPolicyPeer) -> String {
    if let Some(block) = &peer.ip_block {
        return match block.except.as_deref() {
            Some(except) if !except.is_empty() => {
                format!("{} except {}", block.cidr, except.join(","))
            }
            _ => block.cidr.clone(),
        };
    }
    match (&peer.namespace_selector, &peer.pod_selector) {
        (Some(ns), Some(pods)) => format!(
            "pods({}) in namespaces({})",
            label_selector(Some(pods)),
            label_selector(Some(ns))
        ),
        (Some(ns), None) => format!("namespaces({})", label_selector(Some(ns))),
        (None, Some(pods)) => format!("pods({})", label_selector(Some(pods))),
        (None, None) => "all".to_string(),
    }
}
