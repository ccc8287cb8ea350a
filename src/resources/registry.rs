//! Static catalog of the platform services, their API groups and owned kinds

use crate::error::OpsError;
use kube::api::ApiResource;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One custom kind owned by a [`ResourceApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceKind {
    /// Short lowercase name used on the command line (e.g. "broker")
    pub name: &'static str,
    /// Kubernetes kind (e.g. "Broker")
    pub kind: &'static str,
    /// Plural name for API paths (e.g. "brokers")
    pub plural: &'static str,
}

/// Identity of an API group/version that owns a set of kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceApi {
    pub group: &'static str,
    pub version: &'static str,
    pub moniker: &'static str,
    /// Label selector associating pods with the service
    pub label: Option<&'static str>,
    #[serde(skip)]
    pub kinds: &'static [ResourceKind],
}

impl ResourceApi {
    /// `group/version` as advertised by API discovery
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }

    /// Look up an owned kind by its short name, Kubernetes kind, or plural
    pub fn kind(&self, name: &str) -> Option<&'static ResourceKind> {
        let name = name.to_lowercase();
        self.kinds.iter().find(|k| {
            k.name == name || k.plural == name || k.kind.to_lowercase() == name
        })
    }

    /// Short names of all owned kinds
    pub fn kind_names(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|k| k.name).collect()
    }

    /// Dynamic API descriptor for one owned kind
    pub fn api_resource(&self, kind: &ResourceKind) -> ApiResource {
        ApiResource {
            group: self.group.to_string(),
            version: self.version.to_string(),
            api_version: self.api_version(),
            kind: kind.kind.to_string(),
            plural: kind.plural.to_string(),
        }
    }

    /// Moniker with its first letter upper-cased (e.g. "Akri")
    pub fn upper_moniker(&self) -> String {
        let mut chars = self.moniker.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// The services the check engine and the bundle collector know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Mq,
    Opcua,
    DeviceRegistry,
    Akri,
    Dataflow,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Mq,
        ServiceKind::Opcua,
        ServiceKind::DeviceRegistry,
        ServiceKind::Akri,
        ServiceKind::Dataflow,
    ];

    /// Static definition of this service
    pub fn def(&self) -> &'static ServiceDef {
        match self {
            ServiceKind::Mq => &MQ,
            ServiceKind::Opcua => &OPCUA,
            ServiceKind::DeviceRegistry => &DEVICE_REGISTRY,
            ServiceKind::Akri => &AKRI,
            ServiceKind::Dataflow => &DATAFLOW,
        }
    }

    pub fn moniker(&self) -> &'static str {
        self.def().api.moniker
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.moniker())
    }
}

impl FromStr for ServiceKind {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        ServiceKind::ALL
            .into_iter()
            .find(|svc| svc.moniker() == lower)
            .ok_or_else(|| {
                let allowed: Vec<_> = ServiceKind::ALL.iter().map(|s| s.moniker()).collect();
                OpsError::UserError(format!(
                    "Unknown service '{}'. Allowed values: {}",
                    s,
                    allowed.join(", ")
                ))
            })
    }
}

/// Static description of one service
#[derive(Debug, Clone, Copy)]
pub struct ServiceDef {
    pub service: ServiceKind,
    pub api: ResourceApi,
    /// Name prefixes of the pods and workloads belonging to the service
    pub pod_prefixes: &'static [&'static str],
}

pub const MQ_API: ResourceApi = ResourceApi {
    group: "mq.iotoperations.azure.com",
    version: "v1beta1",
    moniker: "mq",
    label: Some("app.kubernetes.io/name=aio-mq"),
    kinds: &[
        ResourceKind { name: "broker", kind: "Broker", plural: "brokers" },
        ResourceKind { name: "brokerlistener", kind: "BrokerListener", plural: "brokerlisteners" },
        ResourceKind {
            name: "brokerauthentication",
            kind: "BrokerAuthentication",
            plural: "brokerauthentications",
        },
        ResourceKind {
            name: "brokerauthorization",
            kind: "BrokerAuthorization",
            plural: "brokerauthorizations",
        },
    ],
};

pub const OPCUA_API: ResourceApi = ResourceApi {
    group: "opcuabroker.iotoperations.azure.com",
    version: "v1beta1",
    moniker: "opcua",
    label: Some("app.kubernetes.io/name=aio-opc"),
    kinds: &[ResourceKind { name: "assettype", kind: "AssetType", plural: "assettypes" }],
};

pub const DEVICE_REGISTRY_API: ResourceApi = ResourceApi {
    group: "deviceregistry.microsoft.com",
    version: "v1beta1",
    moniker: "deviceregistry",
    label: Some("app.kubernetes.io/name=aio-deviceregistry"),
    kinds: &[
        ResourceKind { name: "asset", kind: "Asset", plural: "assets" },
        ResourceKind {
            name: "assetendpointprofile",
            kind: "AssetEndpointProfile",
            plural: "assetendpointprofiles",
        },
    ],
};

pub const AKRI_API: ResourceApi = ResourceApi {
    group: "akri.sh",
    version: "v0",
    moniker: "akri",
    label: Some("app.kubernetes.io/name=aio-akri"),
    kinds: &[
        ResourceKind { name: "configuration", kind: "Configuration", plural: "configurations" },
        ResourceKind { name: "instance", kind: "Instance", plural: "instances" },
    ],
};

pub const DATAFLOW_API: ResourceApi = ResourceApi {
    group: "connectivity.iotoperations.azure.com",
    version: "v1beta1",
    moniker: "dataflow",
    label: Some("app.kubernetes.io/name=aio-dataflow"),
    kinds: &[
        ResourceKind { name: "dataflow", kind: "Dataflow", plural: "dataflows" },
        ResourceKind { name: "dataflowendpoint", kind: "DataflowEndpoint", plural: "dataflowendpoints" },
        ResourceKind { name: "dataflowprofile", kind: "DataflowProfile", plural: "dataflowprofiles" },
    ],
};

pub static MQ: ServiceDef = ServiceDef {
    service: ServiceKind::Mq,
    api: MQ_API,
    pod_prefixes: &["aio-mq-"],
};

pub static OPCUA: ServiceDef = ServiceDef {
    service: ServiceKind::Opcua,
    api: OPCUA_API,
    pod_prefixes: &["aio-opc-"],
};

pub static DEVICE_REGISTRY: ServiceDef = ServiceDef {
    service: ServiceKind::DeviceRegistry,
    api: DEVICE_REGISTRY_API,
    pod_prefixes: &[],
};

pub static AKRI: ServiceDef = ServiceDef {
    service: ServiceKind::Akri,
    api: AKRI_API,
    pod_prefixes: &["aio-akri-"],
};

pub static DATAFLOW: ServiceDef = ServiceDef {
    service: ServiceKind::Dataflow,
    api: DATAFLOW_API,
    pod_prefixes: &["aio-dataflow-"],
};
