//! # Resource Translators
//!
//! Turns one [`crate::dag::Dag`] into the four xDS resource families Envoy
//! asks for over ADS (LDS/RDS/CDS/SDS; EDS lives in [`crate::endpoint`]
//! because it is driven by EndpointSlice events directly rather than by the
//! DAG). Each translator is a pure `Dag -> Vec<BuiltResource>` function,
//! grounded on the teacher's `xds::resources` conversions from its REST
//! config types to envoy-types protobufs, generalized here to read from the
//! DAG model instead.

pub mod cluster;
pub mod listener;
pub mod route;
pub mod secret;

use envoy_types::pb::google::protobuf::Any;

pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const SECRET_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

/// One named resource plus its encoded protobuf body, ready to enter an
/// [`crate::xds::state::XdsState`] cache (spec §5 "xDS resource naming").
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub resource: Any,
}

/// Translates a full [`crate::dag::Dag`] into the LDS/RDS/CDS/SDS resource
/// sets in one call, in the order the rebuild worker must publish them
/// (spec §5 "push ordering"): CDS, then LDS, then RDS, then SDS. EDS is
/// published separately by [`crate::endpoint`] and always precedes CDS's
/// dependents in wall-clock terms because the endpoint translator runs off
/// the same snapshot.
pub struct TranslatedResources {
    pub clusters: Vec<BuiltResource>,
    pub listeners: Vec<BuiltResource>,
    pub routes: Vec<BuiltResource>,
    pub secrets: Vec<BuiltResource>,
}

pub fn translate(dag: &crate::dag::Dag, config: &crate::config::AppConfig) -> TranslatedResources {
    TranslatedResources {
        clusters: cluster::build_clusters(dag),
        listeners: listener::build_listeners(dag, &config.listeners, &config.control_plane),
        routes: route::build_routes(dag),
        secrets: secret::build_secrets(dag),
    }
}
