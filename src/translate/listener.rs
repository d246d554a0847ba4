//! # Listener Translator (LDS)
//!
//! One envoy-types `Listener` for the insecure plane (`ingress_http`, a
//! single HTTP filter chain routing via RDS) and, if the DAG has any secure
//! vhost or TLS-passthrough entry, one more for the secure plane
//! (`ingress_https`, one SNI-matched filter chain per
//! [`crate::dag::model::FilterChainKind`]). Grounded on the teacher's
//! `xds::listener` HCM/filter-chain construction.

use envoy_types::pb::envoy::config::accesslog::v3::{access_log::ConfigType as AccessLogConfigType, AccessLog};
use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, socket_address::PortSpecifier, substitution_format_string::Format,
    Address, SocketAddress, SubstitutionFormatString, TransportSocket,
};
use envoy_types::pb::envoy::config::listener::v3::{
    Filter, FilterChain as EnvoyFilterChain, FilterChainMatch, Listener as EnvoyListener,
};
use envoy_types::pb::envoy::extensions::access_loggers::file::v3::{
    file_access_log::AccessLogFormat as FileAccessLogFormat, FileAccessLog,
};
use envoy_types::pb::envoy::extensions::filters::http::cors::v3::Cors as CorsFilterConfig;
use envoy_types::pb::envoy::extensions::filters::http::rbac::v3::Rbac as RbacFilterConfig;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
    http_connection_manager::{RouteSpecifier, ServerHeaderTransformation as HcmServerHeaderTransformation},
    HttpConnectionManager, HttpFilter,
};
use envoy_types::pb::envoy::extensions::filters::network::tcp_proxy::v3::TcpProxy as EnvoyTcpProxy;
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    downstream_tls_context::CommonTlsContext, DownstreamTlsContext,
};
use prost::Message;

use crate::config::settings::{ControlPlaneConfig, ListenerConfig as ListenerSettings, ServerHeaderTransformation};
use crate::dag::model::{Dag, FilterChainKind, Listener};

use super::{BuiltResource, LISTENER_TYPE_URL};

const ROUTER_FILTER: &str = "envoy.filters.http.router";
const CORS_FILTER_NAME: &str = "envoy.filters.http.cors";
const RBAC_FILTER_NAME: &str = "envoy.filters.http.rbac";
const HCM_FILTER_NAME: &str = "envoy.filters.network.http_connection_manager";
const TCP_PROXY_FILTER_NAME: &str = "envoy.filters.network.tcp_proxy";

/// RBAC's closed-world default with no policies: `action` ALLOW matches
/// nothing, so the filter would reject everything. `action` DENY matches
/// nothing, so it rejects nothing -- the correct listener-wide default,
/// since routes tighten it themselves via `typed_per_filter_config`
/// (spec §3 "Route" IP allow/deny).
const RBAC_ACTION_DENY: i32 = 1;

pub fn build_listeners(
    dag: &Dag,
    listener_config: &ListenerSettings,
    control_plane: &ControlPlaneConfig,
) -> Vec<BuiltResource> {
    let mut out = Vec::new();
    if let Some(listener) = &dag.insecure_listener {
        out.push(built(to_envoy_listener(listener, listener_config, control_plane)));
    }
    if let Some(listener) = &dag.secure_listener {
        out.push(built(to_envoy_listener(listener, listener_config, control_plane)));
    }
    out
}

fn built(listener: EnvoyListener) -> BuiltResource {
    BuiltResource {
        name: listener.name.clone(),
        resource: envoy_types::pb::google::protobuf::Any {
            type_url: LISTENER_TYPE_URL.to_string(),
            value: listener.encode_to_vec(),
        },
    }
}

fn to_envoy_listener(
    listener: &Listener,
    listener_config: &ListenerSettings,
    control_plane: &ControlPlaneConfig,
) -> EnvoyListener {
    let socket_address = SocketAddress {
        address: listener.address.clone(),
        port_specifier: Some(PortSpecifier::PortValue(listener.port)),
        ..Default::default()
    };

    EnvoyListener {
        name: listener.name.clone(),
        address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
        filter_chains: listener
            .filter_chains
            .iter()
            .map(|chain| to_envoy_filter_chain(chain, listener_config, control_plane))
            .collect(),
        ..Default::default()
    }
}

fn to_envoy_filter_chain(
    chain: &crate::dag::model::FilterChain,
    listener_config: &ListenerSettings,
    control_plane: &ControlPlaneConfig,
) -> EnvoyFilterChain {
    match &chain.kind {
        FilterChainKind::Http => EnvoyFilterChain {
            name: chain.name.clone(),
            filters: vec![hcm_filter("ingress_http", "ingress_http", listener_config, control_plane)],
            ..Default::default()
        },
        FilterChainKind::HttpsTerminated { sni, secret_key, fqdn } => EnvoyFilterChain {
            name: chain.name.clone(),
            filter_chain_match: Some(sni_match(sni)),
            filters: vec![hcm_filter(&chain.name, &format!("https/{fqdn}"), listener_config, control_plane)],
            transport_socket: Some(downstream_tls_transport_socket(secret_key, None)),
            ..Default::default()
        },
        FilterChainKind::HttpsFallback { secret_key, fqdn } => EnvoyFilterChain {
            name: chain.name.clone(),
            filters: vec![hcm_filter(&chain.name, &format!("https/{fqdn}"), listener_config, control_plane)],
            transport_socket: Some(downstream_tls_transport_socket(secret_key, None)),
            ..Default::default()
        },
        FilterChainKind::TlsPassthrough { sni, cluster_key } => EnvoyFilterChain {
            name: chain.name.clone(),
            filter_chain_match: Some(sni_match(sni)),
            filters: vec![tcp_proxy_filter(&chain.name, cluster_key)],
            ..Default::default()
        },
        FilterChainKind::TcpTerminated { sni, secret_key, cluster_key } => EnvoyFilterChain {
            name: chain.name.clone(),
            filter_chain_match: Some(sni_match(sni)),
            filters: vec![tcp_proxy_filter(&chain.name, cluster_key)],
            transport_socket: Some(downstream_tls_transport_socket(secret_key, None)),
            ..Default::default()
        },
    }
}

fn sni_match(sni: &str) -> FilterChainMatch {
    FilterChainMatch { server_names: vec![sni.to_string()], ..Default::default() }
}

fn build_access_log(listener_config: &ListenerSettings) -> AccessLog {
    use crate::config::settings::AccessLogFormat;

    let mut file_log = FileAccessLog { path: listener_config.access_log_path.clone(), access_log_format: None };

    let string_field = |template: &str| prost_types::Value {
        kind: Some(prost_types::value::Kind::StringValue(template.to_string())),
    };

    match listener_config.access_log_format {
        AccessLogFormat::Json => {
            file_log.access_log_format = Some(FileAccessLogFormat::LogFormat(SubstitutionFormatString {
                format: Some(Format::JsonFormat(prost_types::Struct {
                    fields: std::collections::BTreeMap::from([
                        ("start_time".to_string(), string_field("%START_TIME%")),
                        ("method".to_string(), string_field("%REQ(:METHOD)%")),
                        ("path".to_string(), string_field("%REQ(X-ENVOY-ORIGINAL-PATH?:PATH)%")),
                        ("response_code".to_string(), string_field("%RESPONSE_CODE%")),
                        ("duration".to_string(), string_field("%DURATION%")),
                        ("upstream_host".to_string(), string_field("%UPSTREAM_HOST%")),
                    ]),
                })),
                ..Default::default()
            }));
        }
        AccessLogFormat::Text => {
            file_log.access_log_format = Some(FileAccessLogFormat::LogFormat(SubstitutionFormatString {
                format: Some(Format::TextFormat(
                    "[%START_TIME%] \"%REQ(:METHOD)% %REQ(X-ENVOY-ORIGINAL-PATH?:PATH)%\" %RESPONSE_CODE% %DURATION%ms\n"
                        .to_string(),
                )),
                ..Default::default()
            }));
        }
    }

    AccessLog {
        name: "envoy.access_loggers.file".to_string(),
        filter: None,
        config_type: Some(AccessLogConfigType::TypedConfig(envoy_types::pb::google::protobuf::Any {
            type_url: "type.googleapis.com/envoy.extensions.access_loggers.file.v3.FileAccessLog".to_string(),
            value: file_log.encode_to_vec(),
        })),
    }
}

fn global_http_filters() -> Vec<HttpFilter> {
    let cors = HttpFilter {
        name: CORS_FILTER_NAME.to_string(),
        config_type: Some(
            envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::http_filter::ConfigType::TypedConfig(
                envoy_types::pb::google::protobuf::Any {
                    type_url: "type.googleapis.com/envoy.extensions.filters.http.cors.v3.Cors".to_string(),
                    value: CorsFilterConfig::default().encode_to_vec(),
                },
            ),
        ),
    };

    let rbac = RbacFilterConfig {
        rules: Some(envoy_types::pb::envoy::config::rbac::v3::Rbac {
            action: RBAC_ACTION_DENY,
            ..Default::default()
        }),
        ..Default::default()
    };
    let rbac = HttpFilter {
        name: RBAC_FILTER_NAME.to_string(),
        config_type: Some(
            envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::http_filter::ConfigType::TypedConfig(
                envoy_types::pb::google::protobuf::Any {
                    type_url: "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBAC".to_string(),
                    value: rbac.encode_to_vec(),
                },
            ),
        ),
    };

    vec![cors, rbac]
}

fn hcm_filter(
    stat_prefix: &str,
    route_config_name: &str,
    listener_config: &ListenerSettings,
    control_plane: &ControlPlaneConfig,
) -> Filter {
    let mut http_filters = global_http_filters();
    http_filters.push(HttpFilter {
        name: ROUTER_FILTER.to_string(),
        config_type: Some(
            envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::http_filter::ConfigType::TypedConfig(
                envoy_types::pb::google::protobuf::Any {
                    type_url: "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router".to_string(),
                    value: Vec::new(),
                },
            ),
        ),
    });

    let hcm = HttpConnectionManager {
        stat_prefix: stat_prefix.to_string(),
        route_specifier: Some(RouteSpecifier::Rds(
            envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::Rds {
                route_config_name: route_config_name.to_string(),
                config_source: Some(envoy_types::pb::envoy::config::core::v3::ConfigSource {
                    config_source_specifier: Some(
                        envoy_types::pb::envoy::config::core::v3::config_source::ConfigSourceSpecifier::Ads(
                            envoy_types::pb::envoy::config::core::v3::AggregatedConfigSource::default(),
                        ),
                    ),
                    ..Default::default()
                }),
            },
        )),
        http_filters,
        access_log: vec![build_access_log(listener_config)],
        use_remote_address: Some(envoy_types::pb::google::protobuf::BoolValue { value: true }),
        xff_num_trusted_hops: control_plane.xff_trusted_hops,
        server_header_transformation: to_server_header_transformation(control_plane.server_header_transformation)
            as i32,
        ..Default::default()
    };

    Filter {
        name: HCM_FILTER_NAME.to_string(),
        config_type: Some(envoy_types::pb::envoy::config::listener::v3::filter::ConfigType::TypedConfig(
            envoy_types::pb::google::protobuf::Any {
                type_url: "type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager".to_string(),
                value: hcm.encode_to_vec(),
            },
        )),
    }
}

fn to_server_header_transformation(value: ServerHeaderTransformation) -> HcmServerHeaderTransformation {
    match value {
        ServerHeaderTransformation::Overwrite => HcmServerHeaderTransformation::Overwrite,
        ServerHeaderTransformation::AppendIfAbsent => HcmServerHeaderTransformation::AppendIfAbsent,
        ServerHeaderTransformation::PassThrough => HcmServerHeaderTransformation::PassThrough,
    }
}

fn tcp_proxy_filter(stat_prefix: &str, cluster_key: &str) -> Filter {
    let tcp_proxy = EnvoyTcpProxy {
        stat_prefix: stat_prefix.to_string(),
        cluster_specifier: Some(
            envoy_types::pb::envoy::extensions::filters::network::tcp_proxy::v3::tcp_proxy::ClusterSpecifier::Cluster(
                cluster_key.to_string(),
            ),
        ),
        ..Default::default()
    };

    Filter {
        name: TCP_PROXY_FILTER_NAME.to_string(),
        config_type: Some(envoy_types::pb::envoy::config::listener::v3::filter::ConfigType::TypedConfig(
            envoy_types::pb::google::protobuf::Any {
                type_url: "type.googleapis.com/envoy.extensions.filters.network.tcp_proxy.v3.TcpProxy".to_string(),
                value: tcp_proxy.encode_to_vec(),
            },
        )),
    }
}

/// References the Secret by SDS name rather than inlining key material: the
/// listener translator never reads `Secret::tls_crt`/`tls_key` directly,
/// keeping certificate bytes out of LDS responses (spec §4.3 "SDS
/// indirection").
fn downstream_tls_transport_socket(secret_key: &str, validation_secret_key: Option<&str>) -> TransportSocket {
    use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
        common_tls_context::ValidationContextType, SdsSecretConfig,
    };

    let sds_config = |name: &str| SdsSecretConfig {
        name: name.to_string(),
        sds_config: Some(envoy_types::pb::envoy::config::core::v3::ConfigSource {
            config_source_specifier: Some(
                envoy_types::pb::envoy::config::core::v3::config_source::ConfigSourceSpecifier::Ads(
                    envoy_types::pb::envoy::config::core::v3::AggregatedConfigSource::default(),
                ),
            ),
            ..Default::default()
        }),
        ..Default::default()
    };

    let validation_context_type = validation_secret_key
        .map(|key| ValidationContextType::ValidationContextSdsSecretConfig(sds_config(key)));

    let common_tls_context = CommonTlsContext {
        tls_certificate_sds_secret_configs: vec![sds_config(secret_key)],
        validation_context_type,
        ..Default::default()
    };

    let downstream_ctx = DownstreamTlsContext { common_tls_context: Some(common_tls_context), ..Default::default() };

    TransportSocket {
        name: "envoy.transport_sockets.tls".to_string(),
        config_type: Some(envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType::TypedConfig(
            envoy_types::pb::google::protobuf::Any {
                type_url: "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.DownstreamTlsContext"
                    .to_string(),
                value: downstream_ctx.encode_to_vec(),
            },
        )),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AccessLogFormat;
    use crate::dag::model::{Dag, FilterChain, FilterChainKind, Listener, ListenerProtocol};
    use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::http_filter::ConfigType as HttpFilterConfigType;

    fn insecure_dag() -> Dag {
        let mut dag = Dag::default();
        dag.insecure_listener = Some(Listener {
            name: "listener_insecure".to_string(),
            address: "0.0.0.0".to_string(),
            port: 8080,
            protocol: ListenerProtocol::Http,
            filter_chains: vec![FilterChain { name: "filterchain_0".to_string(), kind: FilterChainKind::Http }],
        });
        dag
    }

    fn decode_hcm(listener: &EnvoyListener) -> HttpConnectionManager {
        let filter = &listener.filter_chains[0].filters[0];
        let Some(envoy_types::pb::envoy::config::listener::v3::filter::ConfigType::TypedConfig(any)) =
            &filter.config_type
        else {
            panic!("expected a typed HCM config");
        };
        HttpConnectionManager::decode(any.value.as_slice()).unwrap()
    }

    #[test]
    fn insecure_listener_registers_global_cors_and_rbac_filters_before_router() {
        let dag = insecure_dag();
        let listener_config = ListenerSettings::default();
        let control_plane = ControlPlaneConfig::default();

        let built = build_listeners(&dag, &listener_config, &control_plane);
        assert_eq!(built.len(), 1);

        let listener = EnvoyListener::decode(built[0].resource.value.as_slice()).unwrap();
        let hcm = decode_hcm(&listener);

        let names: Vec<&str> = hcm.http_filters.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![CORS_FILTER_NAME, RBAC_FILTER_NAME, ROUTER_FILTER]);
    }

    #[test]
    fn global_rbac_filter_defaults_to_deny_action_with_no_policies() {
        let rbac_filter = global_http_filters().into_iter().find(|f| f.name == RBAC_FILTER_NAME).unwrap();
        let Some(HttpFilterConfigType::TypedConfig(any)) = &rbac_filter.config_type else {
            panic!("expected a typed RBAC config");
        };
        let rbac = RbacFilterConfig::decode(any.value.as_slice()).unwrap();
        let rules = rbac.rules.expect("global RBAC filter must carry rules");
        assert_eq!(rules.action, RBAC_ACTION_DENY);
        assert!(rules.policies.is_empty());
    }

    #[test]
    fn xff_trusted_hops_and_server_header_transformation_flow_from_control_plane() {
        let dag = insecure_dag();
        let listener_config = ListenerSettings::default();
        let mut control_plane = ControlPlaneConfig::default();
        control_plane.xff_trusted_hops = 2;
        control_plane.server_header_transformation = ServerHeaderTransformation::PassThrough;

        let built = build_listeners(&dag, &listener_config, &control_plane);
        let listener = EnvoyListener::decode(built[0].resource.value.as_slice()).unwrap();
        let hcm = decode_hcm(&listener);

        assert_eq!(hcm.xff_num_trusted_hops, 2);
        assert_eq!(hcm.server_header_transformation, HcmServerHeaderTransformation::PassThrough as i32);
        assert_eq!(hcm.use_remote_address, Some(envoy_types::pb::google::protobuf::BoolValue { value: true }));
    }

    #[test]
    fn json_access_log_format_uses_structured_fields() {
        let mut listener_config = ListenerSettings::default();
        listener_config.access_log_format = AccessLogFormat::Json;

        let access_log = build_access_log(&listener_config);
        let Some(AccessLogConfigType::TypedConfig(any)) = &access_log.config_type else {
            panic!("expected a typed access log config");
        };
        let file_log = FileAccessLog::decode(any.value.as_slice()).unwrap();
        match file_log.access_log_format {
            Some(FileAccessLogFormat::LogFormat(ref format)) => match &format.format {
                Some(Format::JsonFormat(fields)) => assert!(fields.fields.contains_key("response_code")),
                _ => panic!("expected a JSON format"),
            },
            _ => panic!("expected a log format"),
        }
    }

    #[test]
    fn text_access_log_format_is_a_single_template_line() {
        let mut listener_config = ListenerSettings::default();
        listener_config.access_log_format = AccessLogFormat::Text;

        let access_log = build_access_log(&listener_config);
        let Some(AccessLogConfigType::TypedConfig(any)) = &access_log.config_type else {
            panic!("expected a typed access log config");
        };
        let file_log = FileAccessLog::decode(any.value.as_slice()).unwrap();
        match file_log.access_log_format {
            Some(FileAccessLogFormat::LogFormat(ref format)) => {
                assert!(matches!(format.format, Some(Format::TextFormat(_))))
            }
            _ => panic!("expected a log format"),
        }
    }
}
