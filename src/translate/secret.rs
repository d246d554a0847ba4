//! # Secret Translator (SDS)
//!
//! One envoy-types `Secret` per [`crate::dag::model::Secret`] surviving the
//! DAG builder's SDS-isolation filter (only secrets actually referenced by a
//! resolved listener enter `Dag.secrets`, so nothing here needs its own
//! reachability check). Grounded on the teacher's `xds::secret` TLS
//! certificate / validation context construction.

use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::secret::Type as SecretType;
use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
    CertificateValidationContext, DataSource, Secret as EnvoySecret, TlsCertificate,
};
use prost::Message;

use crate::dag::model::{Dag, Secret, SecretKind};

use super::{BuiltResource, SECRET_TYPE_URL};

pub fn build_secrets(dag: &Dag) -> Vec<BuiltResource> {
    dag.secrets.values().map(to_built_resource).collect()
}

fn to_built_resource(secret: &Secret) -> BuiltResource {
    let envoy_secret = to_envoy_secret(secret);
    BuiltResource {
        name: secret.key.clone(),
        resource: envoy_types::pb::google::protobuf::Any {
            type_url: SECRET_TYPE_URL.to_string(),
            value: envoy_secret.encode_to_vec(),
        },
    }
}

fn to_envoy_secret(secret: &Secret) -> EnvoySecret {
    let r#type = match secret.kind {
        SecretKind::TlsCertificate => {
            let certificate_chain = secret.tls_crt.clone().unwrap_or_default();
            let private_key = secret.tls_key.clone().unwrap_or_default();
            SecretType::TlsCertificate(TlsCertificate {
                certificate_chain: Some(inline_bytes(certificate_chain)),
                private_key: Some(inline_bytes(private_key)),
                ..Default::default()
            })
        }
        SecretKind::ValidationContext => {
            let ca_bundle = secret.ca_bundle.clone().unwrap_or_default();
            SecretType::ValidationContext(CertificateValidationContext {
                trusted_ca: Some(inline_bytes(ca_bundle)),
                ..Default::default()
            })
        }
    };

    EnvoySecret { name: secret.key.clone(), r#type: Some(r#type) }
}

fn inline_bytes(bytes: Vec<u8>) -> DataSource {
    DataSource {
        specifier: Some(envoy_types::pb::envoy::config::core::v3::data_source::Specifier::InlineBytes(bytes)),
        ..Default::default()
    }
}
