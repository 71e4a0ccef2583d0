//! Typed ingress configuration tree.
//!
//! Mirrors the Traefik dynamic/static configuration schema far enough for
//! aggregation and proxy-config emission. Every field is optional and
//! "set" is distinguishable from "unset": absent fields stay `None`, are
//! skipped on serialization, and never clobber a peer during a merge.
//! Unknown keys are preserved in flattened tables rather than rejected;
//! strict validation audits them after the fact.
//!
//! Scalar affordances of the label protocol are modelled explicitly:
//! [`Toggle`] for fields that may be a bool or a structure, CSV-or-list
//! coercion for list fields that accept `"a,b,c"`, and int-or-string for
//! numeric fields arriving as label values.

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::merge::{address_to_tree, deep_merge, lowercase_keys};
use crate::error::{Error, Result};

/// Untyped mapping used for passthrough subtrees and unknown keys
pub type Table = serde_json::Map<String, Value>;

/// A field that is either a bare toggle or a structured value.
///
/// `true` in a label becomes the empty structure upstream, but provider
/// files may carry real booleans; both shapes round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum Toggle<T> {
    /// Structured form
    Value(T),
    /// Bare boolean form
    Flag(bool),
}

impl<T: Serialize> Serialize for Toggle<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Flag(b) => serializer.serialize_bool(*b),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Toggle<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::Bool(b) => Ok(Self::Flag(b)),
            Value::String(s) if s == "true" => Ok(Self::Flag(true)),
            Value::String(s) if s == "false" => Ok(Self::Flag(false)),
            other => T::deserialize(other)
                .map(Self::Value)
                .map_err(D::Error::custom),
        }
    }
}

fn csv_or_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }
    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(raw.map(|r| match r {
        Raw::List(items) => items,
        Raw::Csv(s) => s.split(',').map(String::from).collect(),
    }))
}

fn int_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("not an integer: {n}"))),
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("not an integer: {s:?}"))),
        Some(other) => Err(D::Error::custom(format!("not an integer: {other}"))),
    }
}

fn lax_bool<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<bool>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) if s == "true" => Ok(Some(true)),
        Some(Value::String(s)) if s == "false" => Ok(Some(false)),
        Some(other) => Err(D::Error::custom(format!("not a boolean: {other}"))),
    }
}

fn push_unknowns(out: &mut Vec<String>, prefix: &str, extra: &Table) {
    for key in extra.keys() {
        out.push(format!("{prefix}{key}"));
    }
}

/// A certificate file pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertFile {
    /// Certificate path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certfile: Option<String>,
    /// Key path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyfile: Option<String>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// A certificate store entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreCert {
    /// Default certificate pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaultcertificate: Option<CertFile>,
    /// Default generated certificate settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaultgeneratedcert: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// A certificate with optional store assignment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsCert {
    /// Certificate path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certfile: Option<String>,
    /// Key path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyfile: Option<String>,
    /// Stores this certificate belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores: Option<Vec<String>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `tls` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Static certificates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificates: Option<Vec<TlsCert>>,
    /// Certificate stores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stores: Option<IndexMap<String, StoreCert>>,
    /// TLS options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// An HTTP router
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRouter {
    /// Entrypoint names (accepts CSV)
    #[serde(default, deserialize_with = "csv_or_list", skip_serializing_if = "Option::is_none")]
    pub entrypoints: Option<Vec<String>>,
    /// Routing rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Rule syntax version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rulesyntax: Option<String>,
    /// Middleware chain (accepts CSV)
    #[serde(default, deserialize_with = "csv_or_list", skip_serializing_if = "Option::is_none")]
    pub middlewares: Option<Vec<String>>,
    /// Target service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Router priority
    #[serde(default, deserialize_with = "int_or_string", skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// TLS settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Toggle<Table>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// One upstream server of a load balancer pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerUrl {
    /// Upstream URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// Single backend derived from a workload label.
///
/// Not part of the upstream configuration dialect: `host` and `ipaddress`
/// coexist so that emitters can pick either authority.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerServer {
    /// Backend container name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Backend container address, possibly empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<String>,
    /// Backend port
    #[serde(default, deserialize_with = "int_or_string", skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// A service load balancer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpLoadBalancer {
    /// Upstream pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerUrl>>,
    /// Label-derived single backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<LoadBalancerServer>,
    /// Sticky session settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sticky: Option<Table>,
    /// Health check settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Table>,
    /// Pass the client Host header upstream
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub passhostheader: Option<bool>,
    /// Servers transport name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverstransport: Option<String>,
    /// Response forwarding settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responseforwarding: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// An HTTP service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpService {
    /// Load balancer settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loadbalancer: Option<HttpLoadBalancer>,
    /// Weighted round robin settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted: Option<Table>,
    /// Mirroring settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirroring: Option<Table>,
    /// Failover settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

impl HttpService {
    /// Backend addresses of this service, in `host:port` form.
    ///
    /// The upstream pool comes first (scheme stripped), then the
    /// label-derived single backend; `ipaddr` selects whether the latter
    /// uses the recorded address or the container name.
    #[must_use]
    pub fn backend_urls(&self, ipaddr: bool) -> Vec<String> {
        let Some(lb) = &self.loadbalancer else {
            return Vec::new();
        };
        let mut backends = Vec::new();
        for server in lb.servers.iter().flatten() {
            if let Some(url) = &server.url {
                backends.push(url.strip_prefix("http://").unwrap_or(url).to_string());
            }
        }
        if let Some(server) = &lb.server {
            if let Some(port) = server.port {
                let host = if ipaddr {
                    server.ipaddress.as_deref().unwrap_or_default()
                } else {
                    server.host.as_deref().unwrap_or_default()
                };
                backends.push(format!("{host}:{port}"));
            }
        }
        backends
    }
}

/// The `compress` middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressMiddleware {
    /// Content types never compressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludedcontenttypes: Option<Vec<String>>,
    /// Content types compressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includedcontenttypes: Option<Vec<String>>,
    /// Minimum body size before compressing
    #[serde(default, deserialize_with = "int_or_string", skip_serializing_if = "Option::is_none")]
    pub minresponsebodybytes: Option<i64>,
    /// Default encoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaultencoding: Option<String>,
    /// Supported encodings (accepts CSV)
    #[serde(default, deserialize_with = "csv_or_list", skip_serializing_if = "Option::is_none")]
    pub encodings: Option<Vec<String>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `headers` middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadersMiddleware {
    /// Headers added to upstream requests, insertion-ordered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customrequestheaders: Option<IndexMap<String, String>>,
    /// Headers added to downstream responses, insertion-ordered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customresponseheaders: Option<IndexMap<String, String>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `stripprefix` middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripPrefixMiddleware {
    /// Literal prefixes to strip (accepts CSV)
    #[serde(default, deserialize_with = "csv_or_list", skip_serializing_if = "Option::is_none")]
    pub prefixes: Option<Vec<String>>,
    /// Keep a leading slash after stripping
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub forceslash: Option<bool>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `stripprefixregex` middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StripPrefixRegexMiddleware {
    /// Regex prefixes to strip (accepts CSV)
    #[serde(default, deserialize_with = "csv_or_list", skip_serializing_if = "Option::is_none")]
    pub regex: Option<Vec<String>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `addprefix` middleware settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddPrefixMiddleware {
    /// Prefix prepended to forwarded paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// An HTTP middleware, a tagged union by field presence.
///
/// The kinds the emitters translate get typed settings; the rest are
/// recognized and parsed but only ever reported as unsupported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpMiddleware {
    /// Prefix-adding rewrite
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addprefix: Option<AddPrefixMiddleware>,
    /// Basic authentication (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basicauth: Option<Table>,
    /// Request buffering (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffering: Option<Table>,
    /// Middleware chain (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Table>,
    /// Circuit breaker (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuitbreaker: Option<Table>,
    /// Response compression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<Toggle<CompressMiddleware>>,
    /// Content type auto-detection (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contenttype: Option<Toggle<Table>>,
    /// Digest authentication (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digestauth: Option<Table>,
    /// Custom error pages (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Table>,
    /// Forward authentication (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwardauth: Option<Table>,
    /// gRPC-Web bridging (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpcweb: Option<Table>,
    /// Custom request/response headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HeadersMiddleware>,
    /// IP allow list, legacy spelling (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipwhitelist: Option<Table>,
    /// IP allow list (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipallowlist: Option<Table>,
    /// In-flight request limiting (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflightreq: Option<Table>,
    /// TLS client certificate passthrough (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passtlsclientcert: Option<Table>,
    /// Rate limiting (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratelimit: Option<Table>,
    /// Regex redirect (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirectregex: Option<Table>,
    /// Scheme redirect (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirectscheme: Option<Table>,
    /// Path replacement (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacepath: Option<Table>,
    /// Regex path replacement (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacepathregex: Option<Table>,
    /// Retrying (not translated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<Table>,
    /// Literal prefix stripping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripprefix: Option<StripPrefixMiddleware>,
    /// Regex prefix stripping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stripprefixregex: Option<StripPrefixRegexMiddleware>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `http` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Middlewares by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middlewares: Option<IndexMap<String, HttpMiddleware>>,
    /// Routers by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routers: Option<IndexMap<String, HttpRouter>>,
    /// Services by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<IndexMap<String, HttpService>>,
    /// Servers transports by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serverstransports: Option<IndexMap<String, Table>>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// HTTP settings of an entrypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointHttp {
    /// Entry redirections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirections: Option<Table>,
    /// Encode query semicolons
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub encodequerysemicolons: Option<bool>,
    /// Entry middlewares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middlewares: Option<Vec<String>>,
    /// Entry TLS settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// HTTP/2 settings of an entrypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointHttp2 {
    /// Maximum concurrent streams
    #[serde(default, deserialize_with = "int_or_string", skip_serializing_if = "Option::is_none")]
    pub maxconcurrentstreams: Option<i64>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// HTTP/3 settings of an entrypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointHttp3 {
    /// Advertised UDP port
    #[serde(default, deserialize_with = "int_or_string", skip_serializing_if = "Option::is_none")]
    pub advertisedport: Option<i64>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// A listener entrypoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrypointConfig {
    /// Listen address, e.g. `:80`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// HTTP settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<EntrypointHttp>,
    /// HTTP/2 settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http2: Option<EntrypointHttp2>,
    /// HTTP/3 settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http3: Option<Toggle<EntrypointHttp3>>,
    /// UDP settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<Table>,
    /// Allow ACME bypass
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub allowacmebypass: Option<bool>,
    /// Reuse the listening port
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub reuseport: Option<bool>,
    /// Use as default entrypoint
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub asdefault: Option<bool>,
    /// Forwarded headers settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwardedheaders: Option<Table>,
    /// Transport settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Table>,
    /// Proxy protocol settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxyprotocol: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The file provider settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileProvider {
    /// Single configuration file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Configuration directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// Watch for changes
    #[serde(default, deserialize_with = "lax_bool", skip_serializing_if = "Option::is_none")]
    pub watch: Option<bool>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The `providers` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Docker provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<Toggle<Table>>,
    /// File provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileProvider>,
    /// Swarm provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swarm: Option<Table>,
    /// Kubernetes CRD provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetescrd: Option<Table>,
    /// Kubernetes ingress provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetesingress: Option<Toggle<Table>>,
    /// Kubernetes gateway provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetesgateway: Option<Toggle<Table>>,
    /// Consul catalog provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consulcatalog: Option<Toggle<Table>>,
    /// Nomad provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nomad: Option<Toggle<Table>>,
    /// ECS provider settings or toggle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecs: Option<Toggle<Table>>,
    /// Consul KV provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consul: Option<Table>,
    /// Etcd provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etcd: Option<Table>,
    /// Zookeeper provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zookeeper: Option<Table>,
    /// Redis provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<Table>,
    /// HTTP provider settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

/// The merged ingress configuration tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraefikConfig {
    /// TLS section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
    /// HTTP section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpConfig>,
    /// TCP section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tcp: Option<Table>,
    /// UDP section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp: Option<Table>,
    /// Entrypoints by name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoints: Option<IndexMap<String, EntrypointConfig>>,
    /// Providers section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<ProviderConfig>,
    /// API section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<Table>,
    /// Access log section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accesslog: Option<Table>,
    /// Experimental section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Table>,
    /// Log section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Table>,
    /// Metrics section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Table>,
    /// Tracing section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<Table>,
    /// Certificate resolvers, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificatesresolvers: Option<Table>,
    /// SPIFFE section, passthrough
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spiffe: Option<Table>,
    /// Unrecognized keys, preserved verbatim
    #[serde(flatten, default, skip_serializing_if = "Table::is_empty")]
    pub extra: Table,
}

impl TraefikConfig {
    /// Validate a raw value tree, lowercasing keys first (lenient)
    pub fn validate(value: Value) -> Result<Self> {
        let lowered = lowercase_keys(value);
        serde_json::from_value(lowered).map_err(|e| Error::schema(e.to_string()))
    }

    /// Validate a raw value tree, rejecting unrecognized keys
    pub fn validate_strict(value: Value) -> Result<Self> {
        let config = Self::validate(value)?;
        let unknowns = config.unknown_paths();
        if unknowns.is_empty() {
            Ok(config)
        } else {
            Err(Error::schema(format!(
                "unrecognized keys: {}",
                unknowns.join(", ")
            )))
        }
    }

    /// Parse a YAML document into a config tree
    pub fn from_yaml(text: &str) -> Result<Self> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| Error::yaml("traefik config", e))?;
        Self::validate(value)
    }

    /// Parse a TOML document into a config tree
    pub fn from_toml(text: &str) -> Result<Self> {
        let value: Value =
            toml::from_str(text).map_err(|e| Error::toml("traefik config", e.to_string()))?;
        Self::validate(value)
    }

    /// Canonical value-tree form, with unset and null fields omitted
    pub fn to_value(&self) -> Result<Value> {
        let value = serde_json::to_value(self).map_err(|e| Error::json("traefik config", e))?;
        Ok(strip_nulls(value))
    }

    /// Deep-merge another tree onto this one, the other side winning
    pub fn merge(&self, other: &Self) -> Result<Self> {
        let merged = deep_merge(self.to_value()?, other.to_value()?);
        Self::validate(merged)
    }

    /// Set one leaf by address, creating intermediate mappings
    pub fn set_by_address(&self, address: &[&str], value: Value) -> Result<Self> {
        let tree = address_to_tree(address, value);
        let merged = deep_merge(self.to_value()?, lowercase_keys(tree));
        Self::validate(merged)
    }

    /// Whether no field has been set
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.to_value()? == Value::Object(Table::new()))
    }

    /// Dotted paths of every key that landed outside the recognized schema
    #[must_use]
    pub fn unknown_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        push_unknowns(&mut out, "", &self.extra);
        if let Some(tls) = &self.tls {
            push_unknowns(&mut out, "tls.", &tls.extra);
        }
        if let Some(providers) = &self.providers {
            push_unknowns(&mut out, "providers.", &providers.extra);
            if let Some(file) = &providers.file {
                push_unknowns(&mut out, "providers.file.", &file.extra);
            }
        }
        if let Some(entrypoints) = &self.entrypoints {
            for (name, ep) in entrypoints {
                push_unknowns(&mut out, &format!("entrypoints.{name}."), &ep.extra);
            }
        }
        if let Some(http) = &self.http {
            push_unknowns(&mut out, "http.", &http.extra);
            for (name, router) in http.routers.iter().flatten() {
                push_unknowns(&mut out, &format!("http.routers.{name}."), &router.extra);
            }
            for (name, service) in http.services.iter().flatten() {
                push_unknowns(&mut out, &format!("http.services.{name}."), &service.extra);
                if let Some(lb) = &service.loadbalancer {
                    push_unknowns(
                        &mut out,
                        &format!("http.services.{name}.loadbalancer."),
                        &lb.extra,
                    );
                }
            }
            for (name, middleware) in http.middlewares.iter().flatten() {
                push_unknowns(
                    &mut out,
                    &format!("http.middlewares.{name}."),
                    &middleware.extra,
                );
            }
        }
        out
    }
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Table::new();
            for (key, val) in map {
                if val.is_null() {
                    continue;
                }
                out.insert(key, strip_nulls(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}
