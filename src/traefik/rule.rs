//! Router rule parsing and middleware chain resolution.
//!
//! Rules are split on the literal `||` token; each alternative must be
//! exactly a `PathPrefix(`…`)` or `Path(`…`)` expression. Anything else is
//! logged and skipped so the remaining alternatives still emit.

use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{info, warn};

use super::model::{HttpMiddleware, Toggle};

/// A location key produced by rule parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationKey {
    /// Prefix match
    Prefix(String),
    /// Exact path match
    Exact(String),
}

impl LocationKey {
    /// Argument form used by the nginx `location` directive
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Prefix(p) => vec![p.clone()],
            Self::Exact(p) => vec!["=".to_string(), p.clone()],
        }
    }

    /// Space-joined form used in route summary comments
    #[must_use]
    pub fn summary(&self) -> String {
        self.args().join(" ")
    }
}

fn prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^PathPrefix\(`(?P<prefix>[^`]+)`\)$").unwrap())
}

fn path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Path\(`(?P<path>[^`]+)`\)$").unwrap())
}

/// Parse a router rule into location keys, skipping unsupported alternatives
#[must_use]
pub fn parse_rule(rule: &str) -> Vec<LocationKey> {
    let mut keys = Vec::new();
    for alternative in rule.split("||") {
        if let Some(caps) = prefix_re().captures(alternative) {
            keys.push(LocationKey::Prefix(caps["prefix"].to_string()));
        } else if let Some(caps) = path_re().captures(alternative) {
            keys.push(LocationKey::Exact(caps["path"].to_string()));
        } else {
            info!("not supported rule: {alternative}");
        }
    }
    keys
}

/// Resolve a middleware name chain against the defined middlewares.
///
/// Names may carry a `@provider` suffix which is stripped before lookup.
/// Returns the resolved chain in source order plus the names that did not
/// resolve (reported as comments by the emitters).
#[must_use]
pub fn resolve_middlewares<'a>(
    names: &[String],
    defined: &'a IndexMap<String, HttpMiddleware>,
) -> (Vec<&'a HttpMiddleware>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        let bare = name.split('@').next().unwrap_or(name);
        match defined.get(bare) {
            Some(middleware) => resolved.push(middleware),
            None => {
                warn!("middleware not found: {name}");
                missing.push(name.clone());
            }
        }
    }
    (resolved, missing)
}

/// A prefix rewrite accumulated over a middleware chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteSpec {
    /// Match pattern: the joined strip alternation followed by `(.*)`
    pub pattern: String,
    /// Replacement: the add-prefix followed by `$1`
    pub replacement: String,
}

/// Fold strip/add prefix middlewares into a single rewrite, if any apply.
///
/// Literal prefixes are regex-escaped; regex prefixes are taken verbatim.
/// Later `addprefix` entries override earlier ones; the default add-prefix
/// is `/` and produces no rewrite on its own.
#[must_use]
pub fn collect_rewrite(middlewares: &[&HttpMiddleware]) -> Option<RewriteSpec> {
    let mut strip = Vec::new();
    let mut add_prefix = "/".to_string();
    for middleware in middlewares {
        if let Some(prefixes) = middleware
            .stripprefix
            .as_ref()
            .and_then(|s| s.prefixes.as_ref())
        {
            strip.extend(prefixes.iter().map(|p| regex::escape(p)));
        }
        if let Some(patterns) = middleware
            .stripprefixregex
            .as_ref()
            .and_then(|s| s.regex.as_ref())
        {
            strip.extend(patterns.iter().cloned());
        }
        if let Some(prefix) = middleware.addprefix.as_ref().and_then(|a| a.prefix.as_ref()) {
            add_prefix = prefix.clone();
        }
    }
    if strip.is_empty() && add_prefix == "/" {
        return None;
    }
    Some(RewriteSpec {
        pattern: format!("{}(.*)", strip.join("|")),
        replacement: format!("{add_prefix}$1"),
    })
}

/// Names of recognized middleware kinds present on this instance that no
/// dialect translates
#[must_use]
pub fn unsupported_kinds(middleware: &HttpMiddleware) -> Vec<&'static str> {
    let mut kinds = Vec::new();
    macro_rules! check {
        ($field:ident) => {
            if middleware.$field.is_some() {
                kinds.push(stringify!($field));
            }
        };
    }
    check!(basicauth);
    check!(buffering);
    check!(chain);
    check!(circuitbreaker);
    check!(contenttype);
    check!(digestauth);
    check!(errors);
    check!(forwardauth);
    check!(grpcweb);
    check!(ipwhitelist);
    check!(ipallowlist);
    check!(inflightreq);
    check!(passtlsclientcert);
    check!(ratelimit);
    check!(redirectregex);
    check!(redirectscheme);
    check!(replacepath);
    check!(replacepathregex);
    check!(retry);
    kinds
}

/// Whether the compress middleware is enabled at all
#[must_use]
pub fn compress_enabled(compress: &Toggle<super::model::CompressMiddleware>) -> bool {
    !matches!(compress, Toggle::Flag(false))
}
