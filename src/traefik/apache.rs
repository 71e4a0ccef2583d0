//! Apache-family proxy configuration emitter.
//!
//! Works at the line-of-text level: the route sections are rendered as
//! `<Location>` / `<Proxy>` blocks and spliced into a parsed or
//! synthesized virtual host immediately before `</VirtualHost>`, indented
//! to match the closing tag.

use tracing::info;
use url::Url;

use super::model::{HttpMiddleware, Toggle, TraefikConfig};
use super::rule::{
    collect_rewrite, compress_enabled, parse_rule, resolve_middlewares, unsupported_kinds,
    LocationKey,
};
use super::EmitOptions;
use crate::error::{Error, Result};

fn minimal_template(port: u16, host: &str) -> String {
    format!(
        "<VirtualHost *:{port}>\n    ServerName {host}\n    ErrorLog /dev/stderr\n</VirtualHost>\n"
    )
}

fn compress_lines(compress: &Toggle<super::model::CompressMiddleware>) -> Vec<String> {
    if !compress_enabled(compress) {
        return Vec::new();
    }
    if let Toggle::Value(settings) = compress {
        if let Some(types) = &settings.includedcontenttypes {
            return vec![format!("AddOutputFilterByType DEFLATE {}", types.join(" "))];
        }
    }
    vec!["SetOutputFilter DEFLATE".to_string()]
}

fn middleware_lines(middlewares: &[&HttpMiddleware], missing: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for name in missing {
        lines.push(format!("# middleware not found: {name}"));
    }
    for middleware in middlewares {
        if let Some(compress) = &middleware.compress {
            lines.extend(compress_lines(compress));
        }
        if let Some(headers) = &middleware.headers {
            for (key, value) in headers.customrequestheaders.iter().flatten() {
                lines.push(format!("RequestHeader append {key} {value}"));
            }
            for (key, value) in headers.customresponseheaders.iter().flatten() {
                lines.push(format!("Header append {key} {value}"));
            }
        }
        for kind in unsupported_kinds(middleware) {
            lines.push(format!("# not supported: {kind}"));
        }
    }
    if let Some(rewrite) = collect_rewrite(middlewares) {
        lines.push("RewriteEngine On".to_string());
        lines.push(format!("RewriteRule {} {}", rewrite.pattern, rewrite.replacement));
    }
    lines
}

/// Splice the generated route lines into a virtual host, immediately
/// before `</VirtualHost>` and indented like the closing tag
#[must_use]
pub fn insert_into_vhost(base: &[String], routes: &[String]) -> Vec<String> {
    let (insert_at, indent) = match base.iter().position(|l| l.trim() == "</VirtualHost>") {
        Some(index) => {
            // match the body indentation of the virtual host
            let indent = index
                .checked_sub(1)
                .map(|i| base[i].len() - base[i].trim_start().len())
                .unwrap_or(0);
            (index, indent)
        }
        None => (base.len(), 0),
    };
    let mut out = Vec::with_capacity(base.len() + routes.len() + 2);
    out.extend_from_slice(&base[..insert_at]);
    out.push(String::new());
    let pad = " ".repeat(indent);
    out.extend(routes.iter().map(|l| format!("{pad}{l}")));
    out.push(String::new());
    out.extend_from_slice(&base[insert_at..]);
    out
}

/// Compile an ingress tree into an Apache virtual-host configuration.
///
/// Multi-backend services become `<Proxy balancer://name>` pools; routers
/// and services pair by key intersection, iterated in sorted order.
pub fn traefik_to_apache(config: &TraefikConfig, options: &EmitOptions) -> Result<String> {
    let base = match &options.base_conf {
        Some(text) => text.clone(),
        None => {
            let url = Url::parse(&options.server_url)
                .map_err(|e| Error::parse("server url", format!("{}: {e}", options.server_url)))?;
            minimal_template(
                url.port().unwrap_or(80),
                url.host_str().unwrap_or("localhost"),
            )
        }
    };

    let http = config
        .http
        .as_ref()
        .ok_or_else(|| Error::schema("http not defined"))?;
    let empty_routers = Default::default();
    let empty_services = Default::default();
    let empty_middlewares = Default::default();
    let routers = http.routers.as_ref().unwrap_or(&empty_routers);
    let services = http.services.as_ref().unwrap_or(&empty_services);
    let middlewares = http.middlewares.as_ref().unwrap_or(&empty_middlewares);

    let mut names: Vec<&String> = routers.keys().filter(|k| services.contains_key(*k)).collect();
    names.sort();

    let mut routes = Vec::new();
    for name in names {
        let router = &routers[name.as_str()];
        let service = &services[name.as_str()];
        let rule = router.rule.as_deref().unwrap_or_default();
        let location_keys = parse_rule(rule);
        let middleware_names = router.middlewares.clone().unwrap_or_default();
        let (resolved, missing) = resolve_middlewares(&middleware_names, middlewares);
        let backend_urls = service.backend_urls(options.ipaddr);

        if backend_urls.is_empty() {
            info!("no backend for route {name}");
            routes.push(format!("# no backend for {name}"));
            continue;
        }
        let backend_to = if backend_urls.len() == 1 {
            format!("http://{}", backend_urls[0])
        } else {
            routes.push(format!("<Proxy balancer://{name}>"));
            for backend in &backend_urls {
                routes.push(format!("  BalancerMember http://{backend}"));
            }
            routes.push("</Proxy>".to_string());
            format!("balancer://{name}")
        };

        let body = middleware_lines(&resolved, &missing);
        for key in &location_keys {
            match key {
                LocationKey::Prefix(prefix) => routes.push(format!("<Location {prefix}>")),
                LocationKey::Exact(path) => {
                    routes.push(format!("<Location ~ \"^{}$\">", regex::escape(path)));
                }
            }
            routes.push(format!("  ProxyPass {backend_to}"));
            routes.push(format!("  ProxyPassReverse {backend_to}"));
            routes.extend(body.iter().map(|l| format!("  {l}")));
            routes.push("</Location>".to_string());
        }
    }

    let base_lines: Vec<String> = base.lines().map(String::from).collect();
    let mut lines = insert_into_vhost(&base_lines, &routes);
    lines.push(String::new());
    Ok(lines.join("\n"))
}
