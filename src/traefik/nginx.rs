//! Nginx-family proxy configuration emitter.
//!
//! Works on a directive AST (`{directive, args, block, comment}`) so a
//! user-supplied base configuration can be parsed, extended with the
//! routes derived from the ingress tree, and serialized back. The parser
//! recognizes the subset of nginx syntax the base configurations use:
//! simple and block directives, quoted arguments, and `#` comments.
//! Emitted text parses back to the same AST and re-emits byte-identically.

use tracing::info;
use url::Url;

use super::model::{HttpMiddleware, Toggle, TraefikConfig};
use super::rule::{collect_rewrite, compress_enabled, parse_rule, resolve_middlewares, unsupported_kinds};
use super::EmitOptions;
use crate::error::{Error, Result};

/// One nginx configuration directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Directive name, `#` for comment nodes
    pub directive: String,
    /// Arguments in source order
    pub args: Vec<String>,
    /// Nested block, when this is a block directive
    pub block: Option<Vec<Directive>>,
    /// Comment text, for comment nodes
    pub comment: Option<String>,
}

impl Directive {
    /// Create a simple directive
    #[must_use]
    pub fn new(directive: impl Into<String>, args: &[&str]) -> Self {
        Self {
            directive: directive.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            block: None,
            comment: None,
        }
    }

    /// Create a block directive
    #[must_use]
    pub fn with_block(directive: impl Into<String>, args: &[&str], block: Vec<Directive>) -> Self {
        Self {
            block: Some(block),
            ..Self::new(directive, args)
        }
    }

    /// Create a comment node
    #[must_use]
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            directive: "#".to_string(),
            args: Vec::new(),
            block: None,
            comment: Some(text.into()),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semi,
    Comment(String),
}

fn tokenize(text: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                chars.next();
                let mut comment = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    comment.push(c);
                    chars.next();
                }
                tokens.push(Token::Comment(comment));
            }
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ';' => {
                chars.next();
                tokens.push(Token::Semi);
            }
            '"' | '\'' => {
                let quote = ch;
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(c) if c == quote || c == '\\' => word.push(c),
                            Some(c) => {
                                word.push('\\');
                                word.push(c);
                            }
                            None => {
                                return Err(Error::parse("nginx config", "unterminated escape"))
                            }
                        },
                        Some(c) if c == quote => break,
                        Some(c) => word.push(c),
                        None => return Err(Error::parse("nginx config", "unterminated string")),
                    }
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"' | '\'') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn parse_tokens(
    tokens: &mut std::iter::Peekable<std::vec::IntoIter<Token>>,
    nested: bool,
) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    loop {
        match tokens.next() {
            None => {
                if nested {
                    return Err(Error::parse("nginx config", "unclosed block"));
                }
                return Ok(directives);
            }
            Some(Token::Close) => {
                if nested {
                    return Ok(directives);
                }
                return Err(Error::parse("nginx config", "unexpected '}'"));
            }
            Some(Token::Comment(text)) => directives.push(Directive::comment(text)),
            Some(Token::Word(name)) => {
                let mut args = Vec::new();
                loop {
                    match tokens.next() {
                        Some(Token::Word(arg)) => args.push(arg),
                        Some(Token::Semi) => {
                            directives.push(Directive {
                                directive: name,
                                args,
                                block: None,
                                comment: None,
                            });
                            break;
                        }
                        Some(Token::Open) => {
                            let block = parse_tokens(tokens, true)?;
                            directives.push(Directive {
                                directive: name,
                                args,
                                block: Some(block),
                                comment: None,
                            });
                            break;
                        }
                        Some(Token::Comment(_)) => {
                            return Err(Error::parse(
                                "nginx config",
                                format!("comment inside directive '{name}'"),
                            ));
                        }
                        Some(Token::Close) | None => {
                            return Err(Error::parse(
                                "nginx config",
                                format!("directive '{name}' missing ';'"),
                            ));
                        }
                    }
                }
            }
            Some(Token::Open | Token::Semi) => {
                return Err(Error::parse("nginx config", "directive name expected"));
            }
        }
    }
}

/// Parse nginx configuration text into a directive tree
pub fn parse_config(text: &str) -> Result<Vec<Directive>> {
    let mut tokens = tokenize(text)?.into_iter().peekable();
    parse_tokens(&mut tokens, false)
}

fn quote_arg(arg: &str) -> String {
    let needs_quoting = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '#' | '"' | '\''));
    if !needs_quoting {
        return arg.to_string();
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn build_into(out: &mut String, directives: &[Directive], depth: usize) {
    for directive in directives {
        for _ in 0..depth {
            out.push_str("    ");
        }
        if directive.directive == "#" {
            out.push('#');
            out.push_str(directive.comment.as_deref().unwrap_or_default());
            out.push('\n');
            continue;
        }
        out.push_str(&directive.directive);
        for arg in &directive.args {
            out.push(' ');
            out.push_str(&quote_arg(arg));
        }
        match &directive.block {
            Some(block) => {
                out.push_str(" {\n");
                build_into(out, block, depth + 1);
                for _ in 0..depth {
                    out.push_str("    ");
                }
                out.push_str("}\n");
            }
            None => out.push_str(";\n"),
        }
    }
}

/// Serialize a directive tree to configuration text
#[must_use]
pub fn build_config(directives: &[Directive]) -> String {
    let mut out = String::new();
    build_into(&mut out, directives, 0);
    out
}

/// The built-in minimal base configuration
#[must_use]
pub fn minimal_template(port: u16, host: &str) -> Vec<Directive> {
    vec![
        Directive::new("user", &["nginx"]),
        Directive::new("worker_processes", &["auto"]),
        Directive::new("error_log", &["/dev/stderr", "notice"]),
        Directive::with_block(
            "events",
            &[],
            vec![Directive::new("worker_connections", &["512"])],
        ),
        Directive::with_block(
            "http",
            &[],
            vec![Directive::with_block(
                "server",
                &[],
                vec![
                    Directive::new("listen", &[port.to_string().as_str(), "default_server"]),
                    Directive::new("server_name", &[host]),
                ],
            )],
        ),
    ]
}

fn find_server_block_mut<'a>(
    conf: &'a mut [Directive],
    server_name: &str,
) -> Option<&'a mut Vec<Directive>> {
    for http in conf.iter_mut().filter(|d| d.directive == "http") {
        let Some(http_block) = http.block.as_mut() else {
            continue;
        };
        for server in http_block.iter_mut().filter(|d| d.directive == "server") {
            let Some(server_block) = server.block.as_mut() else {
                continue;
            };
            let matches = server_block.iter().any(|d| {
                d.directive == "server_name" && d.args.iter().any(|a| a == server_name)
            });
            if matches {
                return Some(server_block);
            }
        }
    }
    None
}

fn compress_directives(compress: &Toggle<super::model::CompressMiddleware>) -> Vec<Directive> {
    if !compress_enabled(compress) {
        return Vec::new();
    }
    let mut out = vec![Directive::new("gzip", &["on"])];
    if let Toggle::Value(settings) = compress {
        if let Some(types) = &settings.includedcontenttypes {
            let args: Vec<&str> = types.iter().map(String::as_str).collect();
            out.push(Directive::new("gzip_types", &args));
        }
        if let Some(min) = settings.minresponsebodybytes {
            out.push(Directive::new("gzip_min_length", &[min.to_string().as_str()]));
        }
    }
    out
}

fn middleware_directives(middlewares: &[&HttpMiddleware], missing: &[String]) -> Vec<Directive> {
    let mut out = Vec::new();
    for name in missing {
        out.push(Directive::comment(format!(" middleware not found: {name}")));
    }
    for middleware in middlewares {
        if let Some(compress) = &middleware.compress {
            out.extend(compress_directives(compress));
        }
        if let Some(headers) = &middleware.headers {
            for (key, value) in headers.customrequestheaders.iter().flatten() {
                out.push(Directive::new("proxy_set_header", &[key.as_str(), value.as_str()]));
            }
            for (key, value) in headers.customresponseheaders.iter().flatten() {
                out.push(Directive::new("add_header", &[key.as_str(), value.as_str()]));
            }
        }
        for kind in unsupported_kinds(middleware) {
            out.push(Directive::comment(format!(" not supported: {kind}")));
        }
    }
    if let Some(rewrite) = collect_rewrite(middlewares) {
        out.push(Directive::new(
            "rewrite",
            &[rewrite.pattern.as_str(), rewrite.replacement.as_str(), "break"],
        ));
    }
    out
}

fn parse_listener(server_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(server_url)
        .map_err(|e| Error::parse("server url", format!("{server_url}: {e}")))?;
    let host = url.host_str().unwrap_or("localhost").to_string();
    let port = url.port().unwrap_or(80);
    Ok((host, port))
}

/// Compile an ingress tree into nginx configuration text.
///
/// Routes are attached to the `http.server` block whose `server_name`
/// matches the host of `options.server_url`; routers and services pair by
/// key intersection, iterated in sorted order.
pub fn traefik_to_nginx(config: &TraefikConfig, options: &EmitOptions) -> Result<String> {
    let (host, port) = parse_listener(&options.server_url)?;
    let mut conf = match &options.base_conf {
        Some(text) => parse_config(text)?,
        None => minimal_template(port, &host),
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

    let mut additions = Vec::new();
    for name in names {
        let router = &routers[name.as_str()];
        let service = &services[name.as_str()];
        let rule = router.rule.as_deref().unwrap_or_default();
        let location_keys = parse_rule(rule);
        let middleware_names = router.middlewares.clone().unwrap_or_default();
        let (resolved, missing) = resolve_middlewares(&middleware_names, middlewares);
        let backend_urls = service.backend_urls(options.ipaddr);

        let keys_summary: Vec<String> = location_keys.iter().map(|k| k.summary()).collect();
        additions.push(Directive::comment(format!(
            " {name}: {} -> {}",
            keys_summary.join(", "),
            backend_urls.join(", ")
        )));
        if backend_urls.is_empty() {
            info!("no backend for route {name}");
            additions.push(Directive::comment(format!(" no backend for {name}")));
            continue;
        }
        let backend = if backend_urls.len() > 1 {
            info!("multiple backend urls: {backend_urls:?}");
            additions.push(Directive::with_block(
                "upstream",
                &[name.as_str()],
                backend_urls
                    .iter()
                    .map(|u| Directive::new("server", &[u.as_str()]))
                    .collect(),
            ));
            name.clone()
        } else {
            backend_urls[0].clone()
        };

        let target = format!("http://{backend}");
        let mut body = vec![Directive::new("proxy_pass", &[target.as_str()])];
        body.extend(middleware_directives(&resolved, &missing));
        for key in &location_keys {
            additions.push(Directive {
                directive: "location".to_string(),
                args: key.args(),
                block: Some(body.clone()),
                comment: None,
            });
        }
    }

    let server = find_server_block_mut(&mut conf, &host)
        .ok_or_else(|| Error::parse("nginx config", format!("no server block for {host}")))?;
    server.extend(additions);
    Ok(build_config(&conf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_directives() {
        let conf = parse_config("user nginx;\nworker_processes auto;\n").unwrap();
        assert_eq!(conf.len(), 2);
        assert_eq!(conf[0], Directive::new("user", &["nginx"]));
    }

    #[test]
    fn test_parse_nested_blocks() {
        let conf = parse_config("http { server { listen 80; server_name localhost; } }").unwrap();
        let server = conf[0].block.as_ref().unwrap();
        let inner = server[0].block.as_ref().unwrap();
        assert_eq!(inner[0], Directive::new("listen", &["80"]));
        assert_eq!(inner[1], Directive::new("server_name", &["localhost"]));
    }

    #[test]
    fn test_parse_comments_and_quotes() {
        let conf = parse_config("# hello\nlog_format main \"a b\";\n").unwrap();
        assert_eq!(conf[0], Directive::comment(" hello"));
        assert_eq!(conf[1].args, vec!["a b"]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_config("http {").is_err());
        assert!(parse_config("}").is_err());
        assert!(parse_config("user nginx").is_err());
    }

    #[test]
    fn test_build_round_trip_byte_identical() {
        let template = minimal_template(80, "localhost");
        let text = build_config(&template);
        let reparsed = parse_config(&text).unwrap();
        assert_eq!(reparsed, template);
        assert_eq!(build_config(&reparsed), text);
    }

    #[test]
    fn test_quote_arg_only_when_needed() {
        assert_eq!(quote_arg("plain"), "plain");
        assert_eq!(quote_arg("with space"), "\"with space\"");
        assert_eq!(quote_arg("semi;colon"), "\"semi;colon\"");
    }

    fn sample_config() -> TraefikConfig {
        TraefikConfig::validate(json!({
            "http": {
                "routers": {
                    "r1": {
                        "rule": "PathPrefix(`/hello`)",
                        "middlewares": ["m1", "m2", "m3"],
                    },
                },
                "services": {
                    "r1": {
                        "loadbalancer": {"server": {"host": "hostname", "ipaddress": "", "port": 9999}},
                    },
                },
                "middlewares": {
                    "m1": {"stripprefix": {"prefixes": ["/hello"]}},
                    "m2": {"compress": {
                        "includedcontenttypes": ["text/html", "text/plain"],
                        "minresponsebodybytes": 1024,
                    }},
                    "m3": {"headers": {
                        "customrequestheaders": {"x-req": "v1"},
                        "customresponseheaders": {"x-res": "v1"},
                    }},
                },
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_emit_full_route() {
        let text = traefik_to_nginx(&sample_config(), &EmitOptions::default()).unwrap();
        assert!(text.contains("location /hello {"));
        assert!(text.contains("proxy_pass http://hostname:9999;"));
        assert!(text.contains("rewrite /hello(.*) /$1 break;"));
        assert!(text.contains("gzip on;"));
        assert!(text.contains("gzip_types text/html text/plain;"));
        assert!(text.contains("gzip_min_length 1024;"));
        assert!(text.contains("proxy_set_header x-req v1;"));
        assert!(text.contains("add_header x-res v1;"));
        assert!(text.contains("# r1: /hello -> hostname:9999"));
    }

    #[test]
    fn test_emit_output_reparses_byte_identical() {
        let text = traefik_to_nginx(&sample_config(), &EmitOptions::default()).unwrap();
        let ast = parse_config(&text).unwrap();
        assert_eq!(build_config(&ast), text);
    }

    #[test]
    fn test_emit_upstream_for_multiple_backends() {
        let config = TraefikConfig::validate(json!({
            "http": {
                "routers": {"r2": {"rule": "PathPrefix(`/x`)"}},
                "services": {"r2": {"loadbalancer": {"servers": [
                    {"url": "http://hostname1:9999"},
                    {"url": "http://hostname2:9999"},
                ]}}},
            },
        }))
        .unwrap();
        let text = traefik_to_nginx(&config, &EmitOptions::default()).unwrap();
        assert!(text.contains("upstream r2 {"));
        assert!(text.contains("server hostname1:9999;"));
        assert!(text.contains("server hostname2:9999;"));
        assert!(text.contains("proxy_pass http://r2;"));
    }

    #[test]
    fn test_emit_location_count_matches_rule_alternatives() {
        let config = TraefikConfig::validate(json!({
            "http": {
                "routers": {"r": {"rule": "PathPrefix(`/a`)||Path(`/b`)||Host(`skip`)"}},
                "services": {"r": {"loadbalancer": {"server": {"host": "h", "port": 1}}}},
            },
        }))
        .unwrap();
        let text = traefik_to_nginx(&config, &EmitOptions::default()).unwrap();
        assert_eq!(text.matches("location ").count(), 2);
        assert!(text.contains("location /a {"));
        assert!(text.contains("location = /b {"));
    }

    #[test]
    fn test_emit_into_user_base_conf() {
        let base = "http {\n    server {\n        listen 8080;\n        server_name proxy.internal;\n    }\n}\n";
        let config = TraefikConfig::validate(json!({
            "http": {
                "routers": {"r": {"rule": "Path(`/`)"}},
                "services": {"r": {"loadbalancer": {"server": {"host": "h", "port": 1}}}},
            },
        }))
        .unwrap();
        let options = EmitOptions {
            base_conf: Some(base.to_string()),
            server_url: "http://proxy.internal:8080/".to_string(),
            ipaddr: false,
        };
        let text = traefik_to_nginx(&config, &options).unwrap();
        assert!(text.contains("server_name proxy.internal;"));
        assert!(text.contains("location = / {"));
    }

    #[test]
    fn test_emit_requires_http_section() {
        let err = traefik_to_nginx(&TraefikConfig::default(), &EmitOptions::default()).unwrap_err();
        assert_eq!(err.category(), "schema");
    }

    #[test]
    fn test_emit_ipaddr_switches_authority() {
        let config = TraefikConfig::validate(json!({
            "http": {
                "routers": {"r": {"rule": "Path(`/`)"}},
                "services": {"r": {"loadbalancer": {"server": {"host": "ctn", "ipaddress": "10.0.0.9", "port": 80}}}},
            },
        }))
        .unwrap();
        let options = EmitOptions {
            ipaddr: true,
            ..Default::default()
        };
        let text = traefik_to_nginx(&config, &options).unwrap();
        assert!(text.contains("proxy_pass http://10.0.0.9:80;"));
    }

    #[test]
    fn test_unresolved_middleware_leaves_comment() {
        let config = TraefikConfig::validate(json!({
            "http": {
                "routers": {"r": {"rule": "Path(`/`)", "middlewares": "ghost@file"}},
                "services": {"r": {"loadbalancer": {"server": {"host": "h", "port": 1}}}},
            },
        }))
        .unwrap();
        let text = traefik_to_nginx(&config, &EmitOptions::default()).unwrap();
        assert!(text.contains("# middleware not found: ghost@file"));
    }
}
