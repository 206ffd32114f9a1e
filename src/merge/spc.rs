//! Steampipe connection (`.spc`) merge operations
//!
//! A connection file is a sequence of HCL blocks:
//!
//! ```text
//! # managed-by: cfgweave
//! connection "aws_prod_account" {
//!   plugin  = "aws"
//!   profile = "prod-account/AdminAccess"
//!   regions = ["*"]
//! }
//! ```
//!
//! Nothing in the block itself says who wrote it, so ownership is carried by
//! the sentinel comment directly above the block. Besides exact name
//! collisions, a user block is also superseded when it points at the same
//! AWS account as a generated block (the *account identifier*: the profile
//! up to the first `/`, normalized). Aggregator blocks
//! (`type = "aggregator"`) written by hand are never dropped.

use regex::Regex;

use crate::defaults::MANAGED_MARKER;
use crate::error::{Error, Result};
use crate::merge::{
    account_of_profile, flatten_fragments, is_banner_line, reconcile, render_document,
    take_leading_comments, take_marker, Fragment, MergeStats, Record,
};

/// Banner written at the top of every generated connection file
pub const SPC_BANNER: &str = "\
# This file is generated automatically by cfgweave. Do not edit managed blocks:
# they are replaced on every run. Connections without the managed-by marker
# are preserved as written.";

const AGGREGATOR_TYPE: &str = "aggregator";

const COMMENT_PREFIXES: &[&str] = &["#", "//"];

/// One `connection "<name>" { ... }` block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    pub plugin: Option<String>,
    pub profile: Option<String>,
    pub block_type: Option<String>,
    account: Option<String>,
    /// Rendered `key = value` pairs of a generated block.
    attributes: Vec<(String, String)>,
    /// Verbatim lines of a parsed block, its leading comments included.
    raw: Vec<String>,
    managed: bool,
}

impl Connection {
    fn generated(name: String) -> Self {
        Self {
            name,
            plugin: None,
            profile: None,
            block_type: None,
            account: None,
            attributes: Vec::new(),
            raw: Vec::new(),
            managed: true,
        }
    }

    /// A managed connection reading one AWS profile.
    pub fn for_profile(name: impl Into<String>, plugin: &str, profile: &str, regions: &[String]) -> Self {
        let mut connection = Self::generated(name.into());
        connection.plugin = Some(plugin.to_string());
        connection.profile = Some(profile.to_string());
        connection.account = Some(account_of_profile(profile));
        connection.attributes = vec![
            ("plugin".to_string(), hcl_string(plugin)),
            ("profile".to_string(), hcl_string(profile)),
            ("regions".to_string(), hcl_list(regions)),
        ];
        connection
    }

    /// A managed aggregator spanning the connections matched by `members`.
    pub fn aggregator(name: impl Into<String>, plugin: &str, members: &[String]) -> Self {
        let mut connection = Self::generated(name.into());
        connection.plugin = Some(plugin.to_string());
        connection.block_type = Some(AGGREGATOR_TYPE.to_string());
        connection.attributes = vec![
            ("plugin".to_string(), hcl_string(plugin)),
            ("type".to_string(), hcl_string(AGGREGATOR_TYPE)),
            ("connections".to_string(), hcl_list(members)),
        ];
        connection
    }

    /// Normalized account identifier of the block's profile.
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    fn into_lines(self) -> Vec<String> {
        if !self.raw.is_empty() {
            return self.raw;
        }
        let width = self
            .attributes
            .iter()
            .map(|(key, _)| key.len())
            .max()
            .unwrap_or(0);
        let mut lines = vec![format!("connection {} {{", hcl_string(&self.name))];
        lines.extend(
            self.attributes
                .iter()
                .map(|(key, value)| format!("  {:<width$} = {}", key, value, width = width)),
        );
        lines.push("}".to_string());
        lines
    }

    /// Marker plus block, ready to append to the document.
    pub fn render(&self) -> String {
        let mut lines = vec![MANAGED_MARKER.to_string()];
        lines.extend(self.clone().into_lines());
        lines.join("\n")
    }
}

impl Record for Connection {
    fn identity_key(&self) -> &str {
        &self.name
    }

    fn equivalence_key(&self) -> Option<&str> {
        self.account.as_deref()
    }

    fn is_aggregator(&self) -> bool {
        self.block_type.as_deref() == Some(AGGREGATOR_TYPE)
    }

    fn is_managed(&self) -> bool {
        self.managed
    }
}

/// Quote a string as an HCL string literal.
pub fn hcl_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Render a list of strings as an HCL tuple.
pub fn hcl_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| hcl_string(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Read a value that may be a quoted string; anything else is returned
/// trimmed as written.
fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(body) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let mut out = String::new();
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => break,
            _ => out.push(ch),
        }
    }
    out
}

/// Net change in brace depth for one line, ignoring braces inside strings
/// and comments.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '#' => break,
            '/' if chars.peek() == Some(&'/') => break,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Parse connection file content into text fragments and connections.
///
/// # Errors
///
/// Returns `Error::Merge` when a connection block is never closed.
pub fn parse_spc(content: &str) -> Result<Vec<Fragment<Connection>>> {
    let header = Regex::new(r#"^\s*connection\s+"((?:[^"\\]|\\.)*)"\s*\{"#)?;
    let attribute = Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(.*?)\s*$")?;

    let lines: Vec<&str> = content.lines().collect();
    let mut fragments = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        index += 1;

        if is_banner_line(SPC_BANNER, line) {
            continue;
        }

        let Some(captures) = header.captures(line) else {
            pending.push(line.to_string());
            continue;
        };

        let managed = take_marker(&mut pending, MANAGED_MARKER);
        let mut raw = if managed {
            Vec::new()
        } else {
            take_leading_comments(&mut pending, COMMENT_PREFIXES)
        };
        if !pending.is_empty() {
            fragments.push(Fragment::Text(std::mem::take(&mut pending)));
        }
        raw.push(line.to_string());

        let mut connection = Connection {
            name: unquote(&format!("\"{}\"", &captures[1])),
            plugin: None,
            profile: None,
            block_type: None,
            account: None,
            attributes: Vec::new(),
            raw,
            managed,
        };

        let mut depth = brace_delta(line);
        while depth > 0 {
            let Some(body_line) = lines.get(index) else {
                return Err(Error::Merge {
                    operation: "parse connection file".to_string(),
                    message: format!(
                        "connection \"{}\" is missing its closing brace",
                        connection.name
                    ),
                });
            };
            index += 1;

            if depth == 1 {
                if let Some(attr) = attribute.captures(body_line) {
                    let value = unquote(&attr[2]);
                    match &attr[1] {
                        "plugin" => connection.plugin = Some(value),
                        "profile" => connection.profile = Some(value),
                        "type" => connection.block_type = Some(value),
                        _ => {}
                    }
                }
            }

            depth += brace_delta(body_line);
            connection.raw.push(body_line.to_string());
        }

        connection.account = connection.profile.as_deref().map(account_of_profile);
        fragments.push(Fragment::Record(connection));
    }

    if !pending.is_empty() {
        fragments.push(Fragment::Text(pending));
    }

    Ok(fragments)
}

/// Merge generated connections into previous file content.
pub fn merge_spc(previous: &str, generated: &[Connection]) -> Result<(String, MergeStats)> {
    let reconciled = reconcile(parse_spc(previous)?, generated);
    let retained = flatten_fragments(reconciled.fragments, Connection::into_lines);
    let blocks: Vec<String> = generated.iter().map(Connection::render).collect();
    Ok((
        render_document(SPC_BANNER, &retained, &blocks),
        reconciled.stats,
    ))
}

/// Connection name for a profile: prefix plus normalized account identifier.
///
/// # Examples
///
/// ```
/// use cfgweave::merge::spc::connection_name;
///
/// assert_eq!(connection_name("aws_", "prod-account/AdminAccess"), "aws_prod_account");
/// ```
pub fn connection_name(prefix: &str, profile: &str) -> String {
    format!("{}{}", prefix, account_of_profile(profile))
}
