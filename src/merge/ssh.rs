//! SSH client config merge operations
//!
//! SSH config has no room for ownership markers that OpenSSH would not
//! complain about in every tool that re-reads the file, so host blocks are
//! tracked by identity: a generated `Host` whose pattern matches an existing
//! block updates that block in place. Only the directives the generator
//! controls are rewritten; everything else in the block stays as written.
//!
//! New hosts go in front of the first `Host *` block, since OpenSSH takes
//! the first value it sees for each directive and the catch-all should keep
//! acting as a default.

use crate::merge::{
    flatten_fragments, reconcile, render_document, take_leading_comments, Fragment, MergeStats,
    Record,
};

const DEFAULT_INDENT: &str = "    ";
const CATCH_ALL: &str = "*";

/// Kind of block header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Host,
    Match,
}

/// A `Host` or `Match` block with the comments directly above it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostBlock {
    pub kind: BlockKind,
    /// Header arguments with whitespace normalized.
    pub pattern: String,
    identity: String,
    leading: Vec<String>,
    header: String,
    body: Vec<String>,
    /// Directives owned by a generated block.
    options: Vec<(String, String)>,
}

impl HostBlock {
    /// A generated `Host` block with its controlled directives, in order.
    pub fn generated(pattern: &str, options: Vec<(String, String)>) -> Self {
        let pattern = normalize_pattern(pattern);
        let body = options
            .iter()
            .map(|(key, value)| format!("{}{} {}", DEFAULT_INDENT, key, value))
            .collect();
        Self {
            kind: BlockKind::Host,
            identity: pattern.clone(),
            header: format!("Host {}", pattern),
            pattern,
            leading: Vec::new(),
            body,
            options,
        }
    }

    fn parsed(kind: BlockKind, arguments: &str, header: &str, leading: Vec<String>) -> Self {
        let pattern = normalize_pattern(arguments);
        let identity = match kind {
            BlockKind::Host => pattern.clone(),
            BlockKind::Match => format!("Match {}", pattern),
        };
        Self {
            kind,
            pattern,
            identity,
            leading,
            header: header.to_string(),
            body: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Directives owned by this block when it was generated.
    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Value of the first directive named `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.body.iter().find_map(|line| {
            split_directive(line)
                .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    fn is_catch_all(&self) -> bool {
        self.kind == BlockKind::Host && self.pattern == CATCH_ALL
    }

    fn indent(&self) -> String {
        self.body
            .iter()
            .find(|line| split_directive(line).is_some())
            .map(|line| leading_whitespace(line).to_string())
            .unwrap_or_else(|| DEFAULT_INDENT.to_string())
    }

    /// Replace or append each directive, keeping unrelated lines.
    fn upsert_options(&mut self, options: &[(String, String)]) {
        let indent = self.indent();
        for (key, value) in options {
            let positions: Vec<usize> = self
                .body
                .iter()
                .enumerate()
                .filter(|(_, line)| {
                    split_directive(line).is_some_and(|(k, _)| k.eq_ignore_ascii_case(key))
                })
                .map(|(index, _)| index)
                .collect();

            match positions.split_first() {
                Some((&first, duplicates)) => {
                    let line_indent = leading_whitespace(&self.body[first]).to_string();
                    self.body[first] = format!("{}{} {}", line_indent, key, value);
                    for &index in duplicates.iter().rev() {
                        self.body.remove(index);
                    }
                }
                None => {
                    let at = self
                        .body
                        .iter()
                        .rposition(|line| split_directive(line).is_some())
                        .map_or(0, |index| index + 1);
                    self.body.insert(at, format!("{}{} {}", indent, key, value));
                }
            }
        }
    }

    fn into_lines(self) -> Vec<String> {
        let mut lines = self.leading;
        lines.push(self.header);
        lines.extend(self.body);
        lines
    }
}

impl Record for HostBlock {
    fn identity_key(&self) -> &str {
        &self.identity
    }

    fn is_managed(&self) -> bool {
        false
    }
}

/// Collapse whitespace inside a host pattern list.
pub fn normalize_pattern(pattern: &str) -> String {
    pattern.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Split a config line into directive keyword and arguments. Comments and
/// blank lines have no directive.
fn split_directive(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let end = trimmed
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(trimmed.len());
    let (key, rest) = trimmed.split_at(end);
    let value = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim_end();
    Some((key, value))
}

fn block_kind(keyword: &str) -> Option<BlockKind> {
    if keyword.eq_ignore_ascii_case("host") {
        Some(BlockKind::Host)
    } else if keyword.eq_ignore_ascii_case("match") {
        Some(BlockKind::Match)
    } else {
        None
    }
}

/// Parse SSH config content into the preamble and host blocks.
pub fn parse_ssh(content: &str) -> Vec<Fragment<HostBlock>> {
    let mut fragments = Vec::new();
    let mut preamble: Vec<String> = Vec::new();
    let mut current: Option<HostBlock> = None;

    for line in content.lines() {
        let header = split_directive(line)
            .and_then(|(keyword, arguments)| block_kind(keyword).map(|kind| (kind, arguments)));

        let Some((kind, arguments)) = header else {
            match current.as_mut() {
                Some(block) => block.body.push(line.to_string()),
                None => preamble.push(line.to_string()),
            }
            continue;
        };

        let leading = match current.as_mut() {
            Some(block) => take_leading_comments(&mut block.body, &["#"]),
            None => take_leading_comments(&mut preamble, &["#"]),
        };

        match current.take() {
            Some(block) => fragments.push(Fragment::Record(block)),
            None if !preamble.is_empty() => {
                fragments.push(Fragment::Text(std::mem::take(&mut preamble)))
            }
            None => {}
        }

        current = Some(HostBlock::parsed(kind, arguments, line, leading));
    }

    match current {
        Some(block) => fragments.push(Fragment::Record(block)),
        None if !preamble.is_empty() => fragments.push(Fragment::Text(preamble)),
        None => {}
    }

    fragments
}

fn render_ssh(fragments: Vec<Fragment<HostBlock>>) -> String {
    let lines = flatten_fragments(fragments, |block| {
        let mut lines = vec![String::new()];
        lines.extend(block.into_lines());
        lines
    });
    render_document("", &lines, &[])
}

/// Merge generated hosts and global options into previous SSH config content.
///
/// `hosts` must not contain the catch-all pattern; global options are
/// upserted into the existing `Host *` block, or a new one is appended last.
pub fn merge_ssh(
    previous: &str,
    hosts: &[HostBlock],
    global: &[(String, String)],
) -> (String, MergeStats) {
    let mut fragments = parse_ssh(previous);
    let mut stats = MergeStats {
        generated: hosts.len(),
        ..MergeStats::default()
    };

    let mut fresh = Vec::new();
    for host in hosts {
        let existing = fragments.iter_mut().find_map(|fragment| match fragment {
            Fragment::Record(block)
                if block.kind == BlockKind::Host && block.identity == host.identity =>
            {
                Some(block)
            }
            _ => None,
        });
        match existing {
            Some(block) => {
                block.upsert_options(&host.options);
                stats.replaced_managed += 1;
            }
            None => fresh.push(host.clone()),
        }
    }

    let total = fragments
        .iter()
        .filter(|fragment| matches!(fragment, Fragment::Record(_)))
        .count();
    stats.kept = total - stats.replaced_managed;

    let catch_all = fragments.iter().position(|fragment| match fragment {
        Fragment::Record(block) => block.is_catch_all(),
        Fragment::Text(_) => false,
    });

    if let Some(index) = catch_all {
        if let Some(Fragment::Record(block)) = fragments.get_mut(index) {
            block.upsert_options(global);
        }
        let tail = fragments.split_off(index);
        fragments.extend(fresh.into_iter().map(Fragment::Record));
        fragments.extend(tail);
    } else {
        fragments.extend(fresh.into_iter().map(Fragment::Record));
        if !global.is_empty() {
            fragments.push(Fragment::Record(HostBlock::generated(
                CATCH_ALL,
                global.to_vec(),
            )));
        }
    }

    (render_ssh(fragments), stats)
}

/// Remove the host blocks matching `patterns`, leaving everything else.
pub fn remove_hosts(previous: &str, patterns: &[String]) -> (String, MergeStats) {
    let targets: Vec<HostBlock> = patterns
        .iter()
        .map(|pattern| HostBlock::generated(pattern, Vec::new()))
        .collect();
    let mut reconciled = reconcile(parse_ssh(previous), &targets);
    reconciled.stats.generated = 0;
    (render_ssh(reconciled.fragments), reconciled.stats)
}
