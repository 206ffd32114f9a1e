//! Merge engines for the supported target formats
//!
//! Every target file is a sequence of *records* (an SSH host block, a
//! Steampipe connection, an AWS profile section, a kubeconfig entry)
//! interleaved with free text. A merge takes the previous content of the
//! file and the records generated in this run and decides which previous
//! records survive.
//!
//! ## Supported Formats
//!
//! - SSH client config (ssh.rs) - host blocks, updated in place
//! - Steampipe connections (spc.rs) - sentinel-marked blocks, account equivalence
//! - AWS config (ini.rs) - sentinel-marked profile sections
//! - Kubeconfig (kubeconfig.rs) - named cluster/context/user entries
//!
//! ## Retention Rules
//!
//! `reconcile` applies the rules shared by the formats:
//!
//! - managed records are always dropped; the current generation replaces them
//! - user records are dropped when their identity key, or their equivalence
//!   key, matches a generated record
//! - user aggregators are never dropped
//!
//! Callers render the surviving fragments followed by the generated records
//! with `render_document`. Each merge owns its parsed document for the
//! length of one call; nothing is shared between calls.

use std::collections::HashSet;

pub mod ini;
pub mod kubeconfig;
pub mod spc;
pub mod ssh;

/// A reconcilable unit of a target file
pub trait Record {
    /// Exact identity (host pattern, connection name, section header, ...).
    fn identity_key(&self) -> &str;

    /// Secondary key identifying the same underlying resource under a
    /// different label.
    fn equivalence_key(&self) -> Option<&str> {
        None
    }

    /// Aggregators reference other records and are exempt from collisions.
    fn is_aggregator(&self) -> bool {
        false
    }

    /// Whether the record was written by a previous run of this tool.
    fn is_managed(&self) -> bool;
}

/// A piece of a parsed file: free text or a record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment<R> {
    /// Lines outside any record (comments, blank lines, other blocks).
    Text(Vec<String>),
    Record(R),
}

/// Counts and names reported by a merge
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// User records carried through unchanged.
    pub kept: usize,
    /// Previously managed records dropped.
    pub replaced_managed: usize,
    /// Identity keys of user records dropped because a generated record
    /// took their place.
    pub superseded: Vec<String>,
    /// Records written by this generation.
    pub generated: usize,
}

/// Result of applying the retention rules
#[derive(Clone, Debug)]
pub struct Reconciliation<R> {
    pub fragments: Vec<Fragment<R>>,
    pub stats: MergeStats,
}

/// Apply the retention rules to previously parsed fragments.
///
/// Text fragments always survive. Records survive only when they are user
/// records that do not collide with `generated`, or user aggregators.
pub fn reconcile<R: Record>(previous: Vec<Fragment<R>>, generated: &[R]) -> Reconciliation<R> {
    let identities: HashSet<&str> = generated.iter().map(|r| r.identity_key()).collect();
    let equivalences: HashSet<&str> = generated
        .iter()
        .filter_map(|r| r.equivalence_key())
        .collect();

    let mut stats = MergeStats {
        generated: generated.len(),
        ..MergeStats::default()
    };
    let mut fragments = Vec::with_capacity(previous.len());

    for fragment in previous {
        let record = match fragment {
            Fragment::Text(lines) => {
                fragments.push(Fragment::Text(lines));
                continue;
            }
            Fragment::Record(record) => record,
        };

        if record.is_managed() {
            stats.replaced_managed += 1;
            continue;
        }

        if !record.is_aggregator() {
            let collides = identities.contains(record.identity_key())
                || record
                    .equivalence_key()
                    .is_some_and(|key| equivalences.contains(key));
            if collides {
                stats.superseded.push(record.identity_key().to_string());
                continue;
            }
        }

        stats.kept += 1;
        fragments.push(Fragment::Record(record));
    }

    Reconciliation { fragments, stats }
}

/// Turn surviving fragments back into lines, in their original order.
///
/// Free text is tidied: runs of blank lines collapse to one empty line and
/// blank lines at either end are dropped. A record's lines are emitted
/// untouched from its first to its last non-blank line; blank lines at its
/// edges count as separators, like free text.
pub fn flatten_fragments<R>(
    fragments: Vec<Fragment<R>>,
    record_lines: impl Fn(R) -> Vec<String>,
) -> Vec<String> {
    let mut body = Body::default();
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => body.text(text),
            Fragment::Record(record) => body.record(record_lines(record)),
        }
    }
    body.lines
}

/// Line accumulator for `flatten_fragments`
#[derive(Default)]
struct Body {
    lines: Vec<String>,
    /// A separator is owed before the next line.
    gap: bool,
}

impl Body {
    fn blank(&mut self) {
        if !self.lines.is_empty() {
            self.gap = true;
        }
    }

    fn push(&mut self, line: String) {
        if std::mem::take(&mut self.gap) {
            self.lines.push(String::new());
        }
        self.lines.push(line);
    }

    fn text(&mut self, text: Vec<String>) {
        for line in text {
            if line.trim().is_empty() {
                self.blank();
            } else {
                self.push(line);
            }
        }
    }

    fn record(&mut self, raw: Vec<String>) {
        let is_content = |line: &String| !line.trim().is_empty();
        let (Some(first), Some(last)) = (
            raw.iter().position(is_content),
            raw.iter().rposition(is_content),
        ) else {
            if !raw.is_empty() {
                self.blank();
            }
            return;
        };

        if first > 0 {
            self.blank();
        }
        let trailing = last + 1 < raw.len();
        for line in raw.into_iter().take(last + 1).skip(first) {
            self.push(line);
        }
        if trailing {
            self.blank();
        }
    }
}

/// Pop the run of comment lines sitting directly above a record header.
///
/// The popped lines travel with the record, so a dropped record takes its
/// comment with it.
pub fn take_leading_comments(lines: &mut Vec<String>, comment_prefixes: &[&str]) -> Vec<String> {
    let keep = lines
        .iter()
        .rposition(|line| {
            let trimmed = line.trim_start();
            !comment_prefixes.iter().any(|prefix| trimmed.starts_with(prefix))
        })
        .map_or(0, |index| index + 1);
    lines.split_off(keep)
}

/// Split trailing comment and blank lines off a record's raw lines.
///
/// Comments directly above the next record header belong to that record
/// (or to the text between the two), not to the block they follow.
pub fn split_trailing_comments(raw: &mut Vec<String>, comment_prefixes: &[&str]) -> Vec<String> {
    let mut tail = Vec::new();
    while raw.len() > 1 {
        let Some(last) = raw.last() else { break };
        let trimmed = last.trim();
        let is_comment = comment_prefixes.iter().any(|prefix| trimmed.starts_with(prefix));
        if trimmed.is_empty() || is_comment {
            if let Some(line) = raw.pop() {
                tail.push(line);
            }
        } else {
            break;
        }
    }
    tail.reverse();
    tail
}

/// Assemble a document: banner, retained body, then generated blocks, each
/// separated by one blank line, with a trailing newline.
///
/// `retained` is emitted as given (see `flatten_fragments`) apart from blank
/// lines at its edges.
pub fn render_document(banner: &str, retained: &[String], generated: &[String]) -> String {
    let mut sections: Vec<String> = Vec::new();
    if !banner.trim().is_empty() {
        sections.push(banner.trim_end().to_string());
    }

    let is_content = |line: &String| !line.trim().is_empty();
    if let (Some(first), Some(last)) = (
        retained.iter().position(is_content),
        retained.iter().rposition(is_content),
    ) {
        sections.push(retained[first..=last].join("\n"));
    }

    sections.extend(
        generated
            .iter()
            .map(|block| block.trim_end().to_string())
            .filter(|block| !block.is_empty()),
    );

    let mut output = sections.join("\n\n");
    output.push('\n');
    output
}

/// Whether `line` is one of the banner's lines.
pub fn is_banner_line(banner: &str, line: &str) -> bool {
    let line = line.trim_end();
    !line.is_empty() && banner.lines().any(|banner_line| banner_line == line)
}

/// Remove the sentinel line from the end of a pending text buffer.
///
/// Returns `true` when the line directly above a record header is the
/// marker; the marker is dropped from the buffer.
pub fn take_marker(pending: &mut Vec<String>, marker: &str) -> bool {
    if pending.last().is_some_and(|line| line.trim() == marker) {
        pending.pop();
        true
    } else {
        false
    }
}

/// Normalize an account identifier: lowercase, and every run of
/// non-alphanumeric characters collapsed to a single underscore.
///
/// # Examples
///
/// ```
/// use cfgweave::merge::normalize_account;
///
/// assert_eq!(normalize_account("prod-account"), "prod_account");
/// assert_eq!(normalize_account("Acct  1"), "acct_1");
/// ```
pub fn normalize_account(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut in_separator = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            normalized.push(ch.to_ascii_lowercase());
            in_separator = false;
        } else if !in_separator {
            normalized.push('_');
            in_separator = true;
        }
    }
    normalized
}

/// The account identifier of a `<account>/<role>` profile name.
pub fn account_of_profile(profile: &str) -> String {
    let account = profile.split('/').next().unwrap_or(profile);
    normalize_account(account)
}
