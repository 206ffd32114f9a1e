//! AWS config (INI) merge operations
//!
//! The AWS CLI config file is a list of sections (`[default]`,
//! `[profile name]`, `[sso-session name]`) holding `key = value` entries.
//! Sections written by this tool carry the managed-by marker on the line
//! directly above their header; everything else belongs to the user.
//!
//! ## Features
//!
//! - Section-aware parsing that keeps user sections byte-for-byte
//! - Managed sections are dropped and regenerated on every run
//! - A user section with the same header as a generated one is superseded
//! - Comment and blank lines outside sections are preserved in place
//! - SSO profile enumeration for providers that consume these profiles

use crate::defaults::MANAGED_MARKER;
use crate::merge::{
    flatten_fragments, is_banner_line, reconcile, render_document, split_trailing_comments,
    take_leading_comments, take_marker, Fragment, MergeStats, Record,
};

/// Banner written at the top of the AWS config file
pub const AWS_BANNER: &str = "\
# This file is maintained by cfgweave.
# Sections directly below a managed-by marker are regenerated on every run.
# Add your own profiles anywhere; they are preserved as written.";

const COMMENT_PREFIXES: &[&str] = &["#", ";"];

/// Represents a key-value entry in an INI file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IniEntry {
    pub key: String,
    pub value: String,
}

/// A section of the AWS config file
///
/// Parsed sections keep their raw lines so user content is written back
/// untouched. Generated sections are rendered from `entries`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IniSection {
    /// Header text between the brackets, e.g. `profile prod/Admin`.
    pub name: String,
    pub entries: Vec<IniEntry>,
    raw: Vec<String>,
    managed: bool,
}

impl IniSection {
    /// A new managed section with no entries.
    pub fn generated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            raw: Vec::new(),
            managed: true,
        }
    }

    /// Builder-style entry append.
    pub fn with_entry(mut self, key: &str, value: impl Into<String>) -> Self {
        self.entries.push(IniEntry {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    /// Look up an entry by key (keys compare case-insensitively).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.as_str())
    }

    /// Profile name for `[profile x]` sections.
    pub fn profile_name(&self) -> Option<&str> {
        self.name.strip_prefix("profile ").map(str::trim)
    }

    /// Lines to write for this section.
    fn into_lines(self) -> Vec<String> {
        if !self.raw.is_empty() {
            return self.raw;
        }
        let mut lines = vec![format!("[{}]", self.name)];
        lines.extend(
            self.entries
                .iter()
                .map(|entry| format!("{} = {}", entry.key, entry.value)),
        );
        lines
    }

    /// Marker, header and entries, ready to append to the document.
    pub fn render(&self) -> String {
        let mut lines = vec![MANAGED_MARKER.to_string()];
        lines.extend(self.clone().into_lines());
        lines.join("\n")
    }
}

impl Record for IniSection {
    fn identity_key(&self) -> &str {
        &self.name
    }

    fn is_managed(&self) -> bool {
        self.managed
    }
}

/// Parse AWS config content into text fragments and sections
///
/// Supports:
/// - Section headers: `[section_name]`
/// - Key-value pairs: `key = value`
/// - Comments: lines starting with `#` or `;`
/// - Lines before the first header, kept as text
pub fn parse_ini(content: &str) -> Vec<Fragment<IniSection>> {
    let mut fragments = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut current: Option<IniSection> = None;

    for line in content.lines() {
        if is_banner_line(AWS_BANNER, line) {
            continue;
        }

        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            if let Some(section) = current.take() {
                finish_section(section, &mut pending, &mut fragments);
            }

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

            current = Some(IniSection {
                name: trimmed[1..trimmed.len() - 1].trim().to_string(),
                entries: Vec::new(),
                raw,
                managed,
            });
        } else if let Some(section) = current.as_mut() {
            section.raw.push(line.to_string());
            let is_comment = COMMENT_PREFIXES.iter().any(|p| trimmed.starts_with(p));
            if !is_comment {
                if let Some(pos) = trimmed.find('=') {
                    section.entries.push(IniEntry {
                        key: trimmed[..pos].trim().to_string(),
                        value: trimmed[pos + 1..].trim().to_string(),
                    });
                }
            }
        } else {
            pending.push(line.to_string());
        }
    }

    if let Some(section) = current.take() {
        finish_section(section, &mut pending, &mut fragments);
    }
    if !pending.is_empty() {
        fragments.push(Fragment::Text(pending));
    }

    fragments
}

fn finish_section(
    mut section: IniSection,
    pending: &mut Vec<String>,
    fragments: &mut Vec<Fragment<IniSection>>,
) {
    let tail = split_trailing_comments(&mut section.raw, COMMENT_PREFIXES);
    fragments.push(Fragment::Record(section));
    *pending = tail;
}

/// Merge freshly generated sections into previous AWS config content.
///
/// Returns the final content and the merge statistics.
pub fn merge_ini(previous: &str, generated: &[IniSection]) -> (String, MergeStats) {
    let reconciled = reconcile(parse_ini(previous), generated);
    let retained = flatten_fragments(reconciled.fragments, IniSection::into_lines);
    let blocks: Vec<String> = generated.iter().map(IniSection::render).collect();
    (
        render_document(AWS_BANNER, &retained, &blocks),
        reconciled.stats,
    )
}

/// Names of every `[profile x]` section that carries `key`, in file order.
///
/// Used to enumerate SSO profiles (`sso_account_id`) for consumers of the
/// AWS config file.
pub fn profiles_with_key(content: &str, key: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for fragment in parse_ini(content) {
        if let Fragment::Record(section) = fragment {
            if section.get(key).is_none() {
                continue;
            }
            if let Some(name) = section.profile_name() {
                if !names.iter().any(|existing| existing == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sections(fragments: &[Fragment<IniSection>]) -> Vec<&IniSection> {
        fragments
            .iter()
            .filter_map(|f| match f {
                Fragment::Record(s) => Some(s),
                Fragment::Text(_) => None,
            })
            .collect()
    }

    fn profile(name: &str, account: &str, role: &str) -> IniSection {
        IniSection::generated(format!("profile {}", name))
            .with_entry("sso_session", "corp")
            .with_entry("sso_account_id", account)
            .with_entry("sso_role_name", role)
    }

    mod parse_ini_tests {
        use super::*;

        #[test]
        fn test_parse_ini_empty() {
            assert!(parse_ini("").is_empty());
        }

        #[test]
        fn test_parse_ini_sections_and_entries() {
            let content = "[default]\nregion = us-east-1\n\n[profile dev]\nregion=eu-west-1\noutput = json\n";
            let fragments = parse_ini(content);
            let parsed = sections(&fragments);
            assert_eq!(parsed.len(), 2);
            assert_eq!(parsed[0].name, "default");
            assert_eq!(parsed[0].get("region"), Some("us-east-1"));
            assert_eq!(parsed[1].profile_name(), Some("dev"));
            assert_eq!(parsed[1].get("REGION"), Some("eu-west-1"));
            assert_eq!(parsed[1].entries.len(), 2);
            assert!(!parsed[1].is_managed());
        }

        #[test]
        fn test_parse_ini_marker_classifies_managed() {
            let content = "# managed-by: cfgweave\n[profile a/Admin]\nregion = x\n\n[profile mine]\nregion = y\n";
            let fragments = parse_ini(content);
            let parsed = sections(&fragments);
            assert!(parsed[0].is_managed());
            assert!(!parsed[1].is_managed());
        }

        #[test]
        fn test_parse_ini_marker_must_be_adjacent() {
            let content = "# managed-by: cfgweave\n\n[profile a]\nregion = x\n";
            let fragments = parse_ini(content);
            assert!(!sections(&fragments)[0].is_managed());
        }

        #[test]
        fn test_parse_ini_comment_attaches_forward() {
            let content = "[profile a]\nregion = x\n# work account\n[profile b]\nregion = y\n";
            let fragments = parse_ini(content);
            assert_eq!(fragments.len(), 2);
            let parsed = sections(&fragments);
            assert_eq!(parsed[0].raw, vec!["[profile a]", "region = x"]);
            assert_eq!(parsed[1].raw[0], "# work account");
        }

        #[test]
        fn test_parse_ini_detached_comment_stays_text() {
            let content = "# about this file\n\n[profile a]\nregion = x\n";
            let fragments = parse_ini(content);
            assert_eq!(
                fragments[0],
                Fragment::Text(vec!["# about this file".to_string(), String::new()])
            );
            assert_eq!(sections(&fragments)[0].raw[0], "[profile a]");
        }

        #[test]
        fn test_parse_ini_skips_banner() {
            let content = format!("{}\n\n[default]\nregion = x\n", AWS_BANNER);
            let fragments = parse_ini(&content);
            assert_eq!(fragments.len(), 2);
            assert_eq!(fragments[0], Fragment::Text(vec![String::new()]));
        }

        #[test]
        fn test_parse_ini_ignores_commented_entries() {
            let content = "[profile a]\n; region = old\nregion = new\n";
            let fragments = parse_ini(content);
            let parsed = sections(&fragments);
            assert_eq!(parsed[0].entries.len(), 1);
            assert_eq!(parsed[0].get("region"), Some("new"));
        }
    }

    mod merge_ini_tests {
        use super::*;

        #[test]
        fn test_merge_into_empty_file() {
            let (output, stats) = merge_ini("", &[profile("prod/Admin", "111111111111", "Admin")]);
            let expected = format!(
                "{}\n\n# managed-by: cfgweave\n[profile prod/Admin]\nsso_session = corp\nsso_account_id = 111111111111\nsso_role_name = Admin\n",
                AWS_BANNER
            );
            assert_eq!(output, expected);
            assert_eq!(stats.generated, 1);
            assert_eq!(stats.kept, 0);
        }

        #[test]
        fn test_merge_preserves_user_sections_verbatim() {
            let previous = "[default]\nregion   =  us-west-2 ; odd spacing\n\n[profile personal]\naws_access_key_id = AKIA\n";
            let (output, stats) = merge_ini(previous, &[profile("prod/Admin", "1", "Admin")]);
            assert!(output.contains("[default]\nregion   =  us-west-2 ; odd spacing\n"));
            assert!(output.contains("[profile personal]\naws_access_key_id = AKIA\n"));
            assert_eq!(stats.kept, 2);
            let user_pos = output.find("[profile personal]").unwrap();
            let gen_pos = output.find("[profile prod/Admin]").unwrap();
            assert!(user_pos < gen_pos);
        }

        #[test]
        fn test_merge_replaces_managed_sections() {
            let (first, _) = merge_ini("", &[profile("old/Admin", "1", "Admin")]);
            let (second, stats) = merge_ini(&first, &[profile("new/Admin", "2", "Admin")]);
            assert!(!second.contains("old/Admin"));
            assert!(second.contains("[profile new/Admin]"));
            assert_eq!(stats.replaced_managed, 1);
            assert_eq!(second.matches(MANAGED_MARKER).count(), 1);
        }

        #[test]
        fn test_merge_supersedes_user_section_with_same_header() {
            let previous = "[profile prod/Admin]\nregion = hand-written\n";
            let (output, stats) = merge_ini(previous, &[profile("prod/Admin", "1", "Admin")]);
            assert!(!output.contains("hand-written"));
            assert_eq!(stats.superseded, vec!["profile prod/Admin"]);
        }

        #[test]
        fn test_merge_drops_comment_of_superseded_section() {
            let previous = "# hand-made prod profile\n[profile prod/Admin]\nregion = x\n\n# mine\n[default]\nregion = y\n";
            let (output, stats) = merge_ini(previous, &[profile("prod/Admin", "1", "Admin")]);
            assert_eq!(stats.superseded, vec!["profile prod/Admin"]);
            assert!(!output.contains("hand-made prod profile"));
            assert!(output.contains("# mine\n[default]\nregion = y\n"));
        }

        #[test]
        fn test_merge_keeps_user_section_bytes() {
            let user = "[profile personal]\nregion = x\n\n\n; spare\n   \noutput = json";
            let previous = format!("{}\n\n[profile other]\nregion = y\n", user);
            let (output, _) = merge_ini(&previous, &[profile("prod/Admin", "1", "Admin")]);
            assert!(output.contains(user));
            let (again, _) = merge_ini(&output, &[profile("prod/Admin", "1", "Admin")]);
            assert_eq!(output, again);
        }

        #[test]
        fn test_merge_is_idempotent() {
            let previous = "# my notes\n[default]\nregion = x\n";
            let generated = [
                IniSection::generated("sso-session corp").with_entry("sso_region", "us-east-1"),
                profile("prod/Admin", "1", "Admin"),
            ];
            let (first, _) = merge_ini(previous, &generated);
            let (second, _) = merge_ini(&first, &generated);
            assert_eq!(first, second);
            assert!(first.contains("# my notes\n[default]"));
        }
    }

    #[test]
    fn test_profiles_with_key() {
        let content = "[profile manual]\nregion = x\n\n[profile a/Admin]\nsso_account_id = 1\n\n[sso-session corp]\nsso_account_id = 9\n\n[profile b/Read]\nsso_account_id = 2\n";
        assert_eq!(
            profiles_with_key(content, "sso_account_id"),
            vec!["a/Admin", "b/Read"]
        );
    }
}
