//! Property-based tests for the merge engines.
//!
//! Every engine must be idempotent: merging the same generated records into
//! its own output changes nothing. User-authored records must survive.

#[cfg(test)]
mod proptest_tests {
    use crate::merge::ini::{merge_ini, IniSection};
    use crate::merge::normalize_account;
    use crate::merge::spc::{merge_spc, Connection};
    use crate::merge::ssh::{merge_ssh, HostBlock};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn accounts() -> impl Strategy<Value = BTreeSet<String>> {
        prop::collection::btree_set("[a-z][a-z0-9]{0,7}", 0..6)
    }

    fn connections(accounts: &BTreeSet<String>) -> Vec<Connection> {
        accounts
            .iter()
            .map(|account| {
                Connection::for_profile(
                    format!("gen_{}", account),
                    "aws",
                    &format!("{}/Admin", account),
                    &["us-east-1".to_string()],
                )
            })
            .collect()
    }

    fn sections(accounts: &BTreeSet<String>) -> Vec<IniSection> {
        accounts
            .iter()
            .map(|account| {
                IniSection::generated(format!("profile {}/Admin", account))
                    .with_entry("sso_account_id", "123456789012")
                    .with_entry("sso_role_name", "Admin")
            })
            .collect()
    }

    const USER_SPC: &str = "connection \"mine\" {\n  plugin = \"aws\"\n}\n";
    const USER_INI: &str = "[default]\nregion = eu-west-1\n";
    const USER_SSH: &str = "Host bastion\n    User me\n\nHost *\n    ServerAliveInterval 30\n";

    proptest! {
        /// Property: normalized identifiers only use lowercase alphanumerics and single underscores
        #[test]
        fn normalize_account_alphabet(input in ".*") {
            let normalized = normalize_account(&input);
            prop_assert!(normalized
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
            prop_assert!(!normalized.contains("__"));
        }

        /// Property: normalizing twice is the same as normalizing once
        #[test]
        fn normalize_account_is_idempotent(input in ".*") {
            let once = normalize_account(&input);
            prop_assert_eq!(normalize_account(&once), once);
        }

        #[test]
        fn spc_merge_is_idempotent(accounts in accounts()) {
            let generated = connections(&accounts);
            let (first, _) = merge_spc(USER_SPC, &generated).unwrap();
            let (second, stats) = merge_spc(&first, &generated).unwrap();
            prop_assert_eq!(&second, &first);
            prop_assert!(stats.superseded.is_empty());
            prop_assert!(second.contains("connection \"mine\""));
        }

        #[test]
        fn ini_merge_is_idempotent(accounts in accounts()) {
            let generated = sections(&accounts);
            let (first, _) = merge_ini(USER_INI, &generated);
            let (second, _) = merge_ini(&first, &generated);
            prop_assert_eq!(&second, &first);
            prop_assert!(second.contains("[default]\nregion = eu-west-1"));
        }

        #[test]
        fn ini_clean_restores_user_sections(accounts in accounts()) {
            let (merged, _) = merge_ini(USER_INI, &sections(&accounts));
            let (cleaned, _) = merge_ini(&merged, &[]);
            prop_assert!(cleaned.contains("[default]\nregion = eu-west-1"));
            prop_assert!(!cleaned.contains("sso_role_name"));
        }

        #[test]
        fn ssh_merge_is_idempotent(patterns in prop::collection::btree_set("[a-z]{1,8}", 0..6)) {
            let hosts: Vec<HostBlock> = patterns
                .iter()
                .map(|pattern| {
                    HostBlock::generated(
                        pattern,
                        vec![("HostName".to_string(), format!("{}.internal", pattern))],
                    )
                })
                .collect();
            let global = vec![("ServerAliveInterval".to_string(), "60".to_string())];

            let (first, _) = merge_ssh(USER_SSH, &hosts, &global);
            let (second, _) = merge_ssh(&first, &hosts, &global);
            prop_assert_eq!(&second, &first);
            prop_assert!(second.contains("Host *\n    ServerAliveInterval 60"));
        }
    }
}
