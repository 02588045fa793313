//! `accounts.txt` import format
//!
//! One account per line as `username:auth_token:ct0`. Blank lines are
//! ignored; malformed lines are reported and skipped so one bad entry never
//! blocks the rest of the file.

use common::TokenBundle;

use crate::account::Account;

/// A well-formed line, ready to be added to the store.
#[derive(Debug)]
pub struct ImportLine {
    pub line_no: usize,
    pub account: Account,
}

/// A line that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line_no: usize,
    pub reason: String,
}

/// Parse the contents of an accounts file.
///
/// Line numbers are 1-based. The raw line is never echoed back in `reason`
/// since it carries tokens.
pub fn parse_accounts_file(contents: &str) -> (Vec<ImportLine>, Vec<SkippedLine>) {
    let mut parsed = Vec::new();
    let mut skipped = Vec::new();

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(':').map(str::trim).collect();
        let [username, auth_token, ct0] = fields.as_slice() else {
            skipped.push(SkippedLine {
                line_no,
                reason: format!(
                    "expected username:auth_token:ct0, found {} fields",
                    fields.len()
                ),
            });
            continue;
        };

        if username.is_empty() {
            skipped.push(SkippedLine {
                line_no,
                reason: "empty username".into(),
            });
            continue;
        }

        match TokenBundle::new(auth_token, ct0) {
            Ok(tokens) => parsed.push(ImportLine {
                line_no,
                account: Account::new(*username, tokens),
            }),
            Err(e) => skipped.push(SkippedLine {
                line_no,
                reason: e.to_string(),
            }),
        }
    }

    (parsed, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountStatus;

    #[test]
    fn parses_valid_lines_and_skips_blanks() {
        let contents = "alice:at1:ct1\n\n  bob : at2 : ct2  \n";
        let (parsed, skipped) = parse_accounts_file(contents);

        assert!(skipped.is_empty());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].line_no, 1);
        assert_eq!(parsed[0].account.username, "alice");
        assert_eq!(parsed[1].line_no, 3);
        assert_eq!(parsed[1].account.username, "bob");
        assert_eq!(parsed[1].account.tokens.auth_token.expose(), "at2");
        assert_eq!(parsed[1].account.status, AccountStatus::Unchecked);
    }

    #[test]
    fn wrong_field_count_is_skipped() {
        let contents = "alice:at1\ncarol:at3:ct3:extra\ndave:at4:ct4";
        let (parsed, skipped) = parse_accounts_file(contents);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].account.username, "dave");
        assert_eq!(
            skipped,
            vec![
                SkippedLine {
                    line_no: 1,
                    reason: "expected username:auth_token:ct0, found 2 fields".into()
                },
                SkippedLine {
                    line_no: 2,
                    reason: "expected username:auth_token:ct0, found 4 fields".into()
                },
            ]
        );
    }

    #[test]
    fn empty_fields_are_skipped_without_leaking_tokens() {
        let contents = ":secret-at:secret-ct\nerin::secret-ct2";
        let (parsed, skipped) = parse_accounts_file(contents);

        assert!(parsed.is_empty());
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].reason, "empty username");
        assert_eq!(skipped[1].reason, "missing auth_token cookie");
        for s in &skipped {
            assert!(!s.reason.contains("secret"));
        }
    }
}
