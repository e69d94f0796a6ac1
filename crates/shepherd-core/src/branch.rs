//! Pull request id extraction from branch names.
//!
//! CI systems hand us branch names such as `pull/123/merge` or
//! `refs/pull/123/head`. The rule is crude: a name containing `pull` yields
//! every digit in the name, concatenated.

use std::sync::LazyLock;

use regex::Regex;
use shepherd_github::PullRequestId;

static NON_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^0-9]").expect("static pattern is valid"));

/// Extract a pull request id from a branch name.
///
/// Returns `None` when the name does not contain `pull`, contains no digits,
/// or the digits do not fit a [`PullRequestId`].
pub fn parse_pull_request_id(branch_name: &str) -> Option<PullRequestId> {
    if !branch_name.contains("pull") {
        return None;
    }

    let digits = NON_DIGITS.replace_all(branch_name, "");
    if digits.is_empty() {
        return None;
    }

    digits.parse().ok()
}
