//! Reference URL parsing.
//!
//! Turning a reference URL into lookup arguments never fails: a URL that does
//! not match the expected host yields whatever is left after prefix stripping,
//! and the lookup itself rejects it.

use std::sync::LazyLock;

use regex::Regex;

static GITHUB_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://github\.com/").expect("valid regex"));

static STACKSHARE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://stackshare\.io/").expect("valid regex"));

/// Repository arguments for the VCS lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsRef {
    pub owner: String,
    pub name: String,
}

/// Split `https://github.com/{owner}/{name}` into its owner and name.
///
/// Missing segments come back as empty strings.
pub fn vcs_ref(url: &str) -> VcsRef {
    let rest = GITHUB_PREFIX.replace(url, "");
    let mut parts = rest.split('/');
    let owner = parts.next().unwrap_or_default().to_string();
    let name = parts.next().unwrap_or_default().to_string();
    VcsRef { owner, name }
}

/// Strip `https://stackshare.io/` from a catalog URL, leaving the tool slug.
pub fn catalog_ref(url: &str) -> String {
    STACKSHARE_PREFIX.replace(url, "").into_owned()
}
