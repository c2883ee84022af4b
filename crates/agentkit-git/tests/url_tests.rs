use agentkit_git::{Error, RepoUrl, normalize};
use pretty_assertions::assert_eq;
use rstest::rstest;

const PREFIX: &str = "agentkit-plugin-";

#[rstest]
#[case("acme/search", "https://github.com/acme/search")]
#[case("github.com/acme/search", "https://github.com/acme/search")]
#[case("https://github.com/acme/search.git", "https://github.com/acme/search")]
#[case("http://git.example.org/acme/search/", "http://git.example.org/acme/search")]
#[case("localhost:3000/acme/search", "https://localhost:3000/acme/search")]
fn hosted_forms_produce_clone_urls(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(RepoUrl::parse(input).unwrap().clone_url(), expected);
}

#[rstest]
#[case("")]
#[case("search")]
#[case("a/b/c/d")]
#[case("ssh://github.com/acme/search")]
#[case("acme/../search")]
#[case("not a/repo")]
fn malformed_references_are_rejected(#[case] input: &str) {
    assert!(matches!(
        RepoUrl::parse(input),
        Err(Error::InvalidUrl { .. })
    ));
}

#[test]
fn prefix_is_added_for_fetching() {
    let url = RepoUrl::parse("acme/search").unwrap().with_prefix(PREFIX);

    assert_eq!(url.repo(), "agentkit-plugin-search");
    assert_eq!(url.clone_url(), "https://github.com/acme/agentkit-plugin-search");
}

#[test]
fn normalized_form_ignores_scheme_case_and_suffix() {
    let a = RepoUrl::parse("https://GitHub.com/Acme/Search.git").unwrap();
    let b = RepoUrl::parse("acme/search").unwrap();

    assert_eq!(a.normalized(), "github.com/acme/search");
    assert_eq!(a.normalized(), b.normalized());
}

#[test]
fn file_urls_are_used_verbatim() {
    let url = RepoUrl::parse("file:///srv/git/acme/search.git").unwrap();

    assert!(url.is_local());
    assert_eq!(url.owner(), "acme");
    assert_eq!(url.with_prefix(PREFIX).clone_url(), "file:///srv/git/acme/search.git");
}

#[test]
fn normalize_falls_back_for_unparseable_input() {
    assert_eq!(normalize("ssh://Host/x/y.git"), "host/x/y");
    assert_eq!(normalize("https://github.com/acme/search"), "github.com/acme/search");
}
