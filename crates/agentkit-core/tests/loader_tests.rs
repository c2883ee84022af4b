use agentkit_core::loader::{Loader, ManifestLoader};
use agentkit_core::{Error, PluginDeclaration};
use agentkit_lock::PluginKind;
use agentkit_test_utils::TestProject;
use pretty_assertions::assert_eq;
use rstest::rstest;

fn standard() -> PluginDeclaration {
    PluginDeclaration::local(".", PluginKind::Standard)
}

#[test]
fn native_manifest_exposes_identity_and_capabilities() {
    let project = TestProject::new();
    let dir = project.native_plugin("echo", "echo");

    let handle = ManifestLoader::new().load(&dir, None, &standard()).unwrap();

    let plugin = handle.plugin();
    assert_eq!(plugin.identity().name, "echo");
    assert_eq!(plugin.capabilities().len(), 1);
    assert_eq!(plugin.capabilities()[0].name, "run");
}

#[test]
fn foreign_manifest_goes_through_adapter() {
    let project = TestProject::new();
    let dir = project.foreign_plugin("search", "search");

    let handle = ManifestLoader::new().load(&dir, None, &standard()).unwrap();

    let plugin = handle.plugin();
    assert_eq!(plugin.identity().description, "Foreign plugin");
    assert_eq!(plugin.instructions(), Some("Call search first"));
    let names: Vec<String> = plugin.capabilities().into_iter().map(|o| o.name).collect();
    assert_eq!(names, vec!["search", "fetch"]);
    assert_eq!(plugin.variables()["endpoint"], "https://example.test");
}

#[test]
fn declared_variables_reach_foreign_plugins() {
    let project = TestProject::new();
    let dir = project.foreign_plugin("search", "search");
    let declaration = PluginDeclaration::local(".", PluginKind::Parameterized)
        .with_variable("endpoint", "https://override.test");

    let handle = ManifestLoader::new().load(&dir, None, &declaration).unwrap();

    assert_eq!(handle.plugin().variables()["endpoint"], "https://override.test");
}

#[test]
fn earlier_candidate_wins() {
    let project = TestProject::new();
    let dir = project.foreign_plugin("both", "from-json");
    project.write(
        "both/plugin.toml",
        "[plugin]\nname = \"from-toml\"\ndescription = \"d\"\n\n[[functions]]\nname = \"f\"\n",
    );

    let handle = ManifestLoader::new().load(&dir, None, &standard()).unwrap();

    assert_eq!(handle.plugin().identity().name, "from-toml");
}

#[rstest]
#[case("agentkit.toml")]
#[case("manifest.json")]
#[case(".agentkit/plugin.toml")]
fn every_candidate_location_is_searched(#[case] file: &str) {
    let project = TestProject::new();
    let content = if file.ends_with(".json") {
        r#"{"name": "p", "description": "d", "tools": []}"#.to_string()
    } else {
        "functions = []\n\n[plugin]\nname = \"p\"\ndescription = \"d\"\n".to_string()
    };
    project.write(&format!("p/{file}"), &content);

    let handle = ManifestLoader::new()
        .load(&project.path("p"), None, &standard())
        .unwrap();

    assert_eq!(handle.plugin().identity().name, "p");
}

#[test]
fn non_plugin_json_is_skipped() {
    let project = TestProject::new();
    project.write("p/manifest.json", r#"{"version": 3, "icons": {}}"#);

    let result = ManifestLoader::new().load(&project.path("p"), None, &standard());

    match result {
        Err(Error::Load { message, .. }) => assert!(message.contains("not a plugin manifest")),
        other => panic!("expected load error, got {other:?}"),
    }
}

#[test]
fn empty_directory_is_a_load_error() {
    let project = TestProject::new();
    std::fs::create_dir_all(project.path("empty")).unwrap();

    let result = ManifestLoader::new().load(&project.path("empty"), None, &standard());

    assert!(matches!(result, Err(Error::Load { .. })));
}

#[test]
fn sub_path_selects_nested_plugin() {
    let project = TestProject::new();
    project.native_plugin("repo/plugins/inner", "inner");

    let handle = ManifestLoader::new()
        .load(&project.path("repo"), Some("plugins/inner"), &standard())
        .unwrap();

    assert_eq!(handle.plugin().identity().name, "inner");
    assert!(handle.location().ends_with("plugins/inner"));
}

#[test]
fn server_extension_skips_discovery() {
    let project = TestProject::new();
    std::fs::create_dir_all(project.path("srv")).unwrap();
    let declaration = PluginDeclaration::local("srv", PluginKind::ServerExtension)
        .with_command("python", &["-m", "srv"]);

    let handle = ManifestLoader::new()
        .load(&project.path("srv"), None, &declaration)
        .unwrap();

    assert_eq!(handle.plugin().identity().name, "srv");
    assert!(handle.plugin().capabilities().is_empty());
}
