use service_apidoc::{
    comments::{CommentStore, CommentStrategy},
    config::{GeneratorConfig, ReaderKind},
    descriptor::Manifest,
    document::{Document, HttpMethod, ParameterLocation},
    error::Error,
    generate,
    model_registry::{Schema, RULES_EXTENSION},
    serializer::{serialize_json, serialize_yaml, write_to_file},
};
use std::path::PathBuf;
use tempfile::TempDir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(path)
}

fn load_config() -> GeneratorConfig {
    let mut config = GeneratorConfig::load(&fixture("apidoc.yaml")).expect("Failed to load config");
    config.source_roots = vec![fixture("src")];
    config
}

fn run(config: &GeneratorConfig) -> Document {
    let manifest = Manifest::load(&fixture("manifest.yaml")).expect("Failed to load manifest");
    let comments = CommentStore::build(
        &config.source_roots,
        &config.source_extensions,
        config.comment_strategy,
    );
    generate(&manifest, &comments, config).expect("Generation failed")
}

#[test]
fn test_rest_end_to_end_generation() {
    let doc = run(&load_config());

    assert_eq!(doc.swagger, "2.0");
    assert_eq!(doc.info.title, "User Service");
    assert_eq!(doc.base_path.as_deref(), Some("/api"));

    let paths: Vec<&str> = doc.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/users", "/users/{id}"]);

    let get = doc
        .operation("/users/{id}", HttpMethod::Get)
        .expect("GET /users/{id} should exist");
    assert_eq!(get.operation_id, "getUser");
    assert_eq!(get.summary, "Returns the user.");
    assert_eq!(get.tags, vec!["users"]);
    assert_eq!(get.parameters.len(), 1);
    assert_eq!(get.parameters[0].name, "id");
    assert_eq!(get.parameters[0].location, ParameterLocation::Path);
    assert!(get.parameters[0].required);
    assert_eq!(get.parameters[0].pattern.as_deref(), Some("[0-9]+"));
    assert_eq!(get.responses["200"].schema, Some(Schema::reference("User")));
    assert_eq!(get.responses["404"].description, "Not Found");

    let tags: Vec<&str> = doc.tags.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(tags, vec!["users"]);
}

#[test]
fn test_verb_inference_and_status_override() {
    let doc = run(&load_config());

    // No parameters: GET
    let list = doc
        .operation("/users", HttpMethod::Get)
        .expect("listUsers should be a GET");
    assert_eq!(list.operation_id, "listUsers");
    assert_eq!(list.summary, "");
    assert_eq!(
        list.responses["200"].schema,
        Some(Schema::array(Schema::reference("User")))
    );

    // Body parameter: POST, with the single response re-keyed to 201
    let create = doc
        .operation("/users", HttpMethod::Post)
        .expect("createUser should be a POST");
    assert_eq!(create.summary, "Creates a User.");
    assert!(create.body_parameter().is_some());
    assert_eq!(create.responses.len(), 1);
    assert_eq!(create.responses["201"].schema, Some(Schema::reference("User")));

    // Query parameter only and no default verb: skipped
    assert!(doc.paths.get("/users/search").is_none());
}

#[test]
fn test_default_http_method_routes_remaining_methods() {
    let mut config = load_config();
    config.default_http_method = Some(HttpMethod::Get);
    let doc = run(&config);

    let search = doc
        .operation("/users/search", HttpMethod::Get)
        .expect("search should use the default verb");
    assert_eq!(search.summary, "Finds users by keyword.");
    assert_eq!(search.parameters[0].name, "q");
    assert_eq!(search.parameters[0].location, ParameterLocation::Query);
}

#[test]
fn test_model_properties_carry_comments_and_rules() {
    let doc = run(&load_config());

    let user = &doc.definitions["User"];
    assert_eq!(user.required, vec!["name".to_string()]);

    let name = &user.properties["name"];
    assert_eq!(name.description.as_deref(), Some("Display name."));
    assert_eq!(name.vendor_extensions[RULES_EXTENSION][0]["required"], true);

    let email = &user.properties["email"];
    assert!(email.description.is_none());
    assert_eq!(email.vendor_extensions[RULES_EXTENSION][0]["pattern"], ".+@.+");
}

#[test]
fn test_both_comment_strategies_agree() {
    let mut syntax = load_config();
    syntax.comment_strategy = CommentStrategy::Syntax;
    let mut regex = load_config();
    regex.comment_strategy = CommentStrategy::Regex;

    assert_eq!(run(&syntax), run(&regex));
}

#[test]
fn test_rpc_end_to_end_generation() {
    let mut config = load_config();
    config.reader = ReaderKind::Rpc;
    config.selector = Default::default();
    let doc = run(&config);

    let paths: Vec<&str> = doc.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/UserProvider/find"]);

    let find = doc
        .operation("/UserProvider/find", HttpMethod::Post)
        .expect("find should be a POST");
    assert_eq!(find.operation_id, "UserProvider/find");
    assert_eq!(find.summary, "Looks a user up by id.");
    assert_eq!(find.responses["default"].schema, Some(Schema::reference("User")));
}

#[test]
fn test_no_matching_classes_is_an_error() {
    let mut config = load_config();
    config.selector.name_suffixes = vec!["Endpoint".to_string()];
    let manifest = Manifest::load(&fixture("manifest.yaml")).unwrap();

    let result = generate(&manifest, &CommentStore::new(), &config);
    assert!(matches!(result, Err(Error::NoInputClasses)));
}

#[test]
fn test_serialized_outputs() {
    let doc = run(&load_config());
    let temp_dir = TempDir::new().unwrap();

    let yaml_path = temp_dir.path().join("out").join("swagger.yaml");
    write_to_file(&serialize_yaml(&doc).unwrap(), &yaml_path).unwrap();
    let yaml = std::fs::read_to_string(&yaml_path).unwrap();
    assert!(yaml.contains("/users/{id}"));
    assert!(yaml.contains("operationId: getUser"));

    let json = serialize_json(&doc).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["swagger"], "2.0");
    assert_eq!(parsed["basePath"], "/api");
    assert_eq!(
        parsed["paths"]["/users/{id}"]["get"]["responses"]["200"]["schema"]["$ref"],
        "#/definitions/User"
    );
    assert_eq!(
        parsed["definitions"]["User"]["properties"]["name"][RULES_EXTENSION][0]["required"],
        true
    );
}
