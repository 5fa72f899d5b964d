use sheetlog::auth::{AuthConfig, Credential, MethodGrant, Permission, User, is_strong_password};
use sheetlog::{ConfigError, Method};
use std::collections::BTreeSet;
use std::io::Write;

#[test]
fn strength_policy() {
    assert!(is_strong_password("Passw0rd!"));
    assert!(is_strong_password("a B3 cdef"));
    assert!(!is_strong_password("Pa0!"));
    assert!(!is_strong_password("password0!"));
    assert!(!is_strong_password("PASSWORD0!"));
    assert!(!is_strong_password("Password!!"));
    assert!(!is_strong_password("Password00"));
    println!("✓ keys need length, both cases, a digit and a symbol");
}

#[test]
fn default_config_is_anonymous_and_open() {
    let auth = AuthConfig::default();
    assert!(auth.authorize("", "anything", "GET"));
    assert!(auth.authorize("", "anything", "NOT_A_METHOD"));
    assert!(auth.is_strong_key(""));
    assert_eq!(auth.unsafe_users(), vec!["anonymous"]);
}

#[test]
fn users_file_accepts_bare_arrays() {
    let auth = AuthConfig::from_json(
        r#"[{"name": "a", "key": "K3y!aaaa", "permissions": "GET"}]"#,
    )
    .unwrap();
    let user = auth.resolve_user("K3y!aaaa").unwrap();
    assert_eq!(
        user.permissions,
        Permission::Methods(BTreeSet::from([Method::Get]))
    );
    assert!(auth.authorize("K3y!aaaa", "logs", "GET"));
    assert!(!auth.authorize("K3y!aaaa", "logs", "PUT"));
    assert!(!auth.authorize("K3y!aaaa", "logs", "NOT_A_METHOD"));
}

#[test]
fn users_file_is_loaded_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"users": [{{"name": "p", "key": {{"__unsafe": "dev"}}, "permissions": {{"Logs": ["get", "post"]}}}}]}}"#
    )
    .unwrap();

    let auth = AuthConfig::load(file.path()).unwrap();
    assert_eq!(auth.users().len(), 1);
    assert!(auth.users()[0].key.is_unsafe());
    assert!(auth.authorize("dev", "LOGS", "POST"));
    assert!(!auth.authorize("dev", "other", "GET"));
    assert!(auth.is_strong_key("dev"));
}

#[test]
fn unknown_methods_in_grants_are_rejected() {
    let err = AuthConfig::from_json(r#"[{"name": "a", "key": "k", "permissions": ["GET", "FLY"]}]"#)
        .unwrap_err();
    let ConfigError::JsonError(err) = err else {
        panic!("expected a parse error, got {:?}", err);
    };
    assert!(err.to_string().contains("FLY"));

    let missing = AuthConfig::load("/definitely/not/here.json").unwrap_err();
    assert!(matches!(missing, ConfigError::IoError(_)));
}

#[test]
fn sheet_grants_match_case_insensitively_in_order() {
    let permission = Permission::BySheet(vec![
        ("Logs".to_string(), MethodGrant::All),
        ("logs".to_string(), MethodGrant::Methods(BTreeSet::new())),
        ("ALL".to_string(), MethodGrant::Methods(BTreeSet::from([Method::Get]))),
    ]);
    let auth = AuthConfig::new(vec![User::new(
        "u",
        Credential::Plain("Str0ng!key".to_string()),
        permission,
    )]);

    assert!(auth.authorize("Str0ng!key", "logs", "DELETE"));
    assert!(auth.authorize("Str0ng!key", "events", "GET"));
    assert!(!auth.authorize("Str0ng!key", "events", "POST"));
    assert!(!auth.authorize("wrong", "logs", "GET"));
    println!("✓ first matching sheet grant wins, ALL covers the rest");
}

#[test]
fn first_matching_user_wins() {
    let auth = AuthConfig::new(vec![
        User::new("first", Credential::Plain("Same!key1".to_string()), Permission::All),
        User::new(
            "second",
            Credential::Plain("Same!key1".to_string()),
            Permission::Methods(BTreeSet::new()),
        ),
    ]);
    assert_eq!(auth.resolve_user("Same!key1").map(|u| u.name.as_str()), Some("first"));
    assert!(auth.authorize("Same!key1", "logs", "PUT"));
}
