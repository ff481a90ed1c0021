use crate::model::platform::{Environment, EnvironmentOverrides, PlatformConstraints};

fn linux_gtk() -> Environment {
    Environment::new("linux", "gtk", "x86_64", "en_US")
}

fn constraints(os: Option<&str>, ws: Option<&str>, arch: Option<&str>, nl: Option<&str>) -> PlatformConstraints {
    PlatformConstraints {
        os: os.map(str::to_string),
        ws: ws.map(str::to_string),
        arch: arch.map(str::to_string),
        nl: nl.map(str::to_string),
    }
}

#[test]
fn test_unconstrained_matches_everything() {
    assert!(PlatformConstraints::default().matches(&linux_gtk()));
    assert!(constraints(Some("*"), Some(""), Some(" "), None).matches(&linux_gtk()));
}

#[test]
fn test_token_lists_match_case_insensitively() {
    let env = linux_gtk();
    assert!(constraints(Some("win32, Linux"), None, None, None).matches(&env));
    assert!(constraints(None, Some("motif,GTK"), Some("x86_64"), None).matches(&env));
    assert!(!constraints(Some("win32,macosx"), None, None, None).matches(&env));
    assert!(!constraints(None, None, Some("aarch64"), None).matches(&env));
}

#[test]
fn test_locale_matches_on_prefix() {
    let env = linux_gtk();
    assert!(constraints(None, None, None, Some("en")).matches(&env));
    assert!(constraints(None, None, None, Some("fr,EN_us")).matches(&env));
    assert!(constraints(None, None, None, Some("en_US_posix")).matches(&Environment::new("linux", "gtk", "x86_64", "en")));
    assert!(!constraints(None, None, None, Some("de,fr")).matches(&env));
}

#[test]
fn test_overrides_replace_detected_values() {
    let overrides = EnvironmentOverrides {
        os: Some("win32".to_string()),
        nl: Some("ja".to_string()),
        ..Default::default()
    };
    let env = linux_gtk().with_overrides(&overrides);
    assert_eq!(env, Environment::new("win32", "gtk", "x86_64", "ja"));
}

#[test]
fn test_current_environment_is_populated() {
    let env = Environment::current();
    assert_eq!(env.os, std::env::consts::OS);
    assert_eq!(env.arch, std::env::consts::ARCH);
    assert!(!env.ws.is_empty());
    assert!(!env.nl.is_empty());
}
