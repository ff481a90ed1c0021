use std::path::Path;
use std::sync::Arc;

use crate::site::configuration::{Activity, ActivityAction, InstallConfiguration};
use crate::site::error::SiteError;
use crate::site::history::ConfigurationHistory;
use crate::tests::integration::common::vid;

fn push(history: &ConfigurationHistory, label: &str) -> (ConfigurationHistory, u64) {
    history.with_configuration(InstallConfiguration::new(label))
}

#[test]
fn test_new_configuration_becomes_only_current() {
    let history = ConfigurationHistory::new(10);
    assert!(history.current().is_none());

    let (history, first) = push(&history, "first");
    let (history, second) = push(&history, "second");
    assert_eq!((first, second), (1, 2));
    assert_eq!(history.current().map(|c| c.id), Some(second));
    assert_eq!(history.configurations().iter().filter(|c| c.current).count(), 1);
    assert_eq!(history.configurations()[0].label, "first");
}

#[test]
fn test_snapshots_are_independent() {
    let (history, _) = push(&ConfigurationHistory::new(10), "first");
    let before = Arc::new(history);
    let (after, _) = push(&before, "second");
    assert_eq!(before.len(), 1);
    assert_eq!(after.len(), 2);
    assert!(before.configurations()[0].current);
}

#[test]
fn test_eviction_skips_current_and_preserved() {
    let mut history = ConfigurationHistory::new(3);
    for label in ["one", "two", "three"] {
        history = push(&history, label).0;
    }
    history = history.with_preserved(1, true).unwrap();

    let (history, _) = push(&history, "four");
    let ids: Vec<u64> = history.configurations().iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 3, 4]);

    // Nothing evictable: the history grows past capacity
    let history = history.with_preserved(3, true).unwrap();
    let history = history.with_capacity(1);
    assert_eq!(history.len(), 3);
    assert_eq!(history.capacity(), 1);
}

#[test]
fn test_preserve_unknown_configuration() {
    let history = ConfigurationHistory::new(3);
    assert!(matches!(history.with_preserved(9, true), Err(SiteError::UnknownConfiguration(9))));
}

#[test]
fn test_activity_lands_on_current_configuration() {
    let empty = ConfigurationHistory::new(3);
    let failed = Activity::new(ActivityAction::FeatureInstalled, "f1_1.0.0").failed();
    assert!(matches!(empty.with_activity(failed.clone()), Err(SiteError::NoCurrentConfiguration)));

    let (history, _) = push(&empty, "first");
    let (history, current) = push(&history, "second");
    let (next, id) = history.with_activity(failed).unwrap();
    assert_eq!(id, current);
    assert_eq!(next.len(), 2);
    assert_eq!(next.current().map(|c| c.activities.len()), Some(1));
    assert!(next.get(1).map(|c| c.activities.is_empty()).unwrap_or(false));
    // The snapshot it came from is untouched
    assert!(history.current().map(|c| c.activities.is_empty()).unwrap_or(false));
}

#[test]
fn test_successor_keeps_features_not_activities() {
    let root = Path::new("/sites/main");
    let mut first = InstallConfiguration::new("first");
    first.configure(root, vid("f1", "1"));
    first.record(Activity::new(ActivityAction::FeatureInstalled, "f1_1.0.0"));
    first.preserved = true;

    let next = first.successor("second");
    assert!(next.is_configured(root, &vid("f1", "1")));
    assert!(next.activities.is_empty());
    assert!(!next.preserved);
    assert!(!next.is_configured(Path::new("/elsewhere"), &vid("f1", "1")));
}

#[test]
fn test_history_serde() {
    let mut configuration = InstallConfiguration::new("first");
    configuration.configure(Path::new("/s"), vid("f1", "1.2"));
    configuration.record(Activity::new(ActivityAction::FeatureConfigured, "f1").failed());
    let (history, _) = ConfigurationHistory::new(5).with_configuration(configuration);

    let json = serde_json::to_string(&history).unwrap();
    assert!(json.contains("\"feature_configured\""));
    assert!(json.contains("\"failed\""));
    let restored: ConfigurationHistory = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, history);
}
