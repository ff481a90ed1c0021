use std::path::PathBuf;
use std::sync::Arc;

use crate::event::dispatcher::{sync_typed_handler, SharedEventDispatcher};
use crate::event::{Event, EventResult, SiteEvent};
use crate::model::VersionedIdentifier;

fn feature() -> VersionedIdentifier {
    VersionedIdentifier::parse("org.example.editor", "1.0.0").unwrap()
}

#[test]
fn test_site_event_names() {
    let site = PathBuf::from("/sites/main");
    let installed = SiteEvent::FeatureInstalled { site: site.clone(), feature: feature() };
    assert_eq!(installed.name(), SiteEvent::FEATURE_INSTALLED);
    assert_eq!(installed.feature(), Some(&feature()));
    assert_eq!(installed.site(), &site);

    let reverted = SiteEvent::Reverted { site, from: 4, configuration: 5 };
    assert_eq!(reverted.name(), "site.reverted");
    assert_eq!(reverted.feature(), None);
}

#[tokio::test]
async fn test_typed_site_handler() {
    let dispatcher = SharedEventDispatcher::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher
        .register_type_handler::<SiteEvent>(sync_typed_handler(move |event: &SiteEvent| {
            sink.lock().unwrap().push(event.name());
            EventResult::Continue
        }))
        .await;

    let site = PathBuf::from("/s");
    dispatcher.dispatch(&SiteEvent::FeatureConfigured { site: site.clone(), feature: feature() }).await;
    dispatcher.dispatch(&SiteEvent::FeatureUnconfigured { site, feature: feature() }).await;

    assert_eq!(*seen.lock().unwrap(), vec![SiteEvent::FEATURE_CONFIGURED, SiteEvent::FEATURE_UNCONFIGURED]);
}
