use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::Mutex;

use crate::event::dispatcher::{sync_event_handler, sync_typed_handler, EventDispatcher, SharedEventDispatcher};
use crate::event::{Event, EventResult};

#[derive(Debug, Clone)]
struct Ping {
    name: &'static str,
    data: String,
}

impl Ping {
    fn new(name: &'static str, data: &str) -> Self {
        Self { name, data: data.to_string() }
    }
}

impl Event for Ping {
    fn name(&self) -> &'static str {
        self.name
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[derive(Debug, Clone)]
struct Pong;

impl Event for Pong {
    fn name(&self) -> &'static str {
        "pong"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

fn counting(counter: &Arc<AtomicU32>) -> crate::event::dispatcher::NamedHandlerFn {
    let counter = counter.clone();
    sync_event_handler(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        EventResult::Continue
    })
}

#[tokio::test]
async fn test_named_handler_only_sees_its_name() {
    let mut dispatcher = EventDispatcher::new();
    let counter = Arc::new(AtomicU32::new(0));
    let id = dispatcher.register_handler("ping", counting(&counter));
    assert!(id > 0);

    assert_eq!(dispatcher.dispatch(&Ping::new("ping", "a")).await, EventResult::Continue);
    dispatcher.dispatch(&Pong).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_typed_handler_receives_concrete_event() {
    let mut dispatcher = EventDispatcher::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher.register_type_handler::<Ping>(sync_typed_handler(move |ping: &Ping| {
        sink.lock().unwrap().push(ping.data.clone());
        EventResult::Continue
    }));

    dispatcher.dispatch(&Ping::new("first", "one")).await;
    dispatcher.dispatch(&Pong).await;
    dispatcher.dispatch(&Ping::new("second", "two")).await;

    assert_eq!(*seen.lock().unwrap(), vec!["one".to_string(), "two".to_string()]);
}

#[tokio::test]
async fn test_stop_ends_dispatch() {
    let mut dispatcher = EventDispatcher::new();
    let counter = Arc::new(AtomicU32::new(0));
    dispatcher.register_handler("ping", sync_event_handler(|_| EventResult::Stop));
    dispatcher.register_handler("ping", counting(&counter));
    dispatcher.register_type_handler::<Ping>(sync_typed_handler({
        let counter = counter.clone();
        move |_: &Ping| {
            counter.fetch_add(1, Ordering::SeqCst);
            EventResult::Continue
        }
    }));

    assert_eq!(dispatcher.dispatch(&Ping::new("ping", "")).await, EventResult::Stop);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unregister_handler() {
    let mut dispatcher = EventDispatcher::new();
    let counter = Arc::new(AtomicU32::new(0));
    let named = dispatcher.register_handler("ping", counting(&counter));
    let typed = dispatcher.register_type_handler::<Ping>(sync_typed_handler(|_: &Ping| EventResult::Continue));
    assert_eq!(dispatcher.handler_count(), 2);

    assert!(dispatcher.unregister_handler(named));
    assert!(dispatcher.unregister_handler(typed));
    assert!(!dispatcher.unregister_handler(named));
    assert_eq!(dispatcher.handler_count(), 0);

    dispatcher.dispatch(&Ping::new("ping", "")).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_async_handler() {
    let dispatcher = SharedEventDispatcher::new();
    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();
    dispatcher
        .register_handler("ping", Box::new(move |event: &dyn Event| {
            let sink = sink.clone();
            let name = event.name().to_string();
            Box::pin(async move {
                *sink.lock().await = Some(name);
                EventResult::Continue
            })
        }))
        .await;

    dispatcher.dispatch(&Ping::new("ping", "")).await;
    assert_eq!(received.lock().await.as_deref(), Some("ping"));
}

#[tokio::test]
async fn test_shared_dispatcher_clones_share_handlers() {
    let dispatcher = SharedEventDispatcher::new();
    let counter = Arc::new(AtomicU32::new(0));
    let id = dispatcher.register_handler("pong", counting(&counter)).await;

    let clone = dispatcher.clone();
    clone.dispatch(&Pong).await;
    clone.dispatch(&Pong).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    assert!(dispatcher.unregister_handler(id).await);
    dispatcher.dispatch(&Pong).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
