use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::event::{AsyncEventHandler, Event, EventId, EventResult};

/// Owned future resolving to a handler's verdict
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = EventResult> + Send + 'a>>;

pub type NamedHandlerFn = Box<dyn Fn(&dyn Event) -> BoxFuture<'_> + Send + Sync>;

pub type TypedHandlerFn<E> = Box<dyn Fn(&E) -> BoxFuture<'_> + Send + Sync>;

type HandlerList = Vec<(EventId, Box<dyn AsyncEventHandler>)>;

struct NamedHandler {
    handler: NamedHandlerFn,
}

#[async_trait]
impl AsyncEventHandler for NamedHandler {
    async fn handle(&self, event: &dyn Event) -> EventResult {
        (self.handler)(event).await
    }
}

/// Runs only for events of type `E`
struct TypedHandler<E: Event> {
    handler: TypedHandlerFn<E>,
}

#[async_trait]
impl<E: Event> AsyncEventHandler for TypedHandler<E> {
    async fn handle(&self, event: &dyn Event) -> EventResult {
        match event.as_any().downcast_ref::<E>() {
            Some(typed) => (self.handler)(typed).await,
            None => EventResult::Continue,
        }
    }
}

/// Name- and type-keyed handler tables.
///
/// Named handlers run before typed ones; a handler returning
/// [`EventResult::Stop`] ends the dispatch of that event.
pub struct EventDispatcher {
    named: HashMap<&'static str, HandlerList>,
    typed: HashMap<TypeId, HandlerList>,
    next_id: EventId,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            named: HashMap::new(),
            typed: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn register_handler(&mut self, event_name: &'static str, handler: NamedHandlerFn) -> EventId {
        let id = self.allocate_id();
        self.named.entry(event_name).or_default().push((id, Box::new(NamedHandler { handler })));
        id
    }

    pub fn register_type_handler<E: Event>(&mut self, handler: TypedHandlerFn<E>) -> EventId {
        let id = self.allocate_id();
        self.typed.entry(TypeId::of::<E>()).or_default().push((id, Box::new(TypedHandler { handler })));
        id
    }

    /// Remove a handler from whichever table holds it.
    pub fn unregister_handler(&mut self, id: EventId) -> bool {
        let mut found = false;
        for handlers in self.named.values_mut().chain(self.typed.values_mut()) {
            let before = handlers.len();
            handlers.retain(|(handler_id, _)| *handler_id != id);
            found |= handlers.len() < before;
        }
        found
    }

    pub async fn dispatch(&self, event: &dyn Event) -> EventResult {
        let named = self.named.get(event.name()).into_iter().flatten();
        let typed = self.typed.get(&event.as_any().type_id()).into_iter().flatten();
        for (_, handler) in named.chain(typed) {
            if handler.handle(event).await == EventResult::Stop {
                return EventResult::Stop;
            }
        }
        EventResult::Continue
    }

    pub fn handler_count(&self) -> usize {
        self.named.values().chain(self.typed.values()).map(Vec::len).sum()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("handlers", &self.handler_count())
            .finish()
    }
}

/// Cloneable handle to one dispatcher, shared by every service of an application
#[derive(Clone, Default)]
pub struct SharedEventDispatcher {
    dispatcher: Arc<Mutex<EventDispatcher>>,
}

impl SharedEventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dispatch(&self, event: &dyn Event) -> EventResult {
        log::debug!("Dispatching {}", event.name());
        self.dispatcher.lock().await.dispatch(event).await
    }

    pub async fn register_handler(&self, event_name: &'static str, handler: NamedHandlerFn) -> EventId {
        self.dispatcher.lock().await.register_handler(event_name, handler)
    }

    pub async fn register_type_handler<E: Event>(&self, handler: TypedHandlerFn<E>) -> EventId {
        self.dispatcher.lock().await.register_type_handler::<E>(handler)
    }

    pub async fn unregister_handler(&self, id: EventId) -> bool {
        self.dispatcher.lock().await.unregister_handler(id)
    }
}

impl fmt::Debug for SharedEventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedEventDispatcher").finish_non_exhaustive()
    }
}

/// Wrap a synchronous function as a named handler.
pub fn sync_event_handler<F>(f: F) -> NamedHandlerFn
where
    F: Fn(&dyn Event) -> EventResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(async move { result })
    })
}

/// Wrap a synchronous function as a typed handler.
pub fn sync_typed_handler<E, F>(f: F) -> TypedHandlerFn<E>
where
    E: Event,
    F: Fn(&E) -> EventResult + Send + Sync + 'static,
{
    Box::new(move |event| {
        let result = f(event);
        Box::pin(async move { result })
    })
}
