//! Per-actor handler registration and the dispatch fast path.
//!
//! Handlers are registered against concrete message types and looked up at
//! dispatch time by the runtime type of the incoming message. A dense cache
//! indexed by the small integer message identity pins the hot path to a
//! single array read: the first dispatch of an identity consults the type
//! map and memoizes the result (or a negative entry when no handler exists),
//! so every later dispatch of that identity skips the map entirely.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::Context;
use crate::message::Message;

/// Number of message identities served by the dense dispatch cache.
pub const HANDLER_CACHE_SIZE: usize = 512;

/// Type-erased handler invoked with the concrete behavior and message.
pub type HandlerFn<A> = Arc<dyn Fn(&mut A, &dyn Message, &mut Context<'_>) + Send + Sync>;

/// Handler table for a behavior type `A`.
///
/// Written during actor construction and read-only afterwards; the cache
/// entries are only written from inside the actor's dispatch mutex.
pub struct HandlerTable<A> {
    by_type: HashMap<TypeId, HandlerFn<A>>,
    cache: Box<[Option<HandlerFn<A>>]>,
    negative: Box<[bool]>,
}

impl<A> HandlerTable<A> {
    pub(crate) fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            cache: (0..HANDLER_CACHE_SIZE).map(|_| None).collect(),
            negative: vec![false; HANDLER_CACHE_SIZE].into_boxed_slice(),
        }
    }

    /// Register a typed handler for message type `M`.
    ///
    /// A later registration for the same type replaces the earlier one.
    pub fn on<M: Message>(
        &mut self,
        handler: impl Fn(&mut A, &M, &mut Context<'_>) + Send + Sync + 'static,
    ) {
        let erased: HandlerFn<A> = Arc::new(move |actor, msg, ctx| {
            if let Some(typed) = msg.as_any().downcast_ref::<M>() {
                handler(actor, typed, ctx);
            }
        });
        self.by_type.insert(TypeId::of::<M>(), erased);
    }

    /// Resolve the handler for a message, memoizing through the cache.
    ///
    /// Returns `None` when the actor has no handler for this type; the
    /// caller falls through to the behavior's `unhandled` hook.
    pub(crate) fn lookup(&mut self, msg: &dyn Message) -> Option<HandlerFn<A>> {
        let id = msg.message_id() as usize;
        if id < HANDLER_CACHE_SIZE {
            if let Some(cached) = &self.cache[id] {
                return Some(Arc::clone(cached));
            }
            if self.negative[id] {
                return None;
            }
        }

        let type_id = msg.as_any().type_id();
        match self.by_type.get(&type_id).cloned() {
            Some(handler) => {
                if id < HANDLER_CACHE_SIZE {
                    self.cache[id] = Some(Arc::clone(&handler));
                }
                Some(handler)
            }
            None => {
                if id < HANDLER_CACHE_SIZE {
                    self.negative[id] = true;
                }
                None
            }
        }
    }

    #[cfg(test)]
    fn cached(&self, id: usize) -> Option<&HandlerFn<A>> {
        self.cache[id].as_ref()
    }
}
