//! Lifecycle notifications. Listeners are registered on the lightbox itself
//! rather than on a shared channel, and run synchronously in registration order.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// The chrome was built. Fires once per lightbox.
    Init,
    Loading,
    BeforeReveal,
    Reveal,
    /// Fires right after `Reveal`, for listeners that prefer the explicit name.
    AfterReveal,
    Close,
    AfterClose,
    /// A resolver gave up; the popup shows the failure message.
    Failed,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Hook::Init => "init",
            Hook::Loading => "loading",
            Hook::BeforeReveal => "beforeReveal",
            Hook::Reveal => "reveal",
            Hook::AfterReveal => "afterReveal",
            Hook::Close => "close",
            Hook::AfterClose => "afterClose",
            Hook::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(Hook)>;

#[derive(Default)]
pub struct Hooks {
    listeners: Vec<(SubscriptionId, Option<Hook>, Listener)>,
    next_id: u64,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls `listener` every time `hook` fires.
    pub fn on(&mut self, hook: Hook, listener: impl FnMut(Hook) + 'static) -> SubscriptionId {
        self.register(Some(hook), Box::new(listener))
    }

    /// Calls `listener` for every hook.
    pub fn on_any(&mut self, listener: impl FnMut(Hook) + 'static) -> SubscriptionId {
        self.register(None, Box::new(listener))
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _, _)| *sub != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub(crate) fn emit(&mut self, hook: Hook) {
        log::debug!("facybox: {hook}");
        for (_, filter, listener) in self.listeners.iter_mut() {
            if filter.is_none_or(|wanted| wanted == hook) {
                listener(hook);
            }
        }
    }

    fn register(&mut self, filter: Option<Hook>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, filter, listener));
        id
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
