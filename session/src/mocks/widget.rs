use super::lock;
use crate::config::Callbacks;
use crate::metadata::{ExitOptions, SubmissionData};
use crate::providers::{
    EmbedTarget, EmbeddedHandle, LibraryLookup, WidgetConfig, WidgetFactory, WidgetHandle,
    WidgetLibrary,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Widget lifecycle event, recorded in call order across all instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// An instance was created. Instances are numbered from 1.
    Created {
        /// Instance number
        instance: usize,
        /// Token it was created with
        token: String,
        /// Mount target, for embedded instances
        embedded: Option<EmbedTarget>,
    },
    /// `open()`
    Opened {
        /// Instance number
        instance: usize,
    },
    /// `submit()`
    Submitted {
        /// Instance number
        instance: usize,
    },
    /// `exit()`
    Exited {
        /// Instance number
        instance: usize,
        /// Whether the exit was forced
        force: bool,
    },
    /// `destroy()`
    Destroyed {
        /// Instance number
        instance: usize,
    },
}

type EventLog = Arc<Mutex<Vec<WidgetEvent>>>;

/// Widget factory recording every instance's lifecycle.
///
/// Creating an instance fires its `on_load` callback immediately.
#[derive(Debug, Clone, Default)]
pub struct MockWidgetFactory {
    events: EventLog,
    configs: Arc<Mutex<Vec<WidgetConfig>>>,
}

impl MockWidgetFactory {
    /// Factory with no instances yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<WidgetEvent> {
        lock(&self.events).clone()
    }

    /// Number of instances created.
    #[must_use]
    pub fn created(&self) -> usize {
        lock(&self.configs).len()
    }

    /// Number of instances created and not destroyed.
    #[must_use]
    pub fn live(&self) -> usize {
        let destroyed = lock(&self.events)
            .iter()
            .filter(|event| matches!(event, WidgetEvent::Destroyed { .. }))
            .count();
        self.created() - destroyed
    }

    /// Callbacks handed to `instance` (numbered from 1), as the widget
    /// library would invoke them.
    #[must_use]
    pub fn callbacks(&self, instance: usize) -> Option<Callbacks> {
        let configs = lock(&self.configs);
        instance
            .checked_sub(1)
            .and_then(|index| configs.get(index))
            .map(|config| config.callbacks.clone())
    }

    /// Configuration handed to the most recent instance.
    #[must_use]
    pub fn last_config(&self) -> Option<WidgetConfig> {
        lock(&self.configs).last().cloned()
    }

    fn register(&self, config: WidgetConfig, embedded: Option<EmbedTarget>) -> MockWidgetHandle {
        let callbacks = config.callbacks.clone();
        let instance = {
            let mut configs = lock(&self.configs);
            lock(&self.events).push(WidgetEvent::Created {
                instance: configs.len() + 1,
                token: config.token.clone(),
                embedded,
            });
            configs.push(config);
            configs.len()
        };

        callbacks.load();

        MockWidgetHandle {
            instance,
            events: Arc::clone(&self.events),
        }
    }
}

impl WidgetFactory for MockWidgetFactory {
    fn create(&self, config: WidgetConfig) -> Arc<dyn WidgetHandle> {
        Arc::new(self.register(config, None))
    }

    fn create_embedded(
        &self,
        config: WidgetConfig,
        target: &EmbedTarget,
    ) -> Arc<dyn EmbeddedHandle> {
        Arc::new(self.register(config, Some(target.clone())))
    }
}

/// Instance created by [`MockWidgetFactory`].
#[derive(Debug)]
struct MockWidgetHandle {
    instance: usize,
    events: EventLog,
}

impl MockWidgetHandle {
    fn record(&self, event: WidgetEvent) {
        lock(&self.events).push(event);
    }
}

impl WidgetHandle for MockWidgetHandle {
    fn open(&self) {
        self.record(WidgetEvent::Opened {
            instance: self.instance,
        });
    }

    fn submit(&self, _data: &SubmissionData) {
        self.record(WidgetEvent::Submitted {
            instance: self.instance,
        });
    }

    fn exit(&self, options: ExitOptions) {
        self.record(WidgetEvent::Exited {
            instance: self.instance,
            force: options.force,
        });
    }

    fn destroy(&self) {
        self.record(WidgetEvent::Destroyed {
            instance: self.instance,
        });
    }
}

impl EmbeddedHandle for MockWidgetHandle {
    fn destroy(&self) {
        self.record(WidgetEvent::Destroyed {
            instance: self.instance,
        });
    }
}

/// Widget library lookup with a fixed outcome.
#[derive(Clone)]
pub struct MockWidgetLibrary {
    lookup: LibraryLookup,
    lookups: Arc<AtomicUsize>,
}

impl MockWidgetLibrary {
    fn with_lookup(lookup: LibraryLookup) -> Self {
        Self {
            lookup,
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The library is installed and backed by `factory`.
    #[must_use]
    pub fn present(factory: MockWidgetFactory) -> Self {
        Self::with_lookup(LibraryLookup::Present(Arc::new(factory)))
    }

    /// The script ran but the library is missing.
    #[must_use]
    pub fn absent() -> Self {
        Self::with_lookup(LibraryLookup::Absent)
    }

    /// There is no browser environment.
    #[must_use]
    pub fn non_browser() -> Self {
        Self::with_lookup(LibraryLookup::NonBrowser)
    }

    /// Number of lookups so far.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl WidgetLibrary for MockWidgetLibrary {
    fn lookup(&self) -> LibraryLookup {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup.clone()
    }
}

impl std::fmt::Debug for MockWidgetLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockWidgetLibrary")
            .field("lookup", &self.lookup)
            .field("lookups", &self.lookups())
            .finish()
    }
}
