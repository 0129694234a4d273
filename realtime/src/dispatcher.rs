//! Turns raw frames into updates and routes them to registered handlers.
//!
//! The only de-duplication is origin suppression: updates carrying the local session id
//! are never handed to handlers. Handler failures, including panics, are isolated per
//! handler and never affect siblings or later updates.

use crate::connection::TransportKind;
use chrono::Utc;
use events::{
    decode_inbound, Category, ControlMessage, DecodeError, Inbound, OriginId, Page, Update,
    UpdateKind,
};
use log::*;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Reacts to updates of one category, typically by asking the page to re-fetch.
pub trait UpdateHandler: Send + Sync {
    fn handle(&self, update: &Update) -> Result<(), HandlerError>;
}

impl<F> UpdateHandler for F
where
    F: Fn(&Update) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, update: &Update) -> Result<(), HandlerError> {
        self(update)
    }
}

/// Category to handlers, in registration order. Append only.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<Category, Vec<Arc<dyn UpdateHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registering the same handler twice runs it twice.
    pub fn register(&mut self, category: Category, handler: Arc<dyn UpdateHandler>) {
        self.handlers.entry(category).or_default().push(handler);
        info!("Registered update handler for type: {category}");
    }

    pub fn handlers_for(&self, category: Category) -> &[Arc<dyn UpdateHandler>] {
        self.handlers
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded FIFO of recently dispatched updates, for diagnostics only.
#[derive(Debug, Clone)]
pub struct UpdateHistory {
    capacity: usize,
    entries: VecDeque<Update>,
}

impl UpdateHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends, evicting the oldest entry when full.
    pub fn push(&mut self, update: Update) -> &Update {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(update);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Update> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Update> {
        self.entries.back()
    }
}

/// Result of parsing one frame.
#[derive(Debug)]
pub enum Parsed {
    Update(Update),
    Control(ControlMessage),
    /// Malformed; already logged.
    Drop(DecodeError),
}

/// What dispatching one update did.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Originated from this session.
    Suppressed,
    Delivered(Delivery),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub kind: UpdateKind,
    pub handlers_run: usize,
    pub handler_failures: usize,
    /// Set when the update concerns the current page and the user should be told.
    pub notice: Option<String>,
}

pub struct UpdateDispatcher {
    local_session: OriginId,
    page: Page,
    history: UpdateHistory,
    registry: HandlerRegistry,
}

impl UpdateDispatcher {
    pub fn new(local_session: OriginId, page: Page, history_capacity: usize) -> Self {
        Self::with_registry(local_session, page, history_capacity, HandlerRegistry::new())
    }

    pub fn with_registry(
        local_session: OriginId,
        page: Page,
        history_capacity: usize,
        registry: HandlerRegistry,
    ) -> Self {
        Self {
            local_session,
            page,
            history: UpdateHistory::new(history_capacity),
            registry,
        }
    }

    pub fn history(&self) -> &UpdateHistory {
        &self.history
    }

    pub fn register_handler(&mut self, category: Category, handler: Arc<dyn UpdateHandler>) {
        self.registry.register(category, handler);
    }

    /// Never fails across the transport boundary: malformed frames become `Parsed::Drop`.
    pub fn parse(&self, raw: &str, transport: TransportKind) -> Parsed {
        match decode_inbound(raw) {
            Ok(Inbound::Update(wire)) => Parsed::Update(Update::from_wire(wire, Utc::now())),
            Ok(Inbound::Control(control)) => Parsed::Control(control),
            Err(e) => {
                warn!("Dropping malformed frame from {transport}: {e}");
                Parsed::Drop(e)
            }
        }
    }

    pub fn should_deliver(&self, update: &Update) -> bool {
        update.origin_id != self.local_session
    }

    /// Records the update and runs its category's handlers in registration order.
    pub fn dispatch(&mut self, update: Update) -> Dispatch {
        if !self.should_deliver(&update) {
            debug!("Ignoring own update: {}", update.kind);
            return Dispatch::Suppressed;
        }

        debug!("Processing real-time update: {} from {}", update.kind, update.origin_id);

        let notice = is_relevant(&update, self.page).then(|| notice_message(&update));
        let kind = update.kind;
        let update = self.history.push(update);

        let mut handlers_run = 0;
        let mut handler_failures = 0;
        if let Some(category) = kind.category() {
            for handler in self.registry.handlers_for(category) {
                handlers_run += 1;
                if !invoke(category, handler.as_ref(), update) {
                    handler_failures += 1;
                }
            }
        }

        Dispatch::Delivered(Delivery {
            kind,
            handlers_run,
            handler_failures,
            notice,
        })
    }
}

fn invoke(category: Category, handler: &dyn UpdateHandler, update: &Update) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(update))) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!("Error in update handler for {category}: {e}");
            false
        }
        Err(_) => {
            error!("Update handler for {category} panicked");
            false
        }
    }
}

/// Whether an update concerns what `page` is showing.
pub fn is_relevant(update: &Update, page: Page) -> bool {
    if matches!(
        update.kind,
        UpdateKind::Heartbeat | UpdateKind::CacheInvalidate(_)
    ) {
        return false;
    }
    if page != Page::Unknown && update.scope_page == Some(page) {
        return true;
    }

    let same_house = || match (page.house(), update.house()) {
        (Some(page_house), Some(house)) => page_house.eq_ignore_ascii_case(house),
        _ => false,
    };

    match update.kind.category() {
        Some(Category::Prefect) => same_house() || matches!(page, Page::Dashboard | Page::Main),
        Some(Category::Event) => matches!(page, Page::Events | Page::Dashboard),
        Some(Category::Attendance) => true,
        Some(Category::Offense) => same_house() || page == Page::Dashboard,
        None => false,
    }
}

/// The text of the transient notice for an update from another session.
pub fn notice_message(update: &Update) -> String {
    let label = update.label().unwrap_or("Unknown");
    match update.kind {
        UpdateKind::EntityCreated(Category::Prefect) => format!("New prefect added: {label}"),
        UpdateKind::EntityUpdated(Category::Prefect) => format!("Prefect updated: {label}"),
        UpdateKind::EntityDeleted(Category::Prefect) => format!("Prefect deleted: {label}"),
        UpdateKind::EntityCreated(Category::Event) => format!("New event created: {label}"),
        UpdateKind::EntityUpdated(Category::Event) => format!("Event updated: {label}"),
        UpdateKind::EntityDeleted(Category::Event) => format!("Event deleted: {label}"),
        UpdateKind::RelationAdded(Category::Attendance) => "Attendee added to event".to_string(),
        UpdateKind::RelationRemoved(Category::Attendance) => {
            "Attendee removed from event".to_string()
        }
        UpdateKind::EntityCreated(Category::Offense)
        | UpdateKind::RelationAdded(Category::Offense) => "New offense recorded".to_string(),
        _ => "Data updated by another user".to_string(),
    }
}
