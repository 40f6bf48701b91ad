use std::{collections::BTreeMap, sync::Arc, thread};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::events::UiEvent;

pub type SubscriberId = u32;

/// Events a subscriber may have queued before it is considered stalled and
/// dropped.
pub const MAILBOX_CAPACITY: usize = 256;

/// A live subscriber's mailbox. Dropping it, or unsubscribing the id, ends
/// delivery.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriberId,
    pub mailbox: mpsc::Receiver<Arc<str>>,
}

/// Fan-out of UI events to every connected client, one mailbox each.
#[derive(Debug, Default)]
pub struct Broadcaster {
    subscribers: Mutex<BTreeMap<SubscriberId, mpsc::Sender<Arc<str>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and queues `greeting` ahead of anything emitted
    /// afterwards. The greeting is built while the registry is locked, so no
    /// event can slip between it and the first broadcast the subscriber sees.
    pub fn subscribe_with(&self, greeting: impl FnOnce() -> Vec<UiEvent>) -> Subscription {
        let mut subscribers = self.subscribers.lock();
        let id = next_id(&subscribers);
        let (tx, mailbox) = mpsc::channel(MAILBOX_CAPACITY);
        for event in greeting() {
            let queued = event
                .to_wire()
                .map_err(|err| err.to_string())
                .and_then(|text| tx.try_send(Arc::from(text)).map_err(|err| err.to_string()));
            if let Err(err) = queued {
                error!(%err, subscriber = id, kind = event.kind(), "failed queueing greeting");
            }
        }
        subscribers.insert(id, tx);
        info!(subscriber = id, live = subscribers.len(), "ui subscriber connected");
        Subscription { id, mailbox }
    }

    /// Removes the subscriber and closes its mailbox. Returns whether the id
    /// was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let removed = subscribers.remove(&id).is_some();
        if removed {
            info!(subscriber = id, live = subscribers.len(), "ui subscriber disconnected");
        }
        removed
    }

    /// Serializes the event once and queues it on every live mailbox.
    /// Closed mailboxes and mailboxes left full by a stalled reader are
    /// dropped. Returns the number of subscribers it reached.
    pub fn emit(&self, event: &UiEvent) -> usize {
        let text: Arc<str> = match event.to_wire() {
            Ok(text) => Arc::from(text),
            Err(err) => {
                error!(?err, kind = event.kind(), "failed encoding ui event");
                return 0;
            }
        };

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&text)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = *id, "dropped stalled subscriber");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = *id, "pruned closed mailbox");
                false
            }
        });
        subscribers.len()
    }

    pub fn count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

fn next_id(subscribers: &BTreeMap<SubscriberId, mpsc::Sender<Arc<str>>>) -> SubscriberId {
    match subscribers.last_key_value() {
        None => 0,
        Some((max, _)) => max
            .checked_add(1)
            .or_else(|| (0..SubscriberId::MAX).find(|id| !subscribers.contains_key(id)))
            .unwrap_or_default(),
    }
}

/// Drains the monitor's event bus into the broadcaster until every sender is
/// gone.
pub fn spawn_dispatcher(
    events: Receiver<UiEvent>,
    broadcaster: Arc<Broadcaster>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ui-dispatch".to_owned())
        .spawn(move || {
            while let Ok(event) = events.recv() {
                let reached = broadcaster.emit(&event);
                debug!(kind = event.kind(), reached, "dispatched ui event");
            }
            info!("ui event bus closed");
        })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::{spawn_dispatcher, Broadcaster, MAILBOX_CAPACITY};
    use crate::events::{UiEvent, UserInfo};

    #[test]
    fn ids_are_max_plus_one_or_zero() {
        let broadcaster = Broadcaster::new();
        let a = broadcaster.subscribe_with(Vec::new);
        let b = broadcaster.subscribe_with(Vec::new);
        let c = broadcaster.subscribe_with(Vec::new);
        assert_eq!((a.id, b.id, c.id), (0, 1, 2));

        assert!(broadcaster.unsubscribe(b.id));
        assert_eq!(broadcaster.subscribe_with(Vec::new).id, 3);

        broadcaster.unsubscribe(0);
        broadcaster.unsubscribe(2);
        broadcaster.unsubscribe(3);
        assert_eq!(broadcaster.count(), 0);
        assert_eq!(broadcaster.subscribe_with(Vec::new).id, 0);
        assert!(!broadcaster.unsubscribe(42));
    }

    #[test]
    fn every_subscriber_receives_events_in_order() {
        let broadcaster = Broadcaster::new();
        let mut first = broadcaster.subscribe_with(Vec::new);
        let mut second = broadcaster.subscribe_with(Vec::new);

        assert_eq!(broadcaster.emit(&UiEvent::UserInfo(UserInfo::new("a", Some(1)))), 2);
        assert_eq!(broadcaster.emit(&UiEvent::QuitChampSelect), 2);

        for sub in [&mut first, &mut second] {
            let user = sub.mailbox.try_recv().expect("user info queued");
            assert!(user.contains("\"username\":\"a\""));
            assert_eq!(&*sub.mailbox.try_recv().expect("quit queued"), r#"{"type":2}"#);
            assert!(sub.mailbox.try_recv().is_err());
        }
    }

    #[test]
    fn unsubscribed_client_gets_nothing_after_the_call() {
        let broadcaster = Broadcaster::new();
        let mut leaving = broadcaster.subscribe_with(Vec::new);
        let mut staying = broadcaster.subscribe_with(Vec::new);

        broadcaster.emit(&UiEvent::QuitChampSelect);
        broadcaster.unsubscribe(leaving.id);
        broadcaster.emit(&UiEvent::UserInfo(UserInfo::default()));

        assert!(leaving.mailbox.try_recv().is_ok());
        assert!(leaving.mailbox.try_recv().is_err());
        assert!(staying.mailbox.try_recv().is_ok());
        assert!(staying.mailbox.try_recv().is_ok());
    }

    #[test]
    fn dropped_mailboxes_are_pruned_on_emit() {
        let broadcaster = Broadcaster::new();
        let dropped = broadcaster.subscribe_with(Vec::new);
        let _kept = broadcaster.subscribe_with(Vec::new);
        drop(dropped);

        assert_eq!(broadcaster.emit(&UiEvent::QuitChampSelect), 1);
        assert_eq!(broadcaster.count(), 1);
    }

    #[test]
    fn stalled_subscriber_is_dropped_once_its_mailbox_fills() {
        let broadcaster = Broadcaster::new();
        let mut stalled = broadcaster.subscribe_with(Vec::new);
        let mut reading = broadcaster.subscribe_with(Vec::new);

        for _ in 0..MAILBOX_CAPACITY {
            assert_eq!(broadcaster.emit(&UiEvent::QuitChampSelect), 2);
            assert!(reading.mailbox.try_recv().is_ok());
        }
        assert_eq!(broadcaster.emit(&UiEvent::QuitChampSelect), 1);
        assert_eq!(broadcaster.count(), 1);

        let mut drained = 0;
        let end = loop {
            match stalled.mailbox.try_recv() {
                Ok(_) => drained += 1,
                Err(err) => break err,
            }
        };
        assert_eq!(drained, MAILBOX_CAPACITY);
        assert_eq!(end, TryRecvError::Disconnected);
    }

    #[test]
    fn greeting_precedes_later_events() {
        let broadcaster = Broadcaster::new();
        let mut sub = broadcaster
            .subscribe_with(|| vec![UiEvent::UserInfo(UserInfo::new("Faker", Some(7)))]);
        broadcaster.emit(&UiEvent::QuitChampSelect);

        let greeting = sub.mailbox.try_recv().expect("greeting queued");
        assert!(greeting.contains("\"iconId\":\"7\""));
        assert_eq!(&*sub.mailbox.try_recv().expect("event queued"), r#"{"type":2}"#);
    }

    #[test]
    fn dispatcher_forwards_bus_events_until_closed() {
        let broadcaster = Arc::new(Broadcaster::new());
        let mut sub = broadcaster.subscribe_with(Vec::new);
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_dispatcher(rx, Arc::clone(&broadcaster)).expect("spawn dispatcher");

        tx.send(UiEvent::QuitChampSelect).expect("bus open");
        drop(tx);
        handle.join().expect("dispatcher exits cleanly");

        assert_eq!(&*sub.mailbox.try_recv().expect("forwarded"), r#"{"type":2}"#);
    }
}
