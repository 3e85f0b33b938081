//! Registry of open clients (tabs) and best-effort fan-out to them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::WorkerMessage;

pub type ClientId = u64;

struct ClientEntry {
  id: ClientId,
  url: String,
  controlled: bool,
  tx: mpsc::UnboundedSender<WorkerMessage>,
}

/// Receiving side handed to a newly registered client.
#[derive(Debug)]
pub struct ClientHandle {
  pub id: ClientId,
  pub rx: mpsc::UnboundedReceiver<WorkerMessage>,
}

/// Outcome of a window open request.
#[derive(Debug)]
pub enum WindowAction {
  /// A client was already showing the URL
  Focused(ClientId),
  /// A new client was registered for the URL
  Opened(ClientHandle),
}

/// Registry of clients with fan-out notify.
///
/// Sends never wait on a receiver, so a slow client cannot hold up the
/// others. Clients whose receiver is gone are dropped on the next broadcast.
/// Once claimed, every client registered afterwards starts out controlled.
#[derive(Default)]
pub struct ClientRegistry {
  clients: Mutex<Vec<ClientEntry>>,
  next_id: AtomicU64,
  claimed: AtomicBool,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a client showing `url`.
  pub fn register(&self, url: &str) -> ClientHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

    if let Ok(mut clients) = self.clients.lock() {
      clients.push(ClientEntry {
        id,
        url: url.to_string(),
        controlled: self.claimed.load(Ordering::SeqCst),
        tx,
      });
    }
    debug!(id, url, "client registered");

    ClientHandle { id, rx }
  }

  pub fn unregister(&self, id: ClientId) {
    if let Ok(mut clients) = self.clients.lock() {
      clients.retain(|c| c.id != id);
    }
  }

  pub fn len(&self) -> usize {
    self.clients.lock().map(|c| c.len()).unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Send `message` to every client. Returns the number reached.
  pub fn broadcast(&self, message: &WorkerMessage) -> usize {
    let Ok(mut clients) = self.clients.lock() else {
      warn!("client registry lock poisoned, dropping broadcast");
      return 0;
    };

    let mut delivered = 0;
    clients.retain(|client| match client.tx.send(message.clone()) {
      Ok(()) => {
        delivered += 1;
        true
      }
      Err(_) => {
        debug!(id = client.id, "client gone, pruning");
        false
      }
    });
    delivered
  }

  /// Take control of every open client and of clients opened later.
  pub fn claim(&self) -> usize {
    match self.clients.lock() {
      Ok(mut clients) => {
        self.claimed.store(true, Ordering::SeqCst);
        for client in clients.iter_mut() {
          client.controlled = true;
        }
        clients.len()
      }
      Err(_) => 0,
    }
  }

  pub fn is_controlled(&self, id: ClientId) -> bool {
    self
      .clients
      .lock()
      .map(|c| c.iter().any(|c| c.id == id && c.controlled))
      .unwrap_or(false)
  }

  /// Focus a client already at `url`, or open a new one.
  pub fn open_window(&self, url: &str) -> WindowAction {
    let existing = self
      .clients
      .lock()
      .ok()
      .and_then(|c| c.iter().find(|c| c.url == url).map(|c| c.id));

    match existing {
      Some(id) => WindowAction::Focused(id),
      None => WindowAction::Opened(self.register(url)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_broadcast_reaches_every_client() {
    let registry = ClientRegistry::new();
    let mut a = registry.register("/");
    let mut b = registry.register("/news");

    assert_eq!(registry.broadcast(&WorkerMessage::installed()), 2);
    assert_eq!(a.rx.try_recv().unwrap(), WorkerMessage::installed());
    assert_eq!(b.rx.try_recv().unwrap(), WorkerMessage::installed());
  }

  #[test]
  fn test_closed_client_is_pruned_without_affecting_others() {
    let registry = ClientRegistry::new();
    let closed = registry.register("/");
    let mut open = registry.register("/gallery");
    drop(closed);

    assert_eq!(registry.broadcast(&WorkerMessage::install_failed()), 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(open.rx.try_recv().unwrap(), WorkerMessage::install_failed());
  }

  #[test]
  fn test_claim_marks_clients_controlled() {
    let registry = ClientRegistry::new();
    let a = registry.register("/");
    assert!(!registry.is_controlled(a.id));
    assert_eq!(registry.claim(), 1);
    assert!(registry.is_controlled(a.id));
  }

  #[test]
  fn test_clients_opened_after_claim_are_controlled() {
    let registry = ClientRegistry::new();
    let before = registry.register("/");
    registry.claim();

    let after = registry.register("/news");
    assert!(registry.is_controlled(before.id));
    assert!(registry.is_controlled(after.id));

    match registry.open_window("/gallery") {
      WindowAction::Opened(handle) => assert!(registry.is_controlled(handle.id)),
      other => panic!("expected open, got {other:?}"),
    }
  }

  #[test]
  fn test_open_window_focuses_existing_url() {
    let registry = ClientRegistry::new();
    let a = registry.register("/admissions");

    match registry.open_window("/admissions") {
      WindowAction::Focused(id) => assert_eq!(id, a.id),
      other => panic!("expected focus, got {other:?}"),
    }
    match registry.open_window("/gallery") {
      WindowAction::Opened(handle) => assert_ne!(handle.id, a.id),
      other => panic!("expected open, got {other:?}"),
    }
    assert_eq!(registry.len(), 2);
  }
}
