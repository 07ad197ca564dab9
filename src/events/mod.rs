use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Upload lifecycle events broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    UploadQueued {
        upload_id: usize,
        name: String,
        total_part: usize,
    },
    /// A worker started or resumed the upload at `from_part`
    UploadStarted {
        upload_id: usize,
        from_part: usize,
    },
    UploadProgress {
        upload_id: usize,
        progress: f64,
        parts_uploaded: usize,
    },
    UploadFinished {
        upload_id: usize,
        name: String,
    },
    UploadFailed {
        upload_id: usize,
        error: String,
    },
    UploadRemoved {
        upload_id: usize,
    },
}

/// Fan-out of upload events
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Arc<broadcast::Sender<Event>>,
}

impl EventBroadcaster {
    /// Create a new event broadcaster
    ///
    /// # Arguments
    /// * `capacity` - The capacity of the broadcast channel (default: 100)
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Broadcast an event to all subscribers
    ///
    /// # Returns
    /// The number of receivers that received the event
    pub fn broadcast(&self, event: Event) -> usize {
        match self.sender.send(event) {
            Ok(count) => {
                tracing::trace!(target: "events", subscribers = count, "Broadcast event to subscriber(s)");
                count
            }
            Err(e) => {
                tracing::trace!(target: "events", event = ?e.0, "No active subscribers for event");
                0
            }
        }
    }

    pub fn upload_queued(&self, upload_id: usize, name: String, total_part: usize) {
        self.broadcast(Event::UploadQueued {
            upload_id,
            name,
            total_part,
        });
    }

    pub fn upload_started(&self, upload_id: usize, from_part: usize) {
        self.broadcast(Event::UploadStarted {
            upload_id,
            from_part,
        });
    }

    pub fn upload_progress(&self, upload_id: usize, progress: f64, parts_uploaded: usize) {
        self.broadcast(Event::UploadProgress {
            upload_id,
            progress,
            parts_uploaded,
        });
    }

    pub fn upload_finished(&self, upload_id: usize, name: String) {
        self.broadcast(Event::UploadFinished { upload_id, name });
    }

    pub fn upload_failed(&self, upload_id: usize, error: String) {
        self.broadcast(Event::UploadFailed { upload_id, error });
    }

    pub fn upload_removed(&self, upload_id: usize) {
        self.broadcast(Event::UploadRemoved { upload_id });
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_broadcasting() {
        let broadcaster = EventBroadcaster::new(10);
        let mut receiver = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        broadcaster.upload_queued(0, "photo.jpg".to_string(), 4);

        let event = receiver.recv().await.unwrap();
        match event {
            Event::UploadQueued {
                upload_id,
                name,
                total_part,
            } => {
                assert_eq!(upload_id, 0);
                assert_eq!(name, "photo.jpg");
                assert_eq!(total_part, 4);
            }
            _ => panic!("Expected UploadQueued event"),
        }
    }

    #[test]
    fn broadcast_without_subscribers() {
        let broadcaster = EventBroadcaster::default();
        assert_eq!(broadcaster.broadcast(Event::UploadRemoved { upload_id: 1 }), 0);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(Event::UploadFailed {
            upload_id: 2,
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "UploadFailed");
        assert_eq!(json["data"]["upload_id"], 2);
        assert_eq!(json["data"]["error"], "boom");
    }
}
