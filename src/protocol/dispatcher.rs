use crate::core::frame::{split_tag, Frame, FrameKind};
use crate::error::Result;
use crate::protocol::registry::{CorrelationRegistry, Delivery};
use crate::utils::metrics::Metrics;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

/// What happened to an inbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Handed to the waiter registered under `tag`
    Delivered { tag: String },
    /// The entry existed but nobody is listening any more
    Abandoned { tag: String },
    /// No waiter: server push, or a reply that arrived after its entry was gone
    Unsolicited { tag: String, payload: Bytes },
    /// Frame had no extractable tag, or was not a text/binary frame
    Untagged(Frame),
}

/// Read-path helper: routes inbound frames into the correlation registry.
///
/// Looks up the leading tag, delivers the remainder of the frame byte for
/// byte and removes the entry. Frames without a waiter are returned to the caller.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CorrelationRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl Dispatcher {
    pub fn new(registry: Arc<CorrelationRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Route one inbound frame.
    pub fn route(&self, frame: Frame) -> Result<Routed> {
        if frame.kind == FrameKind::Control {
            return Ok(Routed::Untagged(frame));
        }
        let Some((tag, rest)) = split_tag(&frame.payload) else {
            trace!(bytes = frame.payload.len(), "Inbound frame without tag");
            return Ok(Routed::Untagged(frame));
        };
        let tag = tag.to_string();
        let payload = frame.payload.slice(frame.payload.len() - rest.len()..);
        self.route_tagged(tag, payload)
    }

    /// Route a text payload such as `"<tag>,<json>"` or `"!<millis>"`.
    pub fn route_text(&self, text: &str) -> Result<Routed> {
        self.route(Frame::new(FrameKind::Text, text.as_bytes().to_vec()))
    }

    fn route_tagged(&self, tag: String, payload: Bytes) -> Result<Routed> {
        if !self.registry.contains(&tag) {
            debug!(%tag, "Unsolicited frame");
            return Ok(Routed::Unsolicited { tag, payload });
        }

        // Bytes clones share the buffer
        match self.registry.deliver(&tag, payload.clone())? {
            Delivery::Delivered => {
                if let Some(metrics) = &self.metrics {
                    metrics.pending_delivered();
                }
                Ok(Routed::Delivered { tag })
            }
            Delivery::Abandoned => Ok(Routed::Abandoned { tag }),
            // Entry vanished between the lookup and the delivery
            Delivery::NoWaiter => Ok(Routed::Unsolicited { tag, payload }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_routes_reply_to_waiter() {
        let registry = Arc::new(CorrelationRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone());
        let pending = registry.register("1700000000.--4").unwrap();

        let routed = dispatcher.route_text(r#"1700000000.--4,{"status":200}"#).unwrap();
        assert_eq!(
            routed,
            Routed::Delivered {
                tag: "1700000000.--4".into()
            }
        );
        assert_eq!(pending.await.unwrap(), r#"{"status":200}"#);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_reply_has_no_separator() {
        let registry = Arc::new(CorrelationRegistry::new());
        let dispatcher = Dispatcher::new(registry.clone());
        let pending = registry.register("!").unwrap();

        dispatcher.route_text("!1700000000123").unwrap();
        assert_eq!(pending.await.unwrap(), "1700000000123");
    }

    #[test]
    fn test_unsolicited_frame_is_returned() {
        let dispatcher = Dispatcher::new(Arc::new(CorrelationRegistry::new()));
        let routed = dispatcher.route_text(r#"s1,["Presence",{}]"#).unwrap();
        assert_eq!(
            routed,
            Routed::Unsolicited {
                tag: "s1".into(),
                payload: Bytes::from_static(br#"["Presence",{}]"#)
            }
        );
    }

    #[tokio::test]
    async fn test_binary_reply_delivered_byte_for_byte() {
        use crate::utils::crypto::{IvMode, SessionKeys};

        let keys = SessionKeys::new(vec![0x11; 32], vec![0x22; 32]).unwrap();
        let sealed = keys.seal(IvMode::ZERO, b"reply node").unwrap();
        let mut payload = b"ab,".to_vec();
        payload.extend_from_slice(&sealed);

        let registry = Arc::new(CorrelationRegistry::new());
        let pending = registry.register("ab").unwrap();
        let routed = Dispatcher::new(registry.clone())
            .route(Frame::new(FrameKind::Binary, payload))
            .unwrap();
        assert_eq!(routed, Routed::Delivered { tag: "ab".into() });

        let reply = pending.await.unwrap();
        assert_eq!(&reply[..], &sealed[..]);
        assert_eq!(keys.open(&reply).unwrap(), b"reply node");
    }

    #[test]
    fn test_unsolicited_binary_frame_keeps_bytes() {
        let dispatcher = Dispatcher::new(Arc::new(CorrelationRegistry::new()));
        let frame = Frame::new(FrameKind::Binary, b"s9,\x81\xf5\xcc\x00".to_vec());
        let routed = dispatcher.route(frame).unwrap();
        assert_eq!(
            routed,
            Routed::Unsolicited {
                tag: "s9".into(),
                payload: Bytes::from_static(b"\x81\xf5\xcc\x00")
            }
        );
    }

    #[test]
    fn test_untagged_and_control_frames() {
        let dispatcher = Dispatcher::new(Arc::new(CorrelationRegistry::new()));
        assert!(matches!(dispatcher.route_text("garbage").unwrap(), Routed::Untagged(_)));
        let close = Frame::new(FrameKind::Control, b"a,b".to_vec());
        assert!(matches!(dispatcher.route(close).unwrap(), Routed::Untagged(_)));
    }

    #[test]
    fn test_delivery_counted() {
        let registry = Arc::new(CorrelationRegistry::new());
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Dispatcher::new(registry.clone()).with_metrics(metrics.clone());
        let _pending = registry.register("ab").unwrap();
        dispatcher.route_text("ab,ok").unwrap();
        assert_eq!(metrics.snapshot().pending_delivered, 1);
    }
}
