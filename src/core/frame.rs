//! Frame kinds and per-message frame assembly.

use crate::error::{constants, DispatchError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::ops::BitOr;

/// Tag reserved for keepalive probes
pub const KEEPALIVE_TAG: &str = "!";

/// Literal body of a keepalive probe
pub const KEEPALIVE_BODY: &[u8] = b"?,,";

/// Separator between the tag and the rest of the frame
pub const TAG_SEPARATOR: u8 = b',';

/// Shortest tag accepted for binary frames
pub const MIN_BINARY_TAG_LEN: usize = 2;

/// Kind of frame handed to the transport. Values match websocket opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Text,
    Binary,
    Control,
}

impl FrameKind {
    pub fn as_u8(self) -> u8 {
        match self {
            FrameKind::Text => 0x1,
            FrameKind::Binary => 0x2,
            FrameKind::Control => 0x8,
        }
    }

    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x1 => Ok(FrameKind::Text),
            0x2 => Ok(FrameKind::Binary),
            0x8 => Ok(FrameKind::Control),
            other => Err(DispatchError::Protocol(format!(
                "{}: {other:#04x}",
                constants::ERR_UNKNOWN_FRAME_KIND
            ))),
        }
    }
}

/// One discrete unit written to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Split off the leading tag. Keepalive replies (`!<millis>`) carry no separator.
    pub fn split_tag(&self) -> Option<(&str, &[u8])> {
        split_tag(&self.payload)
    }
}

/// Metric byte of a binary frame: which kind of query or action it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Metric(pub u8);

impl Metric {
    pub const DEBUG_LOG: Metric = Metric(1);
    pub const QUERY_RESUME: Metric = Metric(2);
    pub const QUERY_RECEIPT: Metric = Metric(3);
    pub const QUERY_MEDIA: Metric = Metric(4);
    pub const QUERY_CHAT: Metric = Metric(5);
    pub const QUERY_CONTACTS: Metric = Metric(6);
    pub const QUERY_MESSAGES: Metric = Metric(7);
    pub const PRESENCE: Metric = Metric(8);
    pub const PRESENCE_SUBSCRIBE: Metric = Metric(9);
    pub const GROUP: Metric = Metric(10);
    pub const READ: Metric = Metric(11);
    pub const CHAT: Metric = Metric(12);
    pub const RECEIVED: Metric = Metric(13);
    pub const PIC: Metric = Metric(14);
    pub const STATUS: Metric = Metric(15);
    pub const MESSAGE: Metric = Metric(16);
    pub const QUERY_ACTIONS: Metric = Metric(17);
    pub const BLOCK: Metric = Metric(18);
    pub const QUERY_GROUP: Metric = Metric(19);
    pub const QUERY_PREVIEW: Metric = Metric(20);
    pub const QUERY_EMOJI: Metric = Metric(21);
    pub const QUERY_MESSAGE_INFO: Metric = Metric(22);
    pub const SPAM: Metric = Metric(23);
    pub const QUERY_SEARCH: Metric = Metric(24);
    pub const QUERY_IDENTITY: Metric = Metric(25);
    pub const QUERY_URL: Metric = Metric(26);
    pub const PROFILE: Metric = Metric(27);
    pub const CONTACT: Metric = Metric(28);
    pub const QUERY_VCARD: Metric = Metric(29);
    pub const QUERY_STATUS: Metric = Metric(30);
    pub const QUERY_STATUS_UPDATE: Metric = Metric(31);
    pub const PRIVACY_STATUS: Metric = Metric(32);
    pub const QUERY_LIVE_LOCATIONS: Metric = Metric(33);
    pub const LIVE_LOCATION: Metric = Metric(34);
    pub const QUERY_VNAME: Metric = Metric(35);
    pub const QUERY_LABELS: Metric = Metric(36);
    pub const CALL: Metric = Metric(37);
    pub const QUERY_CALL: Metric = Metric(38);
    pub const QUERY_QUICK_REPLIES: Metric = Metric(39);
}

/// Flag byte of a binary frame: priority and delivery hints, combinable with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flag(pub u8);

impl Flag {
    pub const NONE: Flag = Flag(0);
    pub const IGNORE: Flag = Flag(1 << 7);
    pub const ACK_REQUEST: Flag = Flag(1 << 6);
    pub const AVAILABLE: Flag = Flag(1 << 5);
    pub const NOT_AVAILABLE: Flag = Flag(1 << 4);
    pub const EXPIRES: Flag = Flag(1 << 3);
    pub const SKIP_OFFLINE: Flag = Flag(1 << 2);

    pub fn contains(self, other: Flag) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Flag {
    type Output = Flag;

    fn bitor(self, rhs: Flag) -> Flag {
        Flag(self.0 | rhs.0)
    }
}

/// Reject tags that cannot be told apart from the separator on a binary frame.
pub fn validate_binary_tag(tag: &str) -> Result<()> {
    if tag.len() < MIN_BINARY_TAG_LEN {
        return Err(DispatchError::InvalidTag {
            tag: tag.to_string(),
            reason: constants::ERR_TAG_TOO_SHORT.to_string(),
        });
    }
    Ok(())
}

/// `<tag>,<body>`
pub fn text_frame(tag: &str, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(tag.len() + 1 + body.len());
    buf.put_slice(tag.as_bytes());
    buf.put_u8(TAG_SEPARATOR);
    buf.put_slice(body);
    buf.freeze()
}

/// `<tag>,<metric><flag><sealed>`
pub fn binary_frame(tag: &str, metric: Metric, flag: Flag, sealed: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(tag.len() + 3 + sealed.len());
    buf.put_slice(tag.as_bytes());
    buf.put_u8(TAG_SEPARATOR);
    buf.put_u8(metric.0);
    buf.put_u8(flag.0);
    buf.put_slice(sealed);
    buf.freeze()
}

/// Split an inbound frame into its tag and the remaining payload.
///
/// Returns `None` when no tag can be extracted (empty frame, separator-less
/// frame, or a tag that is not valid UTF-8).
pub fn split_tag(frame: &[u8]) -> Option<(&str, &[u8])> {
    if frame.first() == Some(&KEEPALIVE_TAG.as_bytes()[0]) {
        return Some((KEEPALIVE_TAG, &frame[1..]));
    }
    let pos = frame.iter().position(|&b| b == TAG_SEPARATOR)?;
    let tag = std::str::from_utf8(&frame[..pos]).ok()?;
    Some((tag, &frame[pos + 1..]))
}
