//! Fixed-layout datagram codec.
//!
//! Every message on the wire is [`MESSAGE_SIZE`] bytes: seven unsigned 32-bit
//! integers in network byte order. The first field is the purpose code; the
//! remaining fields are only meaningful for some purposes and are zero
//! otherwise.
//!
//! | offset | field       |
//! |--------|-------------|
//! | 0      | purpose     |
//! | 4      | order_size  |
//! | 8      | num_workers |
//! | 12     | worker_id   |
//! | 16     | capacity    |
//! | 20     | parts_made  |
//! | 24     | duration_ms |
//!
//! Decoding never fails on an unknown purpose code. The message is surfaced
//! as [`Message::Unrecognized`] so that receivers can skip it.

use crate::common::{
    error::{Error, Result},
    types::{MESSAGE_SIZE, WorkerId},
};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Purpose code carried in the first field of every message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Purpose {
    Request = 1,
    Confirm = 2,
    Progress = 3,
    Completion = 4,
    ProtocolError = 5,
}

impl Purpose {
    pub const fn code(self) -> u32 {
        self as u32
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Request),
            2 => Some(Self::Confirm),
            3 => Some(Self::Progress),
            4 => Some(Self::Completion),
            5 => Some(Self::ProtocolError),
            _ => None,
        }
    }
}

/// A decoded protocol message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    /// Buyer asks the plant to produce `order_size` parts.
    Request { order_size: u32 },

    /// Plant accepts the order and announces how many workers will report.
    Confirm { num_workers: u32 },

    /// A worker finished one chunk of `parts_made` parts.
    Progress {
        worker_id: WorkerId,
        capacity: u32,
        parts_made: u32,
        duration_ms: u32,
    },

    /// A worker found the pool empty and stopped.
    Completion { worker_id: WorkerId },

    /// The plant is terminating; the current session is void.
    ProtocolError,

    /// A purpose code this build does not know.
    Unrecognized { purpose: u32 },
}

#[derive(Default)]
struct Fields {
    purpose: u32,
    order_size: u32,
    num_workers: u32,
    worker_id: u32,
    capacity: u32,
    parts_made: u32,
    duration_ms: u32,
}

impl Message {
    /// Returns the purpose of this message, or `None` if it is unrecognized.
    pub const fn purpose(&self) -> Option<Purpose> {
        match self {
            Self::Request { .. } => Some(Purpose::Request),
            Self::Confirm { .. } => Some(Purpose::Confirm),
            Self::Progress { .. } => Some(Purpose::Progress),
            Self::Completion { .. } => Some(Purpose::Completion),
            Self::ProtocolError => Some(Purpose::ProtocolError),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Encodes the message into a freshly allocated [`MESSAGE_SIZE`] buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MESSAGE_SIZE);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Appends exactly [`MESSAGE_SIZE`] bytes to `buf`.
    pub fn encode_into(&self, buf: &mut impl BufMut) {
        let fields = self.fields();
        buf.put_u32(fields.purpose);
        buf.put_u32(fields.order_size);
        buf.put_u32(fields.num_workers);
        buf.put_u32(fields.worker_id);
        buf.put_u32(fields.capacity);
        buf.put_u32(fields.parts_made);
        buf.put_u32(fields.duration_ms);
    }

    /// Decodes a single datagram.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if `bytes` is not exactly
    /// [`MESSAGE_SIZE`] long.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != MESSAGE_SIZE {
            return Err(Error::Malformed {
                len: bytes.len(),
                expected: MESSAGE_SIZE,
            });
        }

        let purpose = bytes.get_u32();
        let order_size = bytes.get_u32();
        let num_workers = bytes.get_u32();
        let worker_id = bytes.get_u32();
        let capacity = bytes.get_u32();
        let parts_made = bytes.get_u32();
        let duration_ms = bytes.get_u32();

        Ok(match Purpose::from_code(purpose) {
            Some(Purpose::Request) => Self::Request { order_size },
            Some(Purpose::Confirm) => Self::Confirm { num_workers },
            Some(Purpose::Progress) => Self::Progress {
                worker_id,
                capacity,
                parts_made,
                duration_ms,
            },
            Some(Purpose::Completion) => Self::Completion { worker_id },
            Some(Purpose::ProtocolError) => Self::ProtocolError,
            None => Self::Unrecognized { purpose },
        })
    }

    fn fields(&self) -> Fields {
        match *self {
            Self::Request { order_size } => Fields {
                purpose: Purpose::Request.code(),
                order_size,
                ..Fields::default()
            },
            Self::Confirm { num_workers } => Fields {
                purpose: Purpose::Confirm.code(),
                num_workers,
                ..Fields::default()
            },
            Self::Progress {
                worker_id,
                capacity,
                parts_made,
                duration_ms,
            } => Fields {
                purpose: Purpose::Progress.code(),
                worker_id,
                capacity,
                parts_made,
                duration_ms,
                ..Fields::default()
            },
            Self::Completion { worker_id } => Fields {
                purpose: Purpose::Completion.code(),
                worker_id,
                ..Fields::default()
            },
            Self::ProtocolError => Fields {
                purpose: Purpose::ProtocolError.code(),
                ..Fields::default()
            },
            Self::Unrecognized { purpose } => Fields {
                purpose,
                ..Fields::default()
            },
        }
    }
}
