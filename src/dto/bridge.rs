//! Decoder for the binary bridge messages sent by downstream game servers.
//!
//! Frame layout, in order: `action`, `target identity` (textual UUID), a
//! 64-bit signed `amount`, and the informational `executor name`. Integers
//! are big-endian and strings carry a 16-bit length prefix followed by UTF-8
//! bytes, the framing Java's `DataOutputStream#writeUTF` produces. The
//! decoder is a pure function over the byte buffer and knows nothing about
//! the transport; trailing bytes after the fourth field are ignored.

use thiserror::Error;
use uuid::Uuid;

/// Mutation kinds a bridge message can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    /// Credit tokens to the target (`give`).
    Give,
    /// Debit tokens from the target (`take` or `remove`).
    Take,
    /// Overwrite the target's balance (`set`).
    Set,
}

/// A fully decoded bridge message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeRequest {
    /// Requested mutation.
    pub action: BridgeAction,
    /// Identity whose balance is mutated.
    pub target: Uuid,
    /// Signed token amount; per-action semantics decide how it is applied.
    pub amount: i64,
    /// Name of whoever issued the request downstream, for log auditing only.
    pub executor: String,
}

/// Reasons a bridge message is dropped without touching the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeDecodeError {
    /// The buffer ended before the named field was complete.
    #[error("message truncated while reading {field}")]
    Truncated {
        /// Field being read when the buffer ran out.
        field: &'static str,
    },
    /// A string field did not contain valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 {
        /// Field holding the malformed bytes.
        field: &'static str,
    },
    /// The target identity string is not a UUID.
    #[error("`{value}` is not a valid target identity")]
    InvalidIdentity {
        /// Raw identity string received on the wire.
        value: String,
    },
    /// The action string is outside the recognized set.
    #[error("unrecognized action `{0}`")]
    UnrecognizedAction(String),
}

/// Decode one bridge message from `buffer`.
pub fn decode(buffer: &[u8]) -> Result<BridgeRequest, BridgeDecodeError> {
    let mut reader = Reader::new(buffer);

    let action = reader.read_string("action")?;
    let target_raw = reader.read_string("target identity")?;
    let amount = reader.read_i64("amount")?;
    let executor = reader.read_string("executor name")?;

    let action = match action.as_str() {
        "give" => BridgeAction::Give,
        "take" | "remove" => BridgeAction::Take,
        "set" => BridgeAction::Set,
        _ => return Err(BridgeDecodeError::UnrecognizedAction(action)),
    };

    let target = Uuid::parse_str(&target_raw)
        .map_err(|_| BridgeDecodeError::InvalidIdentity { value: target_raw })?;

    Ok(BridgeRequest {
        action,
        target,
        amount,
        executor,
    })
}

/// Cursor over the raw frame, tracking which field a failure belongs to.
struct Reader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], BridgeDecodeError> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(BridgeDecodeError::Truncated { field })?;
        let bytes = &self.buffer[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, BridgeDecodeError> {
        let len_bytes = self.take(2, field)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let bytes = self.take(len, field)?;
        let text =
            std::str::from_utf8(bytes).map_err(|_| BridgeDecodeError::InvalidUtf8 { field })?;
        Ok(text.to_owned())
    }

    fn read_i64(&mut self, field: &'static str) -> Result<i64, BridgeDecodeError> {
        let bytes = self.take(8, field)?;
        let array: [u8; 8] = bytes
            .try_into()
            .map_err(|_| BridgeDecodeError::Truncated { field })?;
        Ok(i64::from_be_bytes(array))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_utf(frame: &mut Vec<u8>, text: &str) {
        frame.extend_from_slice(&(text.len() as u16).to_be_bytes());
        frame.extend_from_slice(text.as_bytes());
    }

    fn frame(action: &str, target: &str, amount: i64, executor: &str) -> Vec<u8> {
        let mut frame = Vec::new();
        put_utf(&mut frame, action);
        put_utf(&mut frame, target);
        frame.extend_from_slice(&amount.to_be_bytes());
        put_utf(&mut frame, executor);
        frame
    }

    #[test]
    fn decodes_a_give_message() {
        let target = Uuid::new_v4();
        let request =
            decode(&frame("give", &target.to_string(), 100, "console")).expect("decoding");

        assert_eq!(
            request,
            BridgeRequest {
                action: BridgeAction::Give,
                target,
                amount: 100,
                executor: "console".into(),
            }
        );
    }

    #[test]
    fn take_and_remove_decode_to_the_same_action() {
        let target = Uuid::new_v4().to_string();
        for action in ["take", "remove"] {
            let request = decode(&frame(action, &target, 5, "gm")).expect("decoding");
            assert_eq!(request.action, BridgeAction::Take);
        }
    }

    #[test]
    fn set_preserves_a_negative_amount_for_the_caller_to_clamp() {
        let request =
            decode(&frame("set", &Uuid::new_v4().to_string(), -9, "gm")).expect("decoding");
        assert_eq!(request.action, BridgeAction::Set);
        assert_eq!(request.amount, -9);
    }

    #[test]
    fn unrecognized_action_is_reported_with_its_name() {
        let result = decode(&frame("bogus-action", &Uuid::new_v4().to_string(), 1, "x"));
        assert_eq!(
            result,
            Err(BridgeDecodeError::UnrecognizedAction("bogus-action".into()))
        );
    }

    #[test]
    fn truncated_buffers_name_the_failing_field() {
        let full = frame("give", &Uuid::new_v4().to_string(), 100, "console");

        assert_eq!(
            decode(&[]),
            Err(BridgeDecodeError::Truncated { field: "action" })
        );
        assert_eq!(
            decode(&full[..7]),
            Err(BridgeDecodeError::Truncated {
                field: "target identity"
            })
        );
        assert_eq!(
            decode(&full[..full.len() - 1]),
            Err(BridgeDecodeError::Truncated {
                field: "executor name"
            })
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&2u16.to_be_bytes());
        frame.extend_from_slice(&[0xff, 0xfe]);

        assert_eq!(
            decode(&frame),
            Err(BridgeDecodeError::InvalidUtf8 { field: "action" })
        );
    }

    #[test]
    fn invalid_identity_is_rejected() {
        let result = decode(&frame("give", "not-a-uuid", 1, "console"));
        assert_eq!(
            result,
            Err(BridgeDecodeError::InvalidIdentity {
                value: "not-a-uuid".into()
            })
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut bytes = frame("give", &Uuid::new_v4().to_string(), 3, "console");
        bytes.extend_from_slice(b"extra");

        let request = decode(&bytes).expect("decoding");
        assert_eq!(request.amount, 3);
    }
}
