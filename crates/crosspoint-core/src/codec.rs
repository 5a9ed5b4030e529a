//! Pure encode/decode for the join wire protocol.
//!
//! The wire carries no length header or type field. A frame is whatever one
//! socket read returns, and the message kind is discriminated by byte count
//! alone:
//!
//! | bytes | kind    |
//! |-------|---------|
//! | 2     | digital |
//! | 4     | analog  |
//! | > 4   | serial  |
//! | 1     | not a message — the read is ignored |
//!
//! All functions here are pure; the server crate owns the sockets.

use crate::joins::JoinNumber;

/// Sentinel byte terminating a serial feedback frame.
pub const SERIAL_TERMINATOR: u8 = 0xFF;

/// A decoded join message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinMessage {
    /// Digital (boolean) join state.
    Digital {
        /// The addressed join.
        join: JoinNumber,
        /// Logical state. On the wire this is inverted: header bit 5 clear
        /// means `true`.
        value: bool,
    },
    /// Analog (16-bit integer) join value.
    Analog {
        /// The addressed join.
        join: JoinNumber,
        /// Reconstructed 16-bit value.
        value: u16,
    },
    /// Serial (ASCII string) join value.
    Serial {
        /// The addressed join.
        join: JoinNumber,
        /// Decoded text, after the header-drop and trailing-`?` trim.
        text: String,
    },
}

impl JoinMessage {
    /// The join this message addresses.
    #[must_use]
    pub fn join(&self) -> JoinNumber {
        match self {
            Self::Digital { join, .. } | Self::Analog { join, .. } | Self::Serial { join, .. } => {
                *join
            }
        }
    }

    /// Message kind as a static string, for structured logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Digital { .. } => "digital",
            Self::Analog { .. } => "analog",
            Self::Serial { .. } => "serial",
        }
    }
}

/// Decode one received frame into a join message.
///
/// Returns `None` for byte counts that do not form a message (0, 1, or 3
/// bytes). A `None` affects only the read that produced it; the connection
/// stays open.
#[must_use]
pub fn decode(frame: &[u8]) -> Option<JoinMessage> {
    match frame.len() {
        2 => Some(decode_digital(frame)),
        4 => Some(decode_analog(frame)),
        n if n > 4 => Some(decode_serial(frame)),
        _ => None,
    }
}

fn decode_digital(frame: &[u8]) -> JoinMessage {
    let join = JoinNumber::from_wire(frame[0], frame[1]);
    // Inverted on the wire: bit 5 clear means logical true.
    let value = (frame[0] >> 5) & 1 == 0;
    JoinMessage::Digital { join, value }
}

fn decode_analog(frame: &[u8]) -> JoinMessage {
    let join = JoinNumber::from_wire(frame[0], frame[1]);
    let value = (u16::from(frame[0] & 0b0011_0000) << 10)
        | (u16::from(frame[2]) << 7)
        | u16::from(frame[3]);
    JoinMessage::Analog { join, value }
}

fn decode_serial(frame: &[u8]) -> JoinMessage {
    let join = JoinNumber::from_wire(frame[0], frame[1]);
    // The payload starts at byte 1: the join-number low byte rides ahead of
    // the text and is the character dropped below. Trailing '?' covers the
    // 0xFF terminator, which has no ASCII mapping.
    let decoded: String = frame[1..].iter().copied().map(ascii_char).collect();
    let mut chars = decoded.chars();
    let _ = chars.next();
    let text = chars.as_str().trim_end_matches('?').to_owned();
    JoinMessage::Serial { join, text }
}

/// Map one wire byte to ASCII, with `'?'` for bytes outside the ASCII range.
fn ascii_char(byte: u8) -> char {
    if byte.is_ascii() { char::from(byte) } else { '?' }
}

/// Map one character to its ASCII wire byte, with `b'?'` for characters
/// outside the ASCII range.
#[allow(clippy::cast_possible_truncation)]
fn ascii_byte(c: char) -> u8 {
    if c.is_ascii() { c as u8 } else { b'?' }
}

/// Encode a digital feedback frame (2 bytes).
#[must_use]
pub fn encode_digital_feedback(join: JoinNumber, value: bool) -> [u8; 2] {
    [
        0x80 | (u8::from(!value) << 5) | join.wire_high(),
        join.wire_low(),
    ]
}

/// Encode an analog feedback frame (4 bytes).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn encode_analog_feedback(join: JoinNumber, value: u16) -> [u8; 4] {
    [
        0xC0 | (((value >> 10) & 0x30) as u8) | join.wire_high(),
        join.wire_low(),
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

/// Encode a serial feedback frame: 2 header bytes, the ASCII text, and the
/// 0xFF terminator.
#[must_use]
pub fn encode_serial_feedback(join: JoinNumber, text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + 3);
    frame.push(0xC8 | join.wire_high());
    frame.push(join.wire_low());
    frame.extend(text.chars().map(ascii_byte));
    frame.push(SERIAL_TERMINATOR);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn join(n: u16) -> JoinNumber {
        JoinNumber::new(n).unwrap()
    }

    #[test]
    fn digital_true_example() {
        // Bit 5 of 0x80 is clear, which is logical true.
        assert_eq!(
            decode(&[0x80, 0x00]),
            Some(JoinMessage::Digital {
                join: join(1),
                value: true
            })
        );
    }

    #[test]
    fn digital_false_when_bit_five_set() {
        assert_eq!(
            decode(&[0xA0, 0x00]),
            Some(JoinMessage::Digital {
                join: join(1),
                value: false
            })
        );
    }

    #[test]
    fn analog_example() {
        assert_eq!(
            decode(&[0xC0, 0x00, 0x00, 0x05]),
            Some(JoinMessage::Analog {
                join: join(1),
                value: 5
            })
        );
    }

    #[test]
    fn analog_high_bits_come_from_the_header() {
        // Header bits 4..=5 carry value bits 14..=15.
        assert_eq!(
            decode(&[0xF0, 0x00, 0x00, 0x00]),
            Some(JoinMessage::Analog {
                join: join(1),
                value: 0xC000
            })
        );
    }

    #[test]
    fn analog_payload_bytes_are_not_masked_on_decode() {
        // A set top bit in byte 2 lands on value bit 14. The wire convention
        // keeps payload bytes 7-bit, but decode does not enforce it.
        assert_eq!(
            decode(&[0xC0, 0x00, 0x80, 0x00]),
            Some(JoinMessage::Analog {
                join: join(1),
                value: 0x4000
            })
        );
    }

    #[test]
    fn one_byte_read_is_not_a_message() {
        assert_eq!(decode(&[0x80]), None);
    }

    #[test]
    fn empty_read_is_not_a_message() {
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn three_byte_read_is_not_a_message() {
        assert_eq!(decode(&[0xC8, 0x00, 0xFF]), None);
    }

    #[test]
    fn serial_payload_includes_low_byte_then_drops_it() {
        // Byte 1 is the join-number low byte; it is decoded into the payload
        // and then dropped as the "first character". A frame for join 6
        // therefore still yields exactly the sent text.
        let frame = [0xC8, 0x05, b'A', b'B', SERIAL_TERMINATOR];
        assert_eq!(
            decode(&frame),
            Some(JoinMessage::Serial {
                join: join(6),
                text: "AB".to_owned()
            })
        );
    }

    #[test]
    fn serial_trims_all_trailing_question_marks() {
        // The trim that removes the terminator also eats '?' characters the
        // sender actually meant.
        let frame = encode_serial_feedback(join(1), "really?");
        assert_eq!(
            decode(&frame),
            Some(JoinMessage::Serial {
                join: join(1),
                text: "really".to_owned()
            })
        );
    }

    #[test]
    fn serial_keeps_interior_question_marks() {
        let frame = encode_serial_feedback(join(1), "a?b");
        assert_matches!(
            decode(&frame),
            Some(JoinMessage::Serial { text, .. }) if text == "a?b"
        );
    }

    #[test]
    fn serial_non_ascii_becomes_question_mark() {
        let frame = encode_serial_feedback(join(1), "héllo");
        assert_matches!(
            decode(&frame),
            Some(JoinMessage::Serial { text, .. }) if text == "h?llo"
        );
    }

    #[test]
    fn one_character_serial_frame_reads_as_analog() {
        // A single-character serial feedback frame is 4 bytes, and with no
        // framing on the wire a 4-byte read decodes as analog.
        let frame = encode_serial_feedback(join(1), "A");
        assert_eq!(frame.len(), 4);
        assert_matches!(decode(&frame), Some(JoinMessage::Analog { .. }));
    }

    #[test]
    fn empty_serial_frame_decodes_to_nothing() {
        let frame = encode_serial_feedback(join(1), "");
        assert_eq!(frame.len(), 3);
        assert_eq!(decode(&frame), None);
    }

    #[test]
    fn digital_encode_layout() {
        assert_eq!(encode_digital_feedback(join(1), true), [0x80, 0x00]);
        assert_eq!(encode_digital_feedback(join(1), false), [0xA0, 0x00]);
        assert_eq!(encode_digital_feedback(join(1024), true), [0x87, 0x7F]);
    }

    #[test]
    fn analog_encode_layout() {
        assert_eq!(
            encode_analog_feedback(join(1), 5),
            [0xC0, 0x00, 0x00, 0x05]
        );
        assert_eq!(
            encode_analog_feedback(join(1), 0xFFFF),
            [0xF0, 0x00, 0x7F, 0x7F]
        );
    }

    #[test]
    fn serial_encode_layout() {
        assert_eq!(
            encode_serial_feedback(join(1), "hi"),
            vec![0xC8, 0x00, b'h', b'i', 0xFF]
        );
        // High join bits land in the header's low bits.
        assert_eq!(encode_serial_feedback(join(1024), "")[0], 0xCF);
    }

    #[test]
    fn join_boundaries_round_trip_digital() {
        for n in [1u16, 127, 128, 129, 255, 256, 1023, 1024] {
            let frame = encode_digital_feedback(join(n), true);
            assert_eq!(
                decode(&frame),
                Some(JoinMessage::Digital {
                    join: join(n),
                    value: true
                }),
                "join {n} did not round-trip"
            );
        }
    }

    #[test]
    fn message_accessors() {
        let msg = JoinMessage::Analog {
            join: join(9),
            value: 77,
        };
        assert_eq!(msg.join().get(), 9);
        assert_eq!(msg.kind(), "analog");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn digital_round_trip(n in 1u16..=1024, value: bool) {
                let j = join(n);
                let frame = encode_digital_feedback(j, value);
                prop_assert_eq!(decode(&frame), Some(JoinMessage::Digital { join: j, value }));
            }

            #[test]
            fn analog_round_trip(n in 1u16..=1024, value: u16) {
                let j = join(n);
                let frame = encode_analog_feedback(j, value);
                prop_assert_eq!(decode(&frame), Some(JoinMessage::Analog { join: j, value }));
            }

            #[test]
            fn serial_round_trip_modulo_trim(n in 1u16..=1024, text in "[ -~]{2,64}") {
                // ASCII printable text, two chars or more so the frame is a
                // serial shape. Recovery is exact up to the trailing-'?' trim.
                let j = join(n);
                let frame = encode_serial_feedback(j, &text);
                let expected = text.trim_end_matches('?').to_owned();
                prop_assert_eq!(
                    decode(&frame),
                    Some(JoinMessage::Serial { join: j, text: expected })
                );
            }

            #[test]
            fn decode_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..128)) {
                let _ = decode(&frame);
            }
        }
    }
}
