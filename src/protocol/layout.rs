//! Wire layout descriptors
//!
//! Every message kind is described by a [`MessageSpec`]: a tag and an ordered
//! list of fixed-width little-endian fields. The descriptor tables below are the
//! single source of truth for payload sizes and field order.
//!
//! The firmware has shipped two incompatible layouts over its history:
//!
//! ```text
//! SplitPinout   Odom.ddist_mm = i16   ConfigMotor = 37 bytes   ConfigPinout (tag 8) present
//! MergedPinout  Odom.ddist_mm = i8    ConfigMotor = 42 bytes   pinout fields appended to ConfigMotor
//! ```
//!
//! Exactly one of them is active per deployment; [`WireLayout`] has no default
//! so callers must pick one.

use super::value::Value;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Primitive field type on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
}

impl Scalar {
    /// Width in bytes
    pub const fn width(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
        }
    }

    /// Append `value` to `buf` in little-endian order
    pub(crate) fn write(self, field: &'static str, value: Value, buf: &mut Vec<u8>) -> Result<()> {
        let out_of_range = |v: i64| Error::FieldOutOfRange { field, value: v };

        match (self, value) {
            (Scalar::F32, Value::Float(f)) => buf.extend_from_slice(&f.to_le_bytes()),
            (Scalar::F32, Value::Int(_)) | (_, Value::Float(_)) => {
                return Err(Error::FieldTypeMismatch { field });
            }
            (Scalar::I8, Value::Int(v)) => {
                let v = i8::try_from(v).map_err(|_| out_of_range(v))?;
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Scalar::U8, Value::Int(v)) => {
                let v = u8::try_from(v).map_err(|_| out_of_range(v))?;
                buf.push(v);
            }
            (Scalar::I16, Value::Int(v)) => {
                let v = i16::try_from(v).map_err(|_| out_of_range(v))?;
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Scalar::U16, Value::Int(v)) => {
                let v = u16::try_from(v).map_err(|_| out_of_range(v))?;
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Scalar::I32, Value::Int(v)) => {
                let v = i32::try_from(v).map_err(|_| out_of_range(v))?;
                buf.extend_from_slice(&v.to_le_bytes());
            }
            (Scalar::U32, Value::Int(v)) => {
                let v = u32::try_from(v).map_err(|_| out_of_range(v))?;
                buf.extend_from_slice(&v.to_le_bytes());
            }
        }
        Ok(())
    }

    /// Read one value from `bytes`, which must be exactly `width()` long
    pub(crate) fn read(self, bytes: &[u8]) -> Value {
        match self {
            Scalar::I8 => Value::Int(bytes[0] as i8 as i64),
            Scalar::U8 => Value::Int(bytes[0] as i64),
            Scalar::I16 => Value::Int(i16::from_le_bytes([bytes[0], bytes[1]]) as i64),
            Scalar::U16 => Value::Int(u16::from_le_bytes([bytes[0], bytes[1]]) as i64),
            Scalar::I32 => {
                Value::Int(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
            }
            Scalar::U32 => {
                Value::Int(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64)
            }
            Scalar::F32 => Value::Float(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        }
    }
}

/// One named field of a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub scalar: Scalar,
}

const fn field(name: &'static str, scalar: Scalar) -> FieldSpec {
    FieldSpec { name, scalar }
}

/// Message kinds known to the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Move,
    Odom,
    Pid,
    Servo,
    ConfigMotor,
    ConfigServo,
    Test,
    ConfigPinout,
    Echo,
    ReadPin,
}

impl MessageKind {
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::Move => "Move",
            MessageKind::Odom => "Odom",
            MessageKind::Pid => "Pid",
            MessageKind::Servo => "Servo",
            MessageKind::ConfigMotor => "ConfigMotor",
            MessageKind::ConfigServo => "ConfigServo",
            MessageKind::Test => "Test",
            MessageKind::ConfigPinout => "ConfigPinout",
            MessageKind::Echo => "Echo",
            MessageKind::ReadPin => "ReadPin",
        }
    }

    /// Tag assigned to this kind by the firmware
    pub const fn tag(self) -> u16 {
        match self {
            MessageKind::Move => TAG_MOVE,
            MessageKind::Odom => TAG_ODOM,
            MessageKind::Pid => TAG_PID,
            MessageKind::Servo => TAG_SERVO,
            MessageKind::ConfigMotor => TAG_CONFIG_MOTOR,
            MessageKind::ConfigServo => TAG_CONFIG_SERVO,
            MessageKind::Test => TAG_TEST,
            MessageKind::ConfigPinout => TAG_CONFIG_PINOUT,
            MessageKind::Echo => TAG_ECHO,
            MessageKind::ReadPin => TAG_READ_PIN,
        }
    }
}

/// Immutable descriptor of one message kind's wire layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
    pub tag: u16,
    pub kind: MessageKind,
    pub fields: &'static [FieldSpec],
}

impl MessageSpec {
    /// Payload size in bytes (sum of field widths)
    pub fn fixed_size(&self) -> usize {
        self.fields.iter().map(|f| f.scalar.width()).sum()
    }

    /// Check whether the spec declares a field with this name
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

// ============================================================================
// Field tables
// ============================================================================

pub const TAG_MOVE: u16 = 1;
pub const TAG_ODOM: u16 = 2;
pub const TAG_PID: u16 = 3;
pub const TAG_SERVO: u16 = 4;
pub const TAG_CONFIG_MOTOR: u16 = 5;
pub const TAG_CONFIG_SERVO: u16 = 6;
pub const TAG_TEST: u16 = 7;
pub const TAG_CONFIG_PINOUT: u16 = 8;
pub const TAG_ECHO: u16 = 9;
pub const TAG_READ_PIN: u16 = 12;

use Scalar::*;

const MOVE_FIELDS: &[FieldSpec] = &[field("x", I16), field("y", I16), field("theta", I16)];

const ODOM_FIELDS_WIDE: &[FieldSpec] = &[field("num", I8), field("aux", I8), field("ddist_mm", I16)];

const ODOM_FIELDS_NARROW: &[FieldSpec] = &[field("num", I8), field("aux", I8), field("ddist_mm", I8)];

const PID_FIELDS: &[FieldSpec] = &[
    field("motor", I8),
    field("p", I32),
    field("i", I32),
    field("d", I32),
];

const SERVO_FIELDS: &[FieldSpec] = &[field("servo", I16), field("pos", I16)];

const CONFIG_MOTOR_FIELDS: &[FieldSpec] = &[
    field("num", U8),
    field("radius", F32),
    field("angle_degrees", I32),
    field("inter_coeff", F32),
    field("prop_coeff", F32),
    field("diff_coeff", F32),
    field("coeff", F32),
    field("turn_max_speed", F32),
    field("max_speed", F32),
    field("ticks_per_rotation", I32),
];

// Same as CONFIG_MOTOR_FIELDS with the pinout appended
const CONFIG_MOTOR_PINOUT_FIELDS: &[FieldSpec] = &[
    field("num", U8),
    field("radius", F32),
    field("angle_degrees", I32),
    field("inter_coeff", F32),
    field("prop_coeff", F32),
    field("diff_coeff", F32),
    field("coeff", F32),
    field("turn_max_speed", F32),
    field("max_speed", F32),
    field("ticks_per_rotation", I32),
    field("encoder_a", I8),
    field("encoder_b", I8),
    field("enable", I8),
    field("fwd", I8),
    field("back", I8),
];

const CONFIG_SERVO_FIELDS: &[FieldSpec] = &[
    field("channel", I16),
    field("speed", I16),
    field("min_val", I16),
    field("max_val", I16),
    field("start_percents", I16),
    field("num", U8),
];

const TEST_FIELDS: &[FieldSpec] = &[field("led", U8)];

const CONFIG_PINOUT_FIELDS: &[FieldSpec] = &[
    field("num", I8),
    field("encoder_a", I8),
    field("encoder_b", I8),
    field("enable", I8),
    field("fwd", I8),
    field("back", I8),
];

const ECHO_FIELDS: &[FieldSpec] = &[field("type", U16), field("size", U32)];

const READ_PIN_FIELDS: &[FieldSpec] = &[field("pin", I8), field("value", I8), field("pullup", I8)];

const fn spec(tag: u16, kind: MessageKind, fields: &'static [FieldSpec]) -> MessageSpec {
    MessageSpec { tag, kind, fields }
}

/// Specs for firmware with a separate ConfigPinout message
pub static SPLIT_PINOUT_SPECS: &[MessageSpec] = &[
    spec(TAG_MOVE, MessageKind::Move, MOVE_FIELDS),
    spec(TAG_ODOM, MessageKind::Odom, ODOM_FIELDS_WIDE),
    spec(TAG_PID, MessageKind::Pid, PID_FIELDS),
    spec(TAG_SERVO, MessageKind::Servo, SERVO_FIELDS),
    spec(TAG_CONFIG_MOTOR, MessageKind::ConfigMotor, CONFIG_MOTOR_FIELDS),
    spec(TAG_CONFIG_SERVO, MessageKind::ConfigServo, CONFIG_SERVO_FIELDS),
    spec(TAG_TEST, MessageKind::Test, TEST_FIELDS),
    spec(TAG_CONFIG_PINOUT, MessageKind::ConfigPinout, CONFIG_PINOUT_FIELDS),
    spec(TAG_ECHO, MessageKind::Echo, ECHO_FIELDS),
    spec(TAG_READ_PIN, MessageKind::ReadPin, READ_PIN_FIELDS),
];

/// Specs for firmware that carries the pinout inside ConfigMotor
pub static MERGED_PINOUT_SPECS: &[MessageSpec] = &[
    spec(TAG_MOVE, MessageKind::Move, MOVE_FIELDS),
    spec(TAG_ODOM, MessageKind::Odom, ODOM_FIELDS_NARROW),
    spec(TAG_PID, MessageKind::Pid, PID_FIELDS),
    spec(TAG_SERVO, MessageKind::Servo, SERVO_FIELDS),
    spec(TAG_CONFIG_MOTOR, MessageKind::ConfigMotor, CONFIG_MOTOR_PINOUT_FIELDS),
    spec(TAG_CONFIG_SERVO, MessageKind::ConfigServo, CONFIG_SERVO_FIELDS),
    spec(TAG_TEST, MessageKind::Test, TEST_FIELDS),
    spec(TAG_ECHO, MessageKind::Echo, ECHO_FIELDS),
    spec(TAG_READ_PIN, MessageKind::ReadPin, READ_PIN_FIELDS),
];

/// Firmware wire layout revision
///
/// Deliberately has no `Default`: decoding with the wrong layout silently
/// corrupts Odom and ConfigMotor payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireLayout {
    /// ConfigMotor without pinout, ConfigPinout on tag 8, 16-bit Odom delta
    SplitPinout,
    /// ConfigMotor with pinout appended, no tag 8, 8-bit Odom delta
    MergedPinout,
}

impl WireLayout {
    /// Built-in spec table for this layout
    pub fn specs(self) -> &'static [MessageSpec] {
        match self {
            WireLayout::SplitPinout => SPLIT_PINOUT_SPECS,
            WireLayout::MergedPinout => MERGED_PINOUT_SPECS,
        }
    }

    /// Whether ConfigMotor payloads carry pinout fields
    pub fn motor_has_pinout(self) -> bool {
        matches!(self, WireLayout::MergedPinout)
    }
}
