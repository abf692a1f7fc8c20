//! Typed message definitions
//!
//! One struct per message kind plus the [`Message`] sum type. Structs are
//! independent of the active [`WireLayout`](super::WireLayout): widths come from
//! the layout tables at encode/decode time, field names tie the two together.
//!
//! | Kind | Tag | Direction |
//! |------|-----|-----------|
//! | Move | 1 | host → MCU |
//! | Odom | 2 | MCU → host |
//! | Pid | 3 | host → MCU |
//! | Servo | 4 | host → MCU |
//! | ConfigMotor | 5 | host → MCU |
//! | ConfigServo | 6 | host → MCU |
//! | Test | 7 | both |
//! | ConfigPinout | 8 | host → MCU |
//! | Echo | 9 | MCU → host |
//! | ReadPin | 12 | both |

use super::layout::MessageKind;
use super::value::{FieldValues, Value};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A message type that can travel over the link
pub trait WireMessage: Sized + Into<Message> {
    /// Kind this struct represents
    const KIND: MessageKind;

    /// Populated fields by wire name, in declaration order
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Build from decoded field values
    fn from_fields(fields: &FieldValues) -> Result<Self>;

    /// Extract from the sum type, `None` for any other kind
    fn from_message(msg: Message) -> Option<Self>;
}

macro_rules! wire_message {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty => $wire:literal ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl WireMessage for $name {
            const KIND: MessageKind = MessageKind::$name;

            fn values(&self) -> Vec<(&'static str, Value)> {
                vec![$( ($wire, Value::from(self.$field)) ),*]
            }

            fn from_fields(fields: &FieldValues) -> Result<Self> {
                Ok(Self {
                    $( $field: fields.get($wire)?, )*
                })
            }

            fn from_message(msg: Message) -> Option<Self> {
                match msg {
                    Message::$name(m) => Some(m),
                    _ => None,
                }
            }
        }

        impl From<$name> for Message {
            fn from(m: $name) -> Self {
                Message::$name(m)
            }
        }
    };
}

wire_message! {
    /// Target pose command
    Move {
        x: i16 => "x",
        y: i16 => "y",
        theta: i16 => "theta",
    }
}

wire_message! {
    /// Per-wheel distance increment reported by the firmware
    Odom {
        /// Wheel index
        num: i8 => "num",
        /// Auxiliary flag byte
        aux: i8 => "aux",
        /// Distance delta in firmware units (scaled by 1000 on ingest)
        ddist_mm: i16 => "ddist_mm",
    }
}

wire_message! {
    /// PID gains for one motor, carried as opaque integers
    Pid {
        motor: i8 => "motor",
        p: i32 => "p",
        i: i32 => "i",
        d: i32 => "d",
    }
}

wire_message! {
    /// Servo position command
    Servo {
        servo: i16 => "servo",
        pos: i16 => "pos",
    }
}

wire_message! {
    /// Servo channel configuration
    ConfigServo {
        channel: i16 => "channel",
        speed: i16 => "speed",
        min_val: i16 => "min_val",
        max_val: i16 => "max_val",
        start_percents: i16 => "start_percents",
        num: u8 => "num",
    }
}

wire_message! {
    /// LED toggle, also used as the startup liveness probe
    Test {
        led: bool => "led",
    }
}

wire_message! {
    /// Motor driver pin assignment (split-pinout firmware only)
    ConfigPinout {
        num: i8 => "num",
        encoder_a: i8 => "encoder_a",
        encoder_b: i8 => "encoder_b",
        enable: i8 => "enable",
        fwd: i8 => "fwd",
        back: i8 => "back",
    }
}

wire_message! {
    /// Echo of a previously received frame's type and size
    Echo {
        msg_type: u16 => "type",
        size: u32 => "size",
    }
}

wire_message! {
    /// Digital pin read request / result
    ReadPin {
        pin: i8 => "pin",
        value: i8 => "value",
        pullup: i8 => "pullup",
    }
}

/// Pin assignment carried inside ConfigMotor on merged-pinout firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorPinout {
    pub encoder_a: i8,
    pub encoder_b: i8,
    pub enable: i8,
    pub fwd: i8,
    pub back: i8,
}

/// Motor geometry and controller coefficients
///
/// `pinout` must be present exactly when the active layout is
/// [`WireLayout::MergedPinout`](super::WireLayout::MergedPinout).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigMotor {
    pub num: u8,
    pub radius: f32,
    pub angle_degrees: i32,
    pub inter_coeff: f32,
    pub prop_coeff: f32,
    pub diff_coeff: f32,
    pub coeff: f32,
    pub turn_max_speed: f32,
    pub max_speed: f32,
    pub ticks_per_rotation: i32,
    #[serde(default)]
    pub pinout: Option<MotorPinout>,
}

impl WireMessage for ConfigMotor {
    const KIND: MessageKind = MessageKind::ConfigMotor;

    fn values(&self) -> Vec<(&'static str, Value)> {
        let mut values = vec![
            ("num", Value::from(self.num)),
            ("radius", Value::from(self.radius)),
            ("angle_degrees", Value::from(self.angle_degrees)),
            ("inter_coeff", Value::from(self.inter_coeff)),
            ("prop_coeff", Value::from(self.prop_coeff)),
            ("diff_coeff", Value::from(self.diff_coeff)),
            ("coeff", Value::from(self.coeff)),
            ("turn_max_speed", Value::from(self.turn_max_speed)),
            ("max_speed", Value::from(self.max_speed)),
            ("ticks_per_rotation", Value::from(self.ticks_per_rotation)),
        ];
        if let Some(pins) = self.pinout {
            values.extend([
                ("encoder_a", Value::from(pins.encoder_a)),
                ("encoder_b", Value::from(pins.encoder_b)),
                ("enable", Value::from(pins.enable)),
                ("fwd", Value::from(pins.fwd)),
                ("back", Value::from(pins.back)),
            ]);
        }
        values
    }

    fn from_fields(fields: &FieldValues) -> Result<Self> {
        let pinout = if fields.has("encoder_a") {
            Some(MotorPinout {
                encoder_a: fields.get("encoder_a")?,
                encoder_b: fields.get("encoder_b")?,
                enable: fields.get("enable")?,
                fwd: fields.get("fwd")?,
                back: fields.get("back")?,
            })
        } else {
            None
        };

        Ok(Self {
            num: fields.get("num")?,
            radius: fields.get("radius")?,
            angle_degrees: fields.get("angle_degrees")?,
            inter_coeff: fields.get("inter_coeff")?,
            prop_coeff: fields.get("prop_coeff")?,
            diff_coeff: fields.get("diff_coeff")?,
            coeff: fields.get("coeff")?,
            turn_max_speed: fields.get("turn_max_speed")?,
            max_speed: fields.get("max_speed")?,
            ticks_per_rotation: fields.get("ticks_per_rotation")?,
            pinout,
        })
    }

    fn from_message(msg: Message) -> Option<Self> {
        match msg {
            Message::ConfigMotor(m) => Some(m),
            _ => None,
        }
    }
}

impl From<ConfigMotor> for Message {
    fn from(m: ConfigMotor) -> Self {
        Message::ConfigMotor(m)
    }
}

/// Any message the link can carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    Move(Move),
    Odom(Odom),
    Pid(Pid),
    Servo(Servo),
    ConfigMotor(ConfigMotor),
    ConfigServo(ConfigServo),
    Test(Test),
    ConfigPinout(ConfigPinout),
    Echo(Echo),
    ReadPin(ReadPin),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Move(_) => MessageKind::Move,
            Message::Odom(_) => MessageKind::Odom,
            Message::Pid(_) => MessageKind::Pid,
            Message::Servo(_) => MessageKind::Servo,
            Message::ConfigMotor(_) => MessageKind::ConfigMotor,
            Message::ConfigServo(_) => MessageKind::ConfigServo,
            Message::Test(_) => MessageKind::Test,
            Message::ConfigPinout(_) => MessageKind::ConfigPinout,
            Message::Echo(_) => MessageKind::Echo,
            Message::ReadPin(_) => MessageKind::ReadPin,
        }
    }

    pub(crate) fn values(&self) -> Vec<(&'static str, Value)> {
        match self {
            Message::Move(m) => m.values(),
            Message::Odom(m) => m.values(),
            Message::Pid(m) => m.values(),
            Message::Servo(m) => m.values(),
            Message::ConfigMotor(m) => m.values(),
            Message::ConfigServo(m) => m.values(),
            Message::Test(m) => m.values(),
            Message::ConfigPinout(m) => m.values(),
            Message::Echo(m) => m.values(),
            Message::ReadPin(m) => m.values(),
        }
    }

    pub(crate) fn from_fields(kind: MessageKind, fields: &FieldValues) -> Result<Self> {
        Ok(match kind {
            MessageKind::Move => Move::from_fields(fields)?.into(),
            MessageKind::Odom => Odom::from_fields(fields)?.into(),
            MessageKind::Pid => Pid::from_fields(fields)?.into(),
            MessageKind::Servo => Servo::from_fields(fields)?.into(),
            MessageKind::ConfigMotor => ConfigMotor::from_fields(fields)?.into(),
            MessageKind::ConfigServo => ConfigServo::from_fields(fields)?.into(),
            MessageKind::Test => Test::from_fields(fields)?.into(),
            MessageKind::ConfigPinout => ConfigPinout::from_fields(fields)?.into(),
            MessageKind::Echo => Echo::from_fields(fields)?.into(),
            MessageKind::ReadPin => ReadPin::from_fields(fields)?.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message_matches_kind() {
        let msg: Message = Odom {
            num: 1,
            aux: 0,
            ddist_mm: -4,
        }
        .into();
        assert_eq!(msg.kind(), MessageKind::Odom);
        assert!(Odom::from_message(msg).is_some());
        assert!(Move::from_message(msg).is_none());
    }

    #[test]
    fn test_echo_uses_wire_name_type() {
        let echo = Echo {
            msg_type: 7,
            size: 1,
        };
        let names: Vec<_> = echo.values().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["type", "size"]);
    }

    #[test]
    fn test_config_motor_pinout_fields_only_when_present() {
        let mut motor = ConfigMotor {
            num: 0,
            radius: 0.03,
            angle_degrees: 90,
            inter_coeff: 0.0,
            prop_coeff: 1.0,
            diff_coeff: 0.0,
            coeff: 1.0,
            turn_max_speed: 0.5,
            max_speed: 1.0,
            ticks_per_rotation: 360,
            pinout: None,
        };
        assert_eq!(motor.values().len(), 10);

        motor.pinout = Some(MotorPinout {
            encoder_a: 2,
            encoder_b: 3,
            enable: 9,
            fwd: 7,
            back: 8,
        });
        assert_eq!(motor.values().len(), 15);
    }
}
