//! Wire protocol: message layouts, typed messages and the catalog that maps
//! between them

pub mod catalog;
pub mod layout;
pub mod messages;
pub mod value;

pub use catalog::Catalog;
pub use layout::{FieldSpec, MessageKind, MessageSpec, Scalar, WireLayout};
pub use messages::{
    ConfigMotor, ConfigPinout, ConfigServo, Echo, Message, MotorPinout, Move, Odom, Pid, ReadPin,
    Servo, Test, WireMessage,
};
pub use value::{FieldValues, FromValue, Value};
