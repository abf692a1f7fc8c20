//! Message catalog: tag lookup plus layout-driven encode/decode

use super::layout::{MessageKind, MessageSpec, WireLayout};
use super::messages::Message;
use super::value::FieldValues;
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Set of message specs active for one firmware deployment
///
/// Built once and then only read. Both layouts may exist side by side as
/// separate catalogs.
#[derive(Debug, Clone)]
pub struct Catalog {
    layout: WireLayout,
    by_tag: HashMap<u16, MessageSpec>,
    by_kind: HashMap<MessageKind, u16>,
}

impl Catalog {
    /// Build a catalog from an explicit spec table
    ///
    /// Fails with [`Error::DuplicateTag`] when two specs share a tag or the
    /// same kind appears twice.
    pub fn new(layout: WireLayout, specs: &[MessageSpec]) -> Result<Self> {
        let mut by_tag = HashMap::with_capacity(specs.len());
        let mut by_kind = HashMap::with_capacity(specs.len());

        for spec in specs {
            if by_tag.insert(spec.tag, *spec).is_some() {
                return Err(Error::DuplicateTag(spec.tag));
            }
            if by_kind.insert(spec.kind, spec.tag).is_some() {
                return Err(Error::DuplicateTag(spec.tag));
            }
        }

        log::debug!("Catalog built for {:?} with {} message kinds", layout, by_tag.len());

        Ok(Self {
            layout,
            by_tag,
            by_kind,
        })
    }

    /// Build the catalog for one of the built-in layouts
    pub fn for_layout(layout: WireLayout) -> Result<Self> {
        Self::new(layout, layout.specs())
    }

    pub fn layout(&self) -> WireLayout {
        self.layout
    }

    /// Spec registered under `tag`
    pub fn spec(&self, tag: u16) -> Option<&MessageSpec> {
        self.by_tag.get(&tag)
    }

    /// Tag for a message kind, if this catalog carries it
    pub fn tag_of(&self, kind: MessageKind) -> Option<u16> {
        self.by_kind.get(&kind).copied()
    }

    /// All registered tags in ascending order
    pub fn tags(&self) -> Vec<u16> {
        let mut tags: Vec<u16> = self.by_tag.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    /// Encode a message into its fixed-size payload
    pub fn encode(&self, msg: &Message) -> Result<Vec<u8>> {
        let kind = msg.kind();
        let tag = self.tag_of(kind).ok_or(Error::UnknownTag(kind.tag()))?;
        let spec = &self.by_tag[&tag];
        let values = msg.values();

        if let Some((name, _)) = values.iter().find(|(name, _)| !spec.has_field(name)) {
            return Err(Error::UnexpectedField { tag, field: *name });
        }

        let mut buf = Vec::with_capacity(spec.fixed_size());
        for field in spec.fields {
            let value = values
                .iter()
                .find(|(name, _)| *name == field.name)
                .map(|(_, v)| *v)
                .ok_or(Error::MissingField {
                    tag,
                    field: field.name,
                })?;
            field.scalar.write(field.name, value, &mut buf)?;
        }

        Ok(buf)
    }

    /// Decode a payload received under `tag`
    pub fn decode(&self, tag: u16, payload: &[u8]) -> Result<Message> {
        let spec = self.spec(tag).ok_or(Error::UnknownTag(tag))?;

        let expected = spec.fixed_size();
        if payload.len() != expected {
            return Err(Error::LayoutMismatch {
                tag,
                expected,
                actual: payload.len(),
            });
        }

        let mut fields = FieldValues::with_capacity(tag, spec.fields.len());
        let mut offset = 0;
        for field in spec.fields {
            let width = field.scalar.width();
            fields.push(field.name, field.scalar.read(&payload[offset..offset + width]));
            offset += width;
        }

        Message::from_fields(spec.kind, &fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::layout::{FieldSpec, Scalar, TAG_CONFIG_PINOUT, TAG_MOVE, TAG_ODOM};
    use crate::protocol::messages::{ConfigMotor, ConfigPinout, Move, MotorPinout, Odom, Test};

    fn motor(pinout: Option<MotorPinout>) -> ConfigMotor {
        ConfigMotor {
            num: 1,
            radius: 0.035,
            angle_degrees: 180,
            inter_coeff: 0.1,
            prop_coeff: 1.2,
            diff_coeff: 0.01,
            coeff: 1.0,
            turn_max_speed: 0.4,
            max_speed: 0.8,
            ticks_per_rotation: 1440,
            pinout,
        }
    }

    #[test]
    fn test_encode_move_little_endian() {
        let catalog = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        let bytes = catalog
            .encode(&Move { x: 1, y: -1, theta: 256 }.into())
            .unwrap();
        assert_eq!(bytes, vec![0x01, 0x00, 0xFF, 0xFF, 0x00, 0x01]);
    }

    #[test]
    fn test_decode_odom_split_pinout() {
        let catalog = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        let msg = catalog.decode(TAG_ODOM, &[0x01, 0x00, 0x10, 0x00]).unwrap();
        assert_eq!(
            msg,
            Message::Odom(Odom {
                num: 1,
                aux: 0,
                ddist_mm: 16
            })
        );
    }

    #[test]
    fn test_decode_odom_merged_pinout_reads_narrow_delta() {
        let catalog = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        let msg = catalog.decode(TAG_ODOM, &[0x00, 0x00, 0xFE]).unwrap();
        assert_eq!(
            msg,
            Message::Odom(Odom {
                num: 0,
                aux: 0,
                ddist_mm: -2
            })
        );

        // A wide payload is a length error under the narrow layout
        assert!(matches!(
            catalog.decode(TAG_ODOM, &[0x00, 0x00, 0xFE, 0xFF]),
            Err(Error::LayoutMismatch {
                tag: TAG_ODOM,
                expected: 3,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_length_and_unknown_tag() {
        let catalog = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        assert!(matches!(
            catalog.decode(TAG_MOVE, &[0; 5]),
            Err(Error::LayoutMismatch {
                tag: TAG_MOVE,
                expected: 6,
                actual: 5
            })
        ));
        assert!(matches!(catalog.decode(99, &[]), Err(Error::UnknownTag(99))));
    }

    #[test]
    fn test_encode_out_of_range_for_narrow_layout() {
        let catalog = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        let result = catalog.encode(
            &Odom {
                num: 0,
                aux: 0,
                ddist_mm: 200,
            }
            .into(),
        );
        assert!(matches!(
            result,
            Err(Error::FieldOutOfRange {
                field: "ddist_mm",
                value: 200
            })
        ));
    }

    #[test]
    fn test_config_motor_sizes_per_layout() {
        let split = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        let merged = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        let pins = MotorPinout {
            encoder_a: 2,
            encoder_b: 3,
            enable: 5,
            fwd: 6,
            back: 7,
        };

        let bytes = split.encode(&motor(None).into()).unwrap();
        assert_eq!(bytes.len(), 37);
        assert_eq!(split.decode(5, &bytes).unwrap(), Message::ConfigMotor(motor(None)));

        let bytes = merged.encode(&motor(Some(pins)).into()).unwrap();
        assert_eq!(bytes.len(), 42);
        assert_eq!(&bytes[37..], &[2, 3, 5, 6, 7]);
        assert_eq!(
            merged.decode(5, &bytes).unwrap(),
            Message::ConfigMotor(motor(Some(pins)))
        );
    }

    #[test]
    fn test_config_motor_pinout_must_match_layout() {
        let split = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        let merged = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        let pins = MotorPinout {
            encoder_a: 0,
            encoder_b: 1,
            enable: 2,
            fwd: 3,
            back: 4,
        };

        assert!(matches!(
            split.encode(&motor(Some(pins)).into()),
            Err(Error::UnexpectedField { tag: 5, .. })
        ));
        assert!(matches!(
            merged.encode(&motor(None).into()),
            Err(Error::MissingField {
                tag: 5,
                field: "encoder_a"
            })
        ));
    }

    #[test]
    fn test_config_pinout_only_in_split_layout() {
        let msg: Message = ConfigPinout {
            num: 0,
            encoder_a: 1,
            encoder_b: 2,
            enable: 3,
            fwd: 4,
            back: 5,
        }
        .into();

        let split = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        assert_eq!(split.encode(&msg).unwrap(), vec![0, 1, 2, 3, 4, 5]);

        let merged = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        assert!(matches!(
            merged.encode(&msg),
            Err(Error::UnknownTag(TAG_CONFIG_PINOUT))
        ));
        assert!(matches!(
            merged.decode(TAG_CONFIG_PINOUT, &[0; 6]),
            Err(Error::UnknownTag(TAG_CONFIG_PINOUT))
        ));
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        const LED: &[FieldSpec] = &[FieldSpec {
            name: "led",
            scalar: Scalar::U8,
        }];
        let specs = [
            MessageSpec {
                tag: 7,
                kind: MessageKind::Test,
                fields: LED,
            },
            MessageSpec {
                tag: 7,
                kind: MessageKind::Echo,
                fields: LED,
            },
        ];
        assert!(matches!(
            Catalog::new(WireLayout::SplitPinout, &specs),
            Err(Error::DuplicateTag(7))
        ));
    }

    #[test]
    fn test_custom_table_and_tags() {
        const LED: &[FieldSpec] = &[FieldSpec {
            name: "led",
            scalar: Scalar::U8,
        }];
        let specs = [MessageSpec {
            tag: 40,
            kind: MessageKind::Test,
            fields: LED,
        }];
        let catalog = Catalog::new(WireLayout::SplitPinout, &specs).unwrap();
        assert_eq!(catalog.tags(), vec![40]);
        assert_eq!(catalog.tag_of(MessageKind::Test), Some(40));
        assert_eq!(catalog.encode(&Test { led: true }.into()).unwrap(), vec![1]);
        assert_eq!(
            catalog.decode(40, &[0]).unwrap(),
            Message::Test(Test { led: false })
        );
    }

    #[test]
    fn test_builtin_tags() {
        let split = Catalog::for_layout(WireLayout::SplitPinout).unwrap();
        assert_eq!(split.tags(), vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 12]);
        let merged = Catalog::for_layout(WireLayout::MergedPinout).unwrap();
        assert_eq!(merged.tags(), vec![1, 2, 3, 4, 5, 6, 7, 9, 12]);
        assert_eq!(merged.layout(), WireLayout::MergedPinout);
    }
}
