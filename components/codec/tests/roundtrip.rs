// Copyright 2024 The Blink Codec Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Whole-schema round trip tests.

use blink_codec::{
    codec::{BlinkCodec, CompiledSchema, Error},
    config::CodecConfig,
    schema::{FieldDef, GroupDef, Schema, TypeDef},
    value::{BigDecimal, Decimal, Message, Timestamp, Value},
};
use bytes_ext::Bytes;

fn roundtrip(codec: &mut BlinkCodec, message: &Message) -> Message {
    let mut out = Vec::new();
    codec.encode(message, &mut out).unwrap();
    let mut source = &out[..];
    let decoded = codec.decode(&mut source).unwrap().unwrap();
    assert_eq!(None, codec.decode(&mut source).unwrap());
    decoded
}

#[test]
fn test_floats_message() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Floats")
                .with_id(104)
                .with_annotation("doc", "ieee-754 fields, big-endian on the wire")
                .with_field(FieldDef::new("myFloat", TypeDef::Float32, true).with_id(9))
                .with_field(FieldDef::new("myDouble", TypeDef::Float64, true).with_id(10))
                .with_field(FieldDef::new("myFloatObj", TypeDef::Float32, false).with_id(20))
                .with_field(FieldDef::new("myDoubleObj", TypeDef::Float64, false).with_id(21)),
        )
        .build()
        .unwrap();
    assert_eq!(
        Some("ieee-754 fields, big-endian on the wire"),
        schema
            .group_by_name("Floats")
            .unwrap()
            .annotations
            .get("doc")
            .map(String::as_str)
    );
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new(
        "Floats",
        vec![
            Value::Float(1.5),
            Value::Double(-0.25),
            Value::Null,
            Value::Double(f64::MAX),
        ],
    );
    assert_eq!(message, roundtrip(&mut codec, &message));

    let message = Message::new(
        "Floats",
        vec![
            Value::Float(f32::MIN),
            Value::Double(0.0),
            Value::Float(3.75),
            Value::Null,
        ],
    );
    assert_eq!(message, roundtrip(&mut codec, &message));
}

#[test]
fn test_all_primitives_roundtrip() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Everything")
                .with_id(1)
                .with_field(FieldDef::new("u8", TypeDef::UInt8, true))
                .with_field(FieldDef::new("u16", TypeDef::UInt16, true))
                .with_field(FieldDef::new("u32", TypeDef::UInt32, true))
                .with_field(FieldDef::new("u64", TypeDef::UInt64, true))
                .with_field(FieldDef::new("i8", TypeDef::Int8, true))
                .with_field(FieldDef::new("i16", TypeDef::Int16, true))
                .with_field(FieldDef::new("i32", TypeDef::Int32, true))
                .with_field(FieldDef::new("i64", TypeDef::Int64, true))
                .with_field(FieldDef::new("big", TypeDef::BigInt, true))
                .with_field(FieldDef::new("dec", TypeDef::Decimal, true))
                .with_field(FieldDef::new("bigDec", TypeDef::BigDecimal, true))
                .with_field(FieldDef::new("flag", TypeDef::Boolean, true))
                .with_field(FieldDef::new("name", TypeDef::string(), true))
                .with_field(FieldDef::new("blob", TypeDef::binary(), true))
                .with_field(FieldDef::new("at", TypeDef::millis_utc(), true))
                .with_field(FieldDef::new(
                    "side",
                    TypeDef::enumeration(&[("Buy", 1), ("Sell", 2)]),
                    true,
                )),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new(
        "Everything",
        vec![
            Value::UInt8(200),
            Value::UInt16(50_000),
            Value::UInt32(4_000_000_000),
            Value::UInt64(u64::MAX),
            Value::Int8(-100),
            Value::Int16(-30_000),
            Value::Int32(i32::MIN),
            Value::Int64(i64::MAX),
            Value::BigInt(-1_234_567_890_123),
            Value::Decimal(Decimal::new(314_159, -5)),
            Value::BigDecimal(BigDecimal::new(-271_828, 100_000)),
            Value::Boolean(true),
            Value::String("björk & co".to_string()),
            Value::Binary(Bytes::from_static(&[0x00, 0xFF, 0x7F])),
            Value::Timestamp(Timestamp::new(1_621_324_705_123)),
            Value::Enum(2),
        ],
    );
    assert_eq!(message, roundtrip(&mut codec, &message));
}

#[test]
fn test_optional_fields_all_null() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Sparse")
                .with_id(2)
                .with_field(FieldDef::new("a", TypeDef::UInt32, false))
                .with_field(FieldDef::new("b", TypeDef::string(), false))
                .with_field(FieldDef::new("c", TypeDef::Decimal, false))
                .with_field(FieldDef::new("d", TypeDef::sequence(TypeDef::UInt8), false)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::empty("Sparse", 4);
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    // Group id plus one null byte per field.
    assert_eq!(vec![0xC3, 0x05, 0x00, 0x00, 0x02, 0xC0, 0xC0, 0xC0, 0xC0], out);

    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());
}

#[test]
fn test_inherited_fields_precede_own() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Base")
                .with_id(1)
                .with_field(FieldDef::new("first", TypeDef::UInt8, true)),
        )
        .add_group(
            GroupDef::new("Child")
                .with_id(2)
                .with_super("Base")
                .with_field(FieldDef::new("second", TypeDef::UInt8, true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    // Slot 0 is the inherited field.
    let message = Message::new("Child", vec![Value::UInt8(0x11), Value::UInt8(0x22)]);
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    assert_eq!(vec![0xC3, 0x03, 0x00, 0x00, 0x02, 0x11, 0x22], out);

    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());
}

#[test]
fn test_static_group_references() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Leg").with_field(FieldDef::new("qty", TypeDef::UInt32, true)))
        .add_group(
            GroupDef::new("Order")
                .with_id(5)
                .with_field(FieldDef::new("leg1", TypeDef::reference("Leg"), true))
                .with_field(FieldDef::new("leg2", TypeDef::reference("Leg"), false)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    // Required legs are inlined bare; an absent optional leg is one null
    // byte.
    let message = Message::new(
        "Order",
        vec![
            Value::Group(Message::new("Leg", vec![Value::UInt32(7)])),
            Value::Null,
        ],
    );
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    assert_eq!(vec![0xC3, 0x03, 0x00, 0x00, 0x05, 0x07, 0xC0], out);
    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());

    // A present optional leg rides in a size-prefixed sub-frame.
    let message = Message::new(
        "Order",
        vec![
            Value::Group(Message::new("Leg", vec![Value::UInt32(7)])),
            Value::Group(Message::new("Leg", vec![Value::UInt32(300)])),
        ],
    );
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    assert_eq!(
        vec![0xC3, 0x08, 0x00, 0x00, 0x05, 0x07, 0xC3, 0x02, 0x00, 0x00, 0xAC, 0x04],
        out
    );
    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());
}

#[test]
fn test_static_group_starting_with_null_field() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Inner").with_field(FieldDef::new("flag", TypeDef::Boolean, false)))
        .add_group(
            GroupDef::new("Outer")
                .with_id(8)
                .with_field(FieldDef::new("inner", TypeDef::reference("Inner"), true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    // The inlined group's first byte is a null byte and must not be read as
    // an absent outer field.
    let message = Message::new(
        "Outer",
        vec![Value::Group(Message::new("Inner", vec![Value::Null]))],
    );
    assert_eq!(message, roundtrip(&mut codec, &message));
}

#[test]
fn test_dynamic_reference_to_subgroup() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Animal")
                .with_id(1)
                .with_field(FieldDef::new("name", TypeDef::string(), true)),
        )
        .add_group(
            GroupDef::new("Dog")
                .with_id(2)
                .with_super("Animal")
                .with_field(FieldDef::new("goodBoy", TypeDef::Boolean, true)),
        )
        .add_group(
            GroupDef::new("Zoo")
                .with_id(10)
                .with_field(FieldDef::new("star", TypeDef::dynamic("Animal"), true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let dog = Message::new(
        "Dog",
        vec![Value::String("Rex".to_string()), Value::Boolean(true)],
    );
    let message = Message::new("Zoo", vec![Value::Group(dog)]);

    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    // The sub-frame carries the concrete subgroup's id before its fields.
    assert_eq!(
        vec![
            0xC3, 0x0B, 0x00, 0x00, // frame size 11
            0x0A, // Zoo
            0xC3, 0x06, 0x00, 0x00, // sub-frame size 6
            0x02, // Dog
            0x03, 0x52, 0x65, 0x78, // "Rex"
            0x01, // goodBoy
        ],
        out
    );

    let mut source = &out[..];
    let decoded = codec.decode(&mut source).unwrap().unwrap();
    assert_eq!(message, decoded);
    match decoded.field(0) {
        Some(Value::Group(star)) => assert_eq!("Dog", star.group()),
        other => panic!("expected a group, got {other:?}"),
    }
}

#[test]
fn test_dynamic_reference_rejects_foreign_group() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Animal").with_id(1))
        .add_group(GroupDef::new("Rock").with_id(9))
        .add_group(
            GroupDef::new("Zoo")
                .with_id(10)
                .with_field(FieldDef::new("star", TypeDef::dynamic("Animal"), true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new("Zoo", vec![Value::Group(Message::new("Rock", vec![]))]);
    let mut out = Vec::new();
    assert!(matches!(
        codec.encode(&message, &mut out),
        Err(Error::DynamicGroupTypeNotPermitted { .. })
    ));
}

#[test]
fn test_sequences() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Leg").with_field(FieldDef::new("qty", TypeDef::UInt32, true)))
        .add_group(
            GroupDef::new("Basket")
                .with_id(3)
                .with_field(FieldDef::new("ids", TypeDef::sequence(TypeDef::UInt32), true))
                .with_field(FieldDef::new(
                    "tags",
                    TypeDef::sequence(TypeDef::string()),
                    false,
                ))
                .with_field(FieldDef::new(
                    "legs",
                    TypeDef::sequence(TypeDef::reference("Leg")),
                    false,
                )),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new(
        "Basket",
        vec![
            Value::Sequence(vec![
                Value::UInt32(1),
                Value::UInt32(128),
                Value::UInt32(70_000),
            ]),
            Value::Sequence(vec![
                Value::String("a".to_string()),
                Value::String("".to_string()),
            ]),
            Value::Sequence(vec![
                Value::Group(Message::new("Leg", vec![Value::UInt32(9)])),
                Value::Group(Message::new("Leg", vec![Value::UInt32(10)])),
            ]),
        ],
    );
    assert_eq!(message, roundtrip(&mut codec, &message));

    // Empty sequence and absent sequences are distinct on the wire.
    let message = Message::new(
        "Basket",
        vec![Value::Sequence(vec![]), Value::Null, Value::Null],
    );
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    assert_eq!(vec![0xC3, 0x04, 0x00, 0x00, 0x03, 0x00, 0xC0, 0xC0], out);
    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());
}

#[test]
fn test_sequence_of_dynamic_groups() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Event")
                .with_id(1)
                .with_field(FieldDef::new("seq", TypeDef::UInt64, true)),
        )
        .add_group(
            GroupDef::new("Fill")
                .with_id(2)
                .with_super("Event")
                .with_field(FieldDef::new("qty", TypeDef::UInt32, true)),
        )
        .add_group(
            GroupDef::new("Batch")
                .with_id(7)
                .with_field(FieldDef::new(
                    "events",
                    TypeDef::sequence(TypeDef::dynamic("Event")),
                    true,
                )),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new(
        "Batch",
        vec![Value::Sequence(vec![
            Value::Group(Message::new("Event", vec![Value::UInt64(1)])),
            Value::Group(Message::new(
                "Fill",
                vec![Value::UInt64(2), Value::UInt32(500)],
            )),
        ])],
    );
    let decoded = roundtrip(&mut codec, &message);
    assert_eq!(message, decoded);
}

#[test]
fn test_enum_decoding_strict_and_lenient() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Trade").with_id(4).with_field(FieldDef::new(
            "side",
            TypeDef::enumeration(&[("Buy", 1), ("Sell", 2)]),
            true,
        )))
        .build()
        .unwrap();

    let mut codec = BlinkCodec::new(&schema).unwrap();
    let message = Message::new("Trade", vec![Value::Enum(2)]);
    assert_eq!(message, roundtrip(&mut codec, &message));

    // Unknown ordinal rejected on encode and, by default, on decode.
    let bad = Message::new("Trade", vec![Value::Enum(5)]);
    let mut out = Vec::new();
    assert!(matches!(
        codec.encode(&bad, &mut out),
        Err(Error::InvalidEnumValue { .. })
    ));

    let mut source: &[u8] = &[0x02, 0x04, 0x05];
    assert!(matches!(
        codec.decode(&mut source),
        Err(Error::InvalidEnumValue { .. })
    ));

    let lenient = CodecConfig {
        lenient_enums: true,
        ..Default::default()
    };
    let mut codec = BlinkCodec::with_config(&schema, lenient).unwrap();
    let mut source: &[u8] = &[0x02, 0x04, 0x05];
    let decoded = codec.decode(&mut source).unwrap().unwrap();
    assert_eq!(Some(&Value::Enum(5)), decoded.field(0));
}

#[test]
fn test_string_max_size() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Note").with_id(6).with_field(FieldDef::new(
            "txt",
            TypeDef::String { max_size: Some(4) },
            true,
        )))
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new("Note", vec![Value::String("hello".to_string())]);
    let mut out = Vec::new();
    assert!(matches!(
        codec.encode(&message, &mut out),
        Err(Error::DataTooLarge { .. })
    ));

    // Five declared bytes on the wire.
    let mut source: &[u8] = &[0x07, 0x06, 0x05, 0x68, 0x65, 0x6C, 0x6C, 0x6F];
    assert!(matches!(
        codec.decode(&mut source),
        Err(Error::DataTooLarge { .. })
    ));
}

#[test]
fn test_wide_bigint_decodes() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Nums")
                .with_id(7)
                .with_field(FieldDef::new("big", TypeDef::BigInt, true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    // A ten-byte sign-extended image of 1, wider than any canonical encoder
    // would emit.
    let mut source: &[u8] = &[0x0B, 0x07, 0xC9, 0x01, 0, 0, 0, 0, 0, 0, 0, 0];
    let decoded = codec.decode(&mut source).unwrap().unwrap();
    assert_eq!(Some(&Value::BigInt(1)), decoded.field(0));
}

#[test]
fn test_empty_group() {
    let schema = Schema::builder()
        .add_group(GroupDef::new("Ping").with_id(9))
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let message = Message::new("Ping", vec![]);
    let mut out = Vec::new();
    codec.encode(&message, &mut out).unwrap();
    assert_eq!(vec![0xC3, 0x01, 0x00, 0x00, 0x09], out);

    let mut source = &out[..];
    assert_eq!(Some(message), codec.decode(&mut source).unwrap());
}

#[test]
fn test_message_stream() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Tick")
                .with_id(1)
                .with_field(FieldDef::new("seq", TypeDef::UInt64, true)),
        )
        .build()
        .unwrap();
    let mut codec = BlinkCodec::new(&schema).unwrap();

    let mut out = Vec::new();
    for seq in 0..10u64 {
        let message = Message::new("Tick", vec![Value::UInt64(seq * 1000)]);
        codec.encode(&message, &mut out).unwrap();
    }

    let mut source = &out[..];
    let mut count = 0u64;
    while let Some(decoded) = codec.decode(&mut source).unwrap() {
        assert_eq!(Some(&Value::UInt64(count * 1000)), decoded.field(0));
        count += 1;
    }
    assert_eq!(10, count);
}

#[test]
fn test_shared_compiled_schema() {
    let schema = Schema::builder()
        .add_group(
            GroupDef::new("Tick")
                .with_id(1)
                .with_field(FieldDef::new("seq", TypeDef::UInt64, true)),
        )
        .build()
        .unwrap();

    let compiled = std::sync::Arc::new(CompiledSchema::compile(&schema).unwrap());
    let mut encoder = BlinkCodec::with_compiled(compiled.clone(), CodecConfig::default());
    let mut decoder = BlinkCodec::with_compiled(compiled, CodecConfig::default());

    let message = Message::new("Tick", vec![Value::UInt64(42)]);
    let mut out = Vec::new();
    encoder.encode(&message, &mut out).unwrap();

    let mut source = &out[..];
    assert_eq!(Some(message), decoder.decode(&mut source).unwrap());
}
