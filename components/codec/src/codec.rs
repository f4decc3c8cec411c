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

//! Group dispatch and the framed message codec.
//!
//! Every top-level message is framed as
//!
//! ```text
//! <uvlc: size> <uvlc: group id> <payload: size minus the id bytes>
//! ```
//!
//! Encoding writes the whole frame into the internal buffer behind a
//! reserved four-byte size slot, patches the slot once the payload length
//! is known, then streams the range to the sink. Decoding reads one frame
//! into memory and dispatches on the group id; unread trailing bytes within
//! a frame are skipped for forward compatibility.

use std::{collections::HashSet, sync::Arc};

use bytes_ext::{Bytes, SafeBufMut, SegmentPool};
use log::trace;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

use crate::{
    buffer::{self, FrameBuffer},
    config::CodecConfig,
    consts,
    instruction::{self, GroupInstructions, InstructionSet, ValueCodec},
    io::{ByteSink, ByteSource},
    primitive::{self, PrimitiveDecoder, PrimitiveEncoder},
    schema::Schema,
    value::{Message, Value},
    vlc, Decoder, Encoder,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to compile schema, err:{}", source))]
    Compile { source: instruction::Error },

    #[snafu(display("Unknown group type, group:{}.\nBacktrace:\n{}", group, backtrace))]
    UnknownGroupType { group: String, backtrace: Backtrace },

    #[snafu(display(
        "Group has no id and cannot be encoded dynamically, group:{}.\nBacktrace:\n{}",
        group,
        backtrace
    ))]
    MissingGroupId { group: String, backtrace: Backtrace },

    #[snafu(display(
        "Group type not permitted by the dynamic reference, group:{}.\nBacktrace:\n{}",
        group,
        backtrace
    ))]
    DynamicGroupTypeNotPermitted { group: String, backtrace: Backtrace },

    #[snafu(display(
        "Frame exceeds the reserved size slot, size:{}, max:{}.\nBacktrace:\n{}",
        size,
        max,
        backtrace
    ))]
    FrameTooLarge {
        size: u64,
        max: u64,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Value does not match the field type, group:{}, field:{}, expect:{}, actual:{}.\nBacktrace:\n{}",
        group,
        field,
        expect,
        actual,
        backtrace
    ))]
    ValueTypeMismatch {
        group: String,
        field: String,
        expect: String,
        actual: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Required field is null, group:{}, field:{}.\nBacktrace:\n{}",
        group,
        field,
        backtrace
    ))]
    MissingRequiredField {
        group: String,
        field: String,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Unknown enum value, group:{}, field:{}, value:{}.\nBacktrace:\n{}",
        group,
        field,
        value,
        backtrace
    ))]
    InvalidEnumValue {
        group: String,
        field: String,
        value: i32,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Data exceeds the configured cap, size:{}, max:{}.\nBacktrace:\n{}",
        size,
        max,
        backtrace
    ))]
    DataTooLarge {
        size: u64,
        max: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to encode field, group:{}, field:{}, err:{}", group, field, source))]
    EncodeField {
        group: String,
        field: String,
        source: primitive::Error,
    },

    #[snafu(display("Failed to decode field, group:{}, field:{}, err:{}", group, field, source))]
    DecodeField {
        group: String,
        field: String,
        source: primitive::Error,
    },

    #[snafu(display("Failed to encode vlc value, err:{}", source))]
    EncodeVlc { source: vlc::Error },

    #[snafu(display("Failed to decode vlc value, err:{}", source))]
    DecodeVlc { source: vlc::Error },

    #[snafu(display("Failed to write to frame buffer, err:{}", source))]
    EncodeBuffer { source: bytes_ext::Error },

    #[snafu(display("Frame buffer error, err:{}", source))]
    Buffer { source: buffer::Error },

    #[snafu(display("Io error, err:{}", source))]
    Io { source: std::io::Error },

    #[snafu(display("Source ended inside a frame.\nBacktrace:\n{}", backtrace))]
    Truncated { backtrace: Backtrace },

    #[snafu(display(
        "Frame content overruns the declared size.\nBacktrace:\n{}",
        backtrace
    ))]
    FrameOverrun { backtrace: Backtrace },

    #[snafu(display("Unknown group id:{}.\nBacktrace:\n{}", id, backtrace))]
    UnknownGroupId { id: u64, backtrace: Backtrace },

    #[snafu(display("Invalid vlc header.\nBacktrace:\n{}", backtrace))]
    InvalidVlcHeader { backtrace: Backtrace },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Instructions compiled from a schema, immutable and shareable across codec
/// instances and threads.
#[derive(Debug)]
pub struct CompiledSchema {
    instructions: InstructionSet,
}

impl CompiledSchema {
    pub fn compile(schema: &Schema) -> Result<Self> {
        let instructions = instruction::compile(schema).context(Compile)?;
        Ok(Self { instructions })
    }

    fn group_by_name(&self, name: &str) -> Option<(usize, &GroupInstructions)> {
        self.instructions
            .by_name
            .get(name)
            .map(|&idx| (idx, &self.instructions.groups[idx]))
    }

    fn group_by_id(&self, id: u64) -> Option<(usize, &GroupInstructions)> {
        self.instructions
            .by_id
            .get(&id)
            .map(|&idx| (idx, &self.instructions.groups[idx]))
    }
}

/// The Blink message codec.
///
/// One instance processes one message at a time; share the
/// [CompiledSchema] and construct an instance per thread for parallelism.
pub struct BlinkCodec {
    compiled: Arc<CompiledSchema>,
    config: CodecConfig,
    buf: FrameBuffer,
}

impl BlinkCodec {
    pub fn new(schema: &Schema) -> Result<Self> {
        Self::with_config(schema, CodecConfig::default())
    }

    pub fn with_config(schema: &Schema, config: CodecConfig) -> Result<Self> {
        let compiled = Arc::new(CompiledSchema::compile(schema)?);
        Ok(Self::with_compiled(compiled, config))
    }

    /// Build a codec around an already compiled schema.
    pub fn with_compiled(compiled: Arc<CompiledSchema>, config: CodecConfig) -> Self {
        let pool = Arc::new(bytes_ext::FixedSegmentPool::new(
            config.buffer_segment_size,
            config.pooled_segments,
        ));
        Self::with_pool(compiled, config, pool)
    }

    /// Build a codec whose frame buffer leases segments from `pool`.
    pub fn with_pool(
        compiled: Arc<CompiledSchema>,
        config: CodecConfig,
        pool: Arc<dyn SegmentPool>,
    ) -> Self {
        Self {
            compiled,
            config,
            buf: FrameBuffer::new(pool),
        }
    }

    /// The shared compiled schema, for constructing sibling codecs.
    pub fn compiled(&self) -> Arc<CompiledSchema> {
        self.compiled.clone()
    }

    /// Encode one message as a framed byte stream into `sink`.
    pub fn encode<S: ByteSink + ?Sized>(&mut self, message: &Message, sink: &mut S) -> Result<()> {
        let compiled = self.compiled.clone();
        let result = encode_frame(&compiled, &self.config, &mut self.buf, message, sink);
        // Segments go back to the pool on every exit path.
        self.buf.reset();
        result
    }

    /// Decode one message from `source`.
    ///
    /// Returns `None` on a clean end of stream: either EOF before the first
    /// preamble byte or a zero frame size.
    pub fn decode<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<Message>> {
        let size = match read_frame_size(source)? {
            None | Some(0) => return Ok(None),
            Some(size) => size,
        };
        ensure!(
            size <= self.config.max_frame_size as u64,
            DataTooLarge {
                size,
                max: self.config.max_frame_size,
            }
        );

        let size = size as usize;
        let mut frame = vec![0u8; size];
        let filled = source.read_fully(&mut frame).context(Io)?;
        ensure!(filled == size, Truncated);

        let compiled = self.compiled.clone();
        let mut cursor = &frame[..];
        let group_id = read_in_frame_u64(&mut cursor)?;
        let (idx, instructions) = compiled
            .group_by_id(group_id)
            .context(UnknownGroupId { id: group_id })?;

        let message = decode_group(&compiled, &self.config, &mut cursor, idx)?;
        // Trailing bytes within the frame are unknown extensions, skip them.
        trace!(
            "Decoded blink frame, group:{}, size:{}, skipped:{}",
            instructions.name,
            size,
            cursor.len()
        );
        Ok(Some(message))
    }
}

/// Read the frame size preamble straight from the source.
///
/// `None` means a clean end of stream. The null byte is not a legal size.
fn read_frame_size<S: ByteSource + ?Sized>(source: &mut S) -> Result<Option<u64>> {
    let b0 = match source.read_u8().context(Io)? {
        Some(b) => b,
        None => return Ok(None),
    };
    if b0 & 0x80 == 0 {
        return Ok(Some(u64::from(b0)));
    }
    if b0 & 0x40 == 0 {
        let b1 = source.read_u8().context(Io)?.context(Truncated)?;
        return Ok(Some(
            u64::from(b0 & consts::FIRST_BYTE_DATA_MASK) | u64::from(b1) << 6,
        ));
    }

    let n = (b0 & consts::FIRST_BYTE_DATA_MASK) as usize;
    ensure!(n > 0, InvalidVlcHeader);
    let mut size = 0u64;
    for i in 0..n {
        let b = source.read_u8().context(Io)?.context(Truncated)?;
        if i < consts::MAX_VLC_DATA_BYTES {
            size |= u64::from(b) << (8 * i);
        } else {
            ensure!(b == 0, InvalidVlcHeader);
        }
    }
    Ok(Some(size))
}

/// Decode an unsigned VLC in structural position (group id, sub-frame size)
/// from an in-memory frame.
fn read_in_frame_u64(cursor: &mut &[u8]) -> Result<u64> {
    match vlc::decode_u64_nullable(cursor) {
        Ok(Some(v)) => Ok(v),
        Ok(None) => InvalidVlcHeader.fail(),
        Err(e) if e.is_truncation() => FrameOverrun.fail(),
        Err(e) => Err(e).context(DecodeVlc),
    }
}

fn wrap_field_err<T>(result: primitive::Result<T>, group: &str, field: &str) -> Result<T> {
    match result {
        Ok(v) => Ok(v),
        // The whole declared frame is in memory, so running out of bytes
        // means the declared size was too small.
        Err(e) if e.is_truncation() => FrameOverrun.fail(),
        Err(e) if e.is_null_value() => MissingRequiredField { group, field }.fail(),
        Err(e) => Err(e).context(DecodeField { group, field }),
    }
}

fn wrap_vlc_err<T>(result: vlc::Result<T>, group: &str, field: &str) -> Result<T> {
    match result {
        Ok(v) => Ok(v),
        Err(e) if e.is_truncation() => FrameOverrun.fail(),
        Err(e) if e.is_null() => MissingRequiredField { group, field }.fail(),
        Err(e) => Err(e).context(DecodeVlc),
    }
}

fn reserve_size_slot(buf: &mut FrameBuffer) -> Result<usize> {
    let slot = buf.len();
    buf.try_put(&[
        consts::SIZE_PREFIX_FLAG | consts::FRAME_SIZE_DATA_BYTES as u8,
        0,
        0,
        0,
    ])
    .context(EncodeBuffer)?;
    Ok(slot)
}

fn patch_size_slot(buf: &mut FrameBuffer, slot: usize, payload_start: usize) -> Result<()> {
    let size = (buf.len() - payload_start) as u64;
    ensure!(
        size <= consts::MAX_FRAME_SIZE,
        FrameTooLarge {
            size,
            max: consts::MAX_FRAME_SIZE,
        }
    );
    let le = size.to_le_bytes();
    buf.patch(slot + 1, &le[..consts::FRAME_SIZE_DATA_BYTES])
        .context(Buffer)
}

fn encode_frame<S: ByteSink + ?Sized>(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    buf: &mut FrameBuffer,
    message: &Message,
    sink: &mut S,
) -> Result<()> {
    let (idx, instructions) = compiled
        .group_by_name(message.group())
        .context(UnknownGroupType {
            group: message.group(),
        })?;
    let group_id = instructions.group_id.context(MissingGroupId {
        group: &instructions.name,
    })?;

    let slot = reserve_size_slot(buf)?;
    let payload_start = buf.len();
    vlc::encode_u64(buf, group_id).context(EncodeVlc)?;
    encode_group(compiled, config, buf, idx, message)?;
    patch_size_slot(buf, slot, payload_start)?;

    buf.copy_to(sink, slot, buf.len()).context(Buffer)?;
    trace!(
        "Encoded blink frame, group:{}, bytes:{}",
        instructions.name,
        buf.len() - slot
    );
    Ok(())
}

fn encode_group(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    buf: &mut FrameBuffer,
    idx: usize,
    message: &Message,
) -> Result<()> {
    let instructions = &compiled.instructions.groups[idx];
    for field in &instructions.fields {
        match message.field(field.slot) {
            None | Some(Value::Null) => {
                ensure!(
                    !field.required,
                    MissingRequiredField {
                        group: &instructions.name,
                        field: &field.name,
                    }
                );
                vlc::encode_null(buf).context(EncodeVlc)?;
            }
            Some(value) => encode_value(
                compiled,
                config,
                buf,
                &instructions.name,
                &field.name,
                &field.codec,
                field.required,
                value,
            )?,
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode_value(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    buf: &mut FrameBuffer,
    group: &str,
    field: &str,
    codec: &ValueCodec,
    required: bool,
    value: &Value,
) -> Result<()> {
    let encoder = PrimitiveEncoder;
    match (codec, value) {
        (ValueCodec::UInt8, Value::UInt8(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::UInt16, Value::UInt16(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::UInt32, Value::UInt32(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::UInt64, Value::UInt64(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Int8, Value::Int8(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Int16, Value::Int16(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Int32, Value::Int32(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Int64, Value::Int64(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::BigInt, Value::BigInt(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Float32, Value::Float(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Float64, Value::Double(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Decimal, Value::Decimal(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::BigDecimal, Value::BigDecimal(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Boolean, Value::Boolean(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Time, Value::Timestamp(v)) => {
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::String { max_size }, Value::String(v)) => {
            if let Some(max) = max_size {
                ensure!(
                    v.len() as u64 <= u64::from(*max),
                    DataTooLarge {
                        size: v.len() as u64,
                        max: *max as usize,
                    }
                );
            }
            encoder
                .encode(buf, v.as_str())
                .context(EncodeField { group, field })
        }
        (ValueCodec::Binary { max_size }, Value::Binary(v)) => {
            if let Some(max) = max_size {
                ensure!(
                    v.len() as u64 <= u64::from(*max),
                    DataTooLarge {
                        size: v.len() as u64,
                        max: *max as usize,
                    }
                );
            }
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::Enum { table }, Value::Enum(v)) => {
            ensure!(
                table.contains(*v),
                InvalidEnumValue {
                    group,
                    field,
                    value: *v,
                }
            );
            encoder.encode(buf, v).context(EncodeField { group, field })
        }
        (ValueCodec::StaticGroup { group: target }, Value::Group(instance)) => {
            encode_static_group(compiled, config, buf, group, field, *target, required, instance)
        }
        (ValueCodec::DynamicGroup { valid }, Value::Group(instance)) => {
            encode_dynamic_group(compiled, config, buf, valid.as_deref(), instance)
        }
        (ValueCodec::Sequence { element }, Value::Sequence(items)) => {
            ensure!(
                items.len() <= config.max_sequence_length,
                DataTooLarge {
                    size: items.len() as u64,
                    max: config.max_sequence_length,
                }
            );
            vlc::encode_u64(buf, items.len() as u64).context(EncodeVlc)?;
            for item in items {
                ensure!(
                    !item.is_null(),
                    ValueTypeMismatch {
                        group,
                        field,
                        expect: element.type_name(),
                        actual: item.kind(),
                    }
                );
                encode_value(compiled, config, buf, group, field, element, true, item)?;
            }
            Ok(())
        }
        (codec, value) => ValueTypeMismatch {
            group,
            field,
            expect: codec.type_name(),
            actual: value.kind(),
        }
        .fail(),
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_static_group(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    buf: &mut FrameBuffer,
    group: &str,
    field: &str,
    target: usize,
    required: bool,
    instance: &Message,
) -> Result<()> {
    let target_instructions = &compiled.instructions.groups[target];
    ensure!(
        instance.group() == target_instructions.name,
        ValueTypeMismatch {
            group,
            field,
            expect: &target_instructions.name,
            actual: instance.group(),
        }
    );

    if required {
        // Required static groups are inlined bare.
        encode_group(compiled, config, buf, target, instance)
    } else {
        let slot = reserve_size_slot(buf)?;
        let start = buf.len();
        encode_group(compiled, config, buf, target, instance)?;
        patch_size_slot(buf, slot, start)
    }
}

fn encode_dynamic_group(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    buf: &mut FrameBuffer,
    valid: Option<&HashSet<usize>>,
    instance: &Message,
) -> Result<()> {
    let (idx, instructions) = compiled
        .group_by_name(instance.group())
        .context(UnknownGroupType {
            group: instance.group(),
        })?;
    if let Some(valid) = valid {
        ensure!(
            valid.contains(&idx),
            DynamicGroupTypeNotPermitted {
                group: instance.group(),
            }
        );
    }
    let group_id = instructions.group_id.context(MissingGroupId {
        group: &instructions.name,
    })?;

    let slot = reserve_size_slot(buf)?;
    let start = buf.len();
    vlc::encode_u64(buf, group_id).context(EncodeVlc)?;
    encode_group(compiled, config, buf, idx, instance)?;
    patch_size_slot(buf, slot, start)
}

fn decode_group(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    cursor: &mut &[u8],
    idx: usize,
) -> Result<Message> {
    let instructions = &compiled.instructions.groups[idx];
    let mut message = Message::empty(instructions.name.clone(), instructions.fields.len());

    for field in &instructions.fields {
        if !field.required {
            match cursor.first() {
                Some(&consts::NULL_BYTE) => {
                    *cursor = &cursor[1..];
                    continue;
                }
                Some(_) => {}
                None => return FrameOverrun.fail(),
            }
        }

        let value = decode_value(
            compiled,
            config,
            cursor,
            &instructions.name,
            &field.name,
            &field.codec,
            field.required,
        )?;
        message.set_field(field.slot, value);
    }

    Ok(message)
}

fn decode_value(
    compiled: &CompiledSchema,
    config: &CodecConfig,
    cursor: &mut &[u8],
    group: &str,
    field: &str,
    codec: &ValueCodec,
    required: bool,
) -> Result<Value> {
    let decoder = PrimitiveDecoder::new(config.max_binary_size);
    let value = match codec {
        ValueCodec::UInt8 => Value::UInt8(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::UInt16 => Value::UInt16(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::UInt32 => Value::UInt32(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::UInt64 => Value::UInt64(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Int8 => Value::Int8(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Int16 => Value::Int16(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Int32 => Value::Int32(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Int64 => Value::Int64(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::BigInt => Value::BigInt(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Float32 => Value::Float(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Float64 => Value::Double(wrap_field_err(decoder.decode(cursor), group, field)?),
        ValueCodec::Decimal => {
            Value::Decimal(wrap_field_err(decoder.decode(cursor), group, field)?)
        }
        ValueCodec::BigDecimal => {
            Value::BigDecimal(wrap_field_err(decoder.decode(cursor), group, field)?)
        }
        ValueCodec::Boolean => {
            Value::Boolean(wrap_field_err(decoder.decode(cursor), group, field)?)
        }
        ValueCodec::Time => {
            Value::Timestamp(wrap_field_err(decoder.decode(cursor), group, field)?)
        }
        ValueCodec::String { max_size } => {
            let v: String = wrap_field_err(decoder.decode(cursor), group, field)?;
            if let Some(max) = max_size {
                ensure!(
                    v.len() as u64 <= u64::from(*max),
                    DataTooLarge {
                        size: v.len() as u64,
                        max: *max as usize,
                    }
                );
            }
            Value::String(v)
        }
        ValueCodec::Binary { max_size } => {
            let v: Bytes = wrap_field_err(decoder.decode(cursor), group, field)?;
            if let Some(max) = max_size {
                ensure!(
                    v.len() as u64 <= u64::from(*max),
                    DataTooLarge {
                        size: v.len() as u64,
                        max: *max as usize,
                    }
                );
            }
            Value::Binary(v)
        }
        ValueCodec::Enum { table } => {
            let v: i32 = wrap_field_err(decoder.decode(cursor), group, field)?;
            ensure!(
                table.contains(v) || config.lenient_enums,
                InvalidEnumValue {
                    group,
                    field,
                    value: v,
                }
            );
            Value::Enum(v)
        }
        ValueCodec::StaticGroup { group: target } => {
            if required {
                Value::Group(decode_group(compiled, config, cursor, *target)?)
            } else {
                // Present optional static groups carry a size-prefixed
                // sub-frame.
                let mut sub = split_sub_frame(cursor, group, field)?;
                Value::Group(decode_group(compiled, config, &mut sub, *target)?)
            }
        }
        ValueCodec::DynamicGroup { .. } => {
            let mut sub = split_sub_frame(cursor, group, field)?;
            let group_id = read_in_frame_u64(&mut sub)?;
            let (sub_idx, _) = compiled
                .group_by_id(group_id)
                .context(UnknownGroupId { id: group_id })?;
            Value::Group(decode_group(compiled, config, &mut sub, sub_idx)?)
        }
        ValueCodec::Sequence { element } => {
            let count = wrap_vlc_err(vlc::decode_u64(cursor), group, field)?;
            ensure!(
                count <= config.max_sequence_length as u64,
                DataTooLarge {
                    size: count,
                    max: config.max_sequence_length,
                }
            );
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(decode_value(
                    compiled, config, cursor, group, field, element, true,
                )?);
            }
            Value::Sequence(items)
        }
    };

    Ok(value)
}

/// Split the size-prefixed sub-frame of a group reference off the cursor.
///
/// Bytes of the sub-frame not consumed by the nested group are skipped.
fn split_sub_frame<'a>(cursor: &mut &'a [u8], group: &str, field: &str) -> Result<&'a [u8]> {
    let len = wrap_vlc_err(vlc::decode_u64(cursor), group, field)?;
    ensure!(len <= cursor.len() as u64, FrameOverrun);
    let (sub, rest) = cursor.split_at(len as usize);
    *cursor = rest;
    Ok(sub)
}
