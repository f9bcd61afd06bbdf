//! CLIP — the Animation Clip resource (type `0x6B20C4F3`): a
//! version-gated header, a namespace/slot table, a timed event list,
//! and an opaque codec payload.
//!
//! Field presence below version thresholds is a read-time fact, not a
//! runtime choice: a `ClipResource` built from a v4 clip stays a v4
//! clip for its whole lifetime and re-serializes the same fields it
//! was constructed from.

use crate::index::ResourceKey;
use crate::resource::{Resource, ResourceEvent, TypedResourceState};
use dbpf_common::error::DbpfError;
use dbpf_common::primitives::{ByteReader, ByteWriter};
use dbpf_common::Result;

pub const CLIP_TYPE_ID: u32 = 0x6B20C4F3;
const CODEC_HEADER_SIZE: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventCommon {
    pub unknown1: u32,
    pub unknown2: u32,
    pub timecode: f32,
}

fn read_common(r: &mut ByteReader) -> Result<EventCommon> {
    Ok(EventCommon {
        unknown1: r.u32()?,
        unknown2: r.u32()?,
        timecode: r.f32()?,
    })
}

fn write_common(w: &mut ByteWriter, common: &EventCommon) {
    w.u32(common.unknown1);
    w.u32(common.unknown2);
    w.f32(common.timecode);
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClipEvent {
    Sound {
        common: EventCommon,
        sound_name: String,
    },
    Script {
        common: EventCommon,
        data: Vec<u8>,
    },
    Effect {
        common: EventCommon,
        slot_name: String,
        actor_hash: u32,
        slot_hash: u32,
        preserved: Vec<u8>,
        effect_name: String,
    },
    Snap {
        common: EventCommon,
        data: Vec<u8>,
    },
    DoubleModifierSound {
        common: EventCommon,
        blob: Vec<u8>,
        actor_hash: u32,
        slot_hash: u32,
    },
    Censor {
        common: EventCommon,
        unknown3: f32,
    },
    /// Any event type id not in the table above. Its body is opaque
    /// bytes preserved verbatim.
    Unknown {
        common: EventCommon,
        tag: u32,
        data: Vec<u8>,
    },
}

impl ClipEvent {
    pub fn common(&self) -> EventCommon {
        match self {
            ClipEvent::Sound { common, .. }
            | ClipEvent::Script { common, .. }
            | ClipEvent::Effect { common, .. }
            | ClipEvent::Snap { common, .. }
            | ClipEvent::DoubleModifierSound { common, .. }
            | ClipEvent::Censor { common, .. }
            | ClipEvent::Unknown { common, .. } => *common,
        }
    }

    fn type_id(&self) -> u32 {
        match self {
            ClipEvent::Sound { .. } => 3,
            ClipEvent::Script { .. } => 4,
            ClipEvent::Effect { .. } => 5,
            ClipEvent::Snap { .. } => 12,
            ClipEvent::DoubleModifierSound { .. } => 14,
            ClipEvent::Censor { .. } => 19,
            ClipEvent::Unknown { tag, .. } => *tag,
        }
    }
}

fn read_event(r: &mut ByteReader) -> Result<ClipEvent> {
    let type_id = r.u32()?;
    let total_size = r.u32()? as usize;
    let common = read_common(r)?;
    let body_len = total_size
        .checked_sub(12)
        .ok_or_else(|| DbpfError::Malformed("clip event total_size smaller than its header".into()))?;

    Ok(match type_id {
        3 => {
            if body_len != 128 {
                return Err(DbpfError::Malformed("Sound event body must be 128 bytes".into()));
            }
            ClipEvent::Sound {
                common,
                sound_name: r.fixed_ascii(128)?,
            }
        }
        4 => ClipEvent::Script {
            common,
            data: r.bytes_owned(body_len)?,
        },
        5 => {
            if body_len != 128 + 4 + 4 + 16 + 128 {
                return Err(DbpfError::Malformed("Effect event body has the wrong length".into()));
            }
            let slot_name = r.fixed_ascii(128)?;
            let actor_hash = r.u32()?;
            let slot_hash = r.u32()?;
            let preserved = r.bytes_owned(16)?;
            let effect_name = r.fixed_ascii(128)?;
            ClipEvent::Effect {
                common,
                slot_name,
                actor_hash,
                slot_hash,
                preserved,
                effect_name,
            }
        }
        12 => ClipEvent::Snap {
            common,
            data: r.bytes_owned(body_len)?,
        },
        14 => {
            if body_len != 128 + 4 + 4 {
                return Err(DbpfError::Malformed(
                    "DoubleModifierSound event body has the wrong length".into(),
                ));
            }
            let blob = r.bytes_owned(128)?;
            let actor_hash = r.u32()?;
            let slot_hash = r.u32()?;
            ClipEvent::DoubleModifierSound {
                common,
                blob,
                actor_hash,
                slot_hash,
            }
        }
        19 => {
            if body_len != 4 {
                return Err(DbpfError::Malformed("Censor event body must be 4 bytes".into()));
            }
            ClipEvent::Censor {
                common,
                unknown3: r.f32()?,
            }
        }
        tag => ClipEvent::Unknown {
            common,
            tag,
            data: r.bytes_owned(body_len)?,
        },
    })
}

fn write_event(w: &mut ByteWriter, event: &ClipEvent) -> Result<()> {
    let mut body = ByteWriter::new();
    match event {
        ClipEvent::Sound { sound_name, .. } => body.fixed_ascii_null_padded(sound_name, 128)?,
        ClipEvent::Script { data, .. } => body.bytes(data),
        ClipEvent::Effect {
            slot_name,
            actor_hash,
            slot_hash,
            preserved,
            effect_name,
            ..
        } => {
            body.fixed_ascii_null_padded(slot_name, 128)?;
            body.u32(*actor_hash);
            body.u32(*slot_hash);
            body.bytes(preserved);
            body.fixed_ascii_null_padded(effect_name, 128)?;
        }
        ClipEvent::Snap { data, .. } => body.bytes(data),
        ClipEvent::DoubleModifierSound {
            blob,
            actor_hash,
            slot_hash,
            ..
        } => {
            body.bytes(blob);
            body.u32(*actor_hash);
            body.u32(*slot_hash);
        }
        ClipEvent::Censor { unknown3, .. } => body.f32(*unknown3),
        ClipEvent::Unknown { data, .. } => body.bytes(data),
    }
    let body_bytes = body.into_bytes();
    let common = event.common();

    w.u32(event.type_id());
    w.u32((body_bytes.len() + 12) as u32);
    write_common(w, &common);
    w.bytes(&body_bytes);
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct IkSlotAssignment {
    pub chain_id: u16,
    pub slot_id: u16,
    pub target_object_namespace: String,
    pub target_joint_name: String,
}

/// The codec payload's 48-byte header, exposed for inspection. Never
/// re-derived: `CodecData` always re-emits the raw bytes it was built
/// from verbatim, whether or not they were mutated elsewhere.
#[derive(Clone, Debug, PartialEq)]
pub struct CodecHeader {
    pub format_token: [u8; 6],
    pub version: u16,
    pub flags: u32,
    pub tick_length: u32,
    pub tick_count: u32,
    pub channel_count: u32,
    pub palette_size: u32,
    pub offset_a: u32,
    pub offset_b: u32,
    pub offset_c: u32,
    pub offset_d: u32,
    pub name_a_len: u16,
    pub name_b_len: u16,
}

/// The CLIP resource's opaque animation codec payload. The bytes are
/// never decoded, transformed, or re-derived — only carried.
#[derive(Clone, Debug, PartialEq)]
pub struct CodecData {
    raw: Vec<u8>,
}

impl CodecData {
    pub fn from_raw(raw: Vec<u8>) -> Self {
        CodecData { raw }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parse the leading 48 bytes as a `CodecHeader` for inspection.
    /// `None` if the payload is shorter than that.
    pub fn header(&self) -> Option<CodecHeader> {
        if self.raw.len() < CODEC_HEADER_SIZE {
            return None;
        }
        let mut r = ByteReader::new(&self.raw[..CODEC_HEADER_SIZE]);
        let mut format_token = [0u8; 6];
        for byte in &mut format_token {
            *byte = r.u8().ok()?;
        }
        Some(CodecHeader {
            format_token,
            version: r.u16().ok()?,
            flags: r.u32().ok()?,
            tick_length: r.u32().ok()?,
            tick_count: r.u32().ok()?,
            channel_count: r.u32().ok()?,
            palette_size: r.u32().ok()?,
            offset_a: r.u32().ok()?,
            offset_b: r.u32().ok()?,
            offset_c: r.u32().ok()?,
            offset_d: r.u32().ok()?,
            name_a_len: r.u16().ok()?,
            name_b_len: r.u16().ok()?,
        })
    }
}

#[derive(Clone, Debug)]
struct ClipData {
    version: u32,
    flags: u32,
    duration: f32,
    initial_rotation: [f32; 4],
    initial_translation: [f32; 3],
    reference_namespace_hash: Option<u32>,
    surface_namespace_hash: Option<u32>,
    surface_joint_name_hash: Option<u32>,
    surface_child_namespace_hash: Option<u32>,
    clip_name: Option<String>,
    rig_namespace: String,
    explicit_namespaces: Vec<String>,
    slot_assignments: Vec<IkSlotAssignment>,
    events: Vec<ClipEvent>,
    codec_data: CodecData,
}

fn parse(bytes: &[u8]) -> Result<ClipData> {
    let mut r = ByteReader::new(bytes);

    let version = r.u32()?;
    let flags = r.u32()?;
    let duration = r.f32()?;
    let initial_rotation = [r.f32()?, r.f32()?, r.f32()?, r.f32()?];
    let initial_translation = [r.f32()?, r.f32()?, r.f32()?];

    let reference_namespace_hash = if version >= 5 { Some(r.u32()?) } else { None };
    let (surface_namespace_hash, surface_joint_name_hash) = if version >= 10 {
        (Some(r.u32()?), Some(r.u32()?))
    } else {
        (None, None)
    };
    let surface_child_namespace_hash = if version >= 11 { Some(r.u32()?) } else { None };
    let clip_name = if version >= 7 {
        Some(r.len_prefixed_utf8()?)
    } else {
        None
    };

    let rig_namespace = r.len_prefixed_utf8()?;

    let explicit_namespaces = if version >= 4 {
        let count = r.u32()? as usize;
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            names.push(r.len_prefixed_utf8()?);
        }
        names
    } else {
        Vec::new()
    };

    let slot_count = r.u32()? as usize;
    let mut slot_assignments = Vec::with_capacity(slot_count);
    for _ in 0..slot_count {
        slot_assignments.push(IkSlotAssignment {
            chain_id: r.u16()?,
            slot_id: r.u16()?,
            target_object_namespace: r.len_prefixed_utf8()?,
            target_joint_name: r.len_prefixed_utf8()?,
        });
    }

    let event_count = r.u32()? as usize;
    let mut events = Vec::with_capacity(event_count);
    for _ in 0..event_count {
        events.push(read_event(&mut r)?);
    }

    let codec_len = r.u32()? as usize;
    let codec_data = CodecData::from_raw(r.bytes_owned(codec_len)?);

    Ok(ClipData {
        version,
        flags,
        duration,
        initial_rotation,
        initial_translation,
        reference_namespace_hash,
        surface_namespace_hash,
        surface_joint_name_hash,
        surface_child_namespace_hash,
        clip_name,
        rig_namespace,
        explicit_namespaces,
        slot_assignments,
        events,
        codec_data,
    })
}

fn serialize(data: &ClipData) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.u32(data.version);
    w.u32(data.flags);
    w.f32(data.duration);
    for component in &data.initial_rotation {
        w.f32(*component);
    }
    for component in &data.initial_translation {
        w.f32(*component);
    }

    if data.version >= 5 {
        w.u32(data.reference_namespace_hash.unwrap_or(0));
    }
    if data.version >= 10 {
        w.u32(data.surface_namespace_hash.unwrap_or(0));
        w.u32(data.surface_joint_name_hash.unwrap_or(0));
    }
    if data.version >= 11 {
        w.u32(data.surface_child_namespace_hash.unwrap_or(0));
    }
    if data.version >= 7 {
        w.len_prefixed_utf8(data.clip_name.as_deref().unwrap_or(""));
    }

    w.len_prefixed_utf8(&data.rig_namespace);

    if data.version >= 4 {
        w.u32(data.explicit_namespaces.len() as u32);
        for name in &data.explicit_namespaces {
            w.len_prefixed_utf8(name);
        }
    }

    w.u32(data.slot_assignments.len() as u32);
    for slot in &data.slot_assignments {
        w.u16(slot.chain_id);
        w.u16(slot.slot_id);
        w.len_prefixed_utf8(&slot.target_object_namespace);
        w.len_prefixed_utf8(&slot.target_joint_name);
    }

    w.u32(data.events.len() as u32);
    for event in &data.events {
        write_event(&mut w, event).expect("events are only constructed with in-bounds field widths");
    }

    w.u32(data.codec_data.raw().len() as u32);
    w.bytes(data.codec_data.raw());

    w.into_bytes()
}

/// The Animation Clip wrapper: a memoized, dirty-tracked decoded view
/// over a CLIP resource's bytes.
pub struct ClipResource {
    key: ResourceKey,
    state: TypedResourceState<ClipData>,
}

impl ClipResource {
    /// Build from a resource's raw bytes. Never fails: a parse error
    /// leaves the wrapper in a degraded state exposing the original
    /// bytes.
    pub fn from_bytes(key: ResourceKey, bytes: Vec<u8>) -> Self {
        match parse(&bytes) {
            Ok(data) => ClipResource {
                key,
                state: TypedResourceState::new(bytes, Some(data), None),
            },
            Err(e) => ClipResource {
                key,
                state: TypedResourceState::new(bytes, None, Some(e.to_string())),
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.state.is_degraded()
    }

    pub fn version(&self) -> Option<u32> {
        self.state.decoded.as_ref().map(|d| d.version)
    }

    pub fn duration(&self) -> Option<f32> {
        self.state.decoded.as_ref().map(|d| d.duration)
    }

    pub fn set_duration(&mut self, duration: f32) {
        if let Some(data) = self.state.decoded.as_mut() {
            data.duration = duration;
            self.state.mark_dirty();
        }
    }

    pub fn clip_name(&self) -> Option<&str> {
        self.state.decoded.as_ref()?.clip_name.as_deref()
    }

    /// Set the clip name. No-op below version 7, where the field
    /// doesn't exist on disk.
    pub fn set_clip_name(&mut self, name: impl Into<String>) {
        if let Some(data) = self.state.decoded.as_mut() {
            if data.version >= 7 {
                data.clip_name = Some(name.into());
                self.state.mark_dirty();
            }
        }
    }

    pub fn events(&self) -> &[ClipEvent] {
        self.state
            .decoded
            .as_ref()
            .map(|d| d.events.as_slice())
            .unwrap_or(&[])
    }

    pub fn push_event(&mut self, event: ClipEvent) {
        if let Some(data) = self.state.decoded.as_mut() {
            data.events.push(event);
            self.state.mark_dirty();
        }
    }

    pub fn remove_event(&mut self, index: usize) -> Option<ClipEvent> {
        let data = self.state.decoded.as_mut()?;
        if index >= data.events.len() {
            return None;
        }
        let event = data.events.remove(index);
        self.state.mark_dirty();
        Some(event)
    }

    pub fn slot_assignments(&self) -> &[IkSlotAssignment] {
        self.state
            .decoded
            .as_ref()
            .map(|d| d.slot_assignments.as_slice())
            .unwrap_or(&[])
    }

    pub fn add_slot_assignment(&mut self, slot: IkSlotAssignment) {
        if let Some(data) = self.state.decoded.as_mut() {
            data.slot_assignments.push(slot);
            self.state.mark_dirty();
        }
    }

    pub fn codec_data(&self) -> Option<&CodecData> {
        self.state.decoded.as_ref().map(|d| &d.codec_data)
    }
}

impl Resource for ClipResource {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn bytes(&self) -> Vec<u8> {
        self.state.bytes(serialize)
    }

    fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    fn events(&self) -> &[ResourceEvent] {
        self.state.events()
    }
}
