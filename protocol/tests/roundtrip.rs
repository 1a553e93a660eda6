use protocol::channel::SyncChannel;
use protocol::codec::{CodecError, CodecLimits, SyncCodec};
use protocol::header::MessageDirection;
use protocol::message::{ProtocolVersion, SyncAction, SyncEnvelope, SyncMessage};
use protocol::packets::{
    ControlEvent, OPCODE_ACTOR_CONTROL, OPCODE_CLIENT_TRIGGER, PMSG_ACTOR_CONTROL_RECV,
    PMSG_CLIENT_TRIGGER_RECV, SUBTYPE_CANCEL_EMOTE, SUBTYPE_SIT_OBJECT_EMOTE, decode_inbound,
};
use protocol::ser;

fn sample_play_envelope() -> SyncEnvelope {
    SyncEnvelope::new(
        100,
        10,
        SyncMessage::new(SyncAction::PlayEmote, 0x1000_2000, 0, 0x0040_0000_0000_0001, 88),
    )
}

fn sample_stop_envelope() -> SyncEnvelope {
    SyncEnvelope::new(
        100,
        11,
        SyncMessage::new(SyncAction::StopEmote, 0x1000_2001, 2, 0, 0),
    )
}

#[test]
fn play_envelope_roundtrip_on_local_channel() {
    let codec = SyncCodec::default();
    let envelope = sample_play_envelope();

    let bytes = codec
        .encode_frame(SyncChannel::LocalImmediate, &envelope)
        .unwrap();
    let decoded = codec.decode_frame(&bytes).unwrap();

    assert_eq!(decoded.channel, SyncChannel::LocalImmediate);
    assert_eq!(decoded.envelope, envelope);
}

#[test]
fn stop_envelope_keeps_object_index() {
    let codec = SyncCodec::default();
    let frame = codec
        .encode_frame(SyncChannel::OwnedImmediate, &sample_stop_envelope())
        .unwrap();

    let decoded = codec.decode_frame(&frame).unwrap();
    assert_eq!(decoded.envelope.message.action, SyncAction::StopEmote);
    assert_eq!(decoded.envelope.message.object_index, 2);
}

#[test]
fn rejects_bad_magic() {
    let codec = SyncCodec::default();
    let mut frame = codec
        .encode_frame(SyncChannel::LocalDebounced, &sample_play_envelope())
        .unwrap();
    frame[0] = b'X';

    let err = codec.decode_frame(&frame).unwrap_err();
    assert!(matches!(err, CodecError::InvalidMagic { .. }));
}

#[test]
fn rejects_unknown_channel_byte() {
    let codec = SyncCodec::default();
    let mut frame = codec
        .encode_frame(SyncChannel::LocalDebounced, &sample_play_envelope())
        .unwrap();
    frame[2] = 42;

    let err = codec.decode_frame(&frame).unwrap_err();
    assert!(matches!(err, CodecError::InvalidChannel(_)));
}

#[test]
fn rejects_version_mismatch_during_decode() {
    let compat_codec = SyncCodec::new(ProtocolVersion::new(2, 0), CodecLimits::default());
    let mut envelope = sample_play_envelope();
    envelope.version = ProtocolVersion::new(2, 0);

    let frame = compat_codec
        .encode_frame(SyncChannel::LocalImmediate, &envelope)
        .unwrap();

    let err = SyncCodec::default().decode_frame(&frame).unwrap_err();
    assert!(matches!(err, CodecError::VersionMismatch { .. }));
}

#[test]
fn rejects_oversized_frame() {
    let tiny_codec = SyncCodec::new(
        ProtocolVersion::new(1, 0),
        CodecLimits { max_frame_size: 8 },
    );

    let err = tiny_codec
        .encode_frame(SyncChannel::LocalImmediate, &sample_play_envelope())
        .unwrap_err();
    assert!(matches!(err, CodecError::FrameTooLarge { .. }));
}

#[test]
fn rejects_empty_frame() {
    let err = SyncCodec::default().decode_frame(&[]).unwrap_err();
    assert!(matches!(err, CodecError::EmptyFrame));
}

#[test]
fn control_messages_decode_from_both_pinned_opcodes() {
    let sit = ser::serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_SIT_OBJECT_EMOTE, 50, 0, 0));
    let cancel = ser::serialize(&PMSG_CLIENT_TRIGGER_RECV::new(SUBTYPE_CANCEL_EMOTE, 0, 0, 0));

    assert_eq!(
        decode_inbound(OPCODE_ACTOR_CONTROL, MessageDirection::Inbound, &sit).unwrap(),
        Some(ControlEvent::SitObjectEmote { emote_id: 50 })
    );
    assert_eq!(
        decode_inbound(OPCODE_CLIENT_TRIGGER, MessageDirection::Inbound, &cancel).unwrap(),
        Some(ControlEvent::CancelEmote)
    );
}
