use criterion::{Criterion, black_box, criterion_group, criterion_main};
use protocol::header::MessageDirection;
use protocol::packets::{
    OPCODE_ACTOR_CONTROL, PMSG_ACTOR_CONTROL_RECV, SUBTYPE_START_POSE, decode_inbound,
};
use protocol::{SyncAction, SyncChannel, SyncCodec, SyncEnvelope, SyncMessage, ser};

fn sample_envelope() -> SyncEnvelope {
    SyncEnvelope::new(
        0xDEAD_BEEF,
        42,
        SyncMessage::new(SyncAction::PlayEmote, 0x1040_0001, 0, 0x0040_0000_1234_5678, 214),
    )
}

fn bench_sync_codec(c: &mut Criterion) {
    let codec = SyncCodec::default();
    let envelope = sample_envelope();
    let frame = codec
        .encode_frame(SyncChannel::LocalDebounced, &envelope)
        .expect("encode");

    c.bench_function("sync_encode_frame", |b| {
        b.iter(|| {
            codec
                .encode_frame(black_box(SyncChannel::LocalDebounced), black_box(&envelope))
                .expect("encode")
        })
    });

    c.bench_function("sync_decode_frame", |b| {
        b.iter(|| codec.decode_frame(black_box(&frame)).expect("decode"))
    });
}

fn bench_control_decode(c: &mut Criterion) {
    let payload = ser::serialize(&PMSG_ACTOR_CONTROL_RECV::new(SUBTYPE_START_POSE, 2, 0, 0));

    c.bench_function("decode_inbound_start_pose", |b| {
        b.iter(|| {
            decode_inbound(
                black_box(OPCODE_ACTOR_CONTROL),
                MessageDirection::Inbound,
                black_box(&payload),
            )
            .expect("decode")
        })
    });
}

criterion_group!(benches, bench_sync_codec, bench_control_decode);
criterion_main!(benches);
