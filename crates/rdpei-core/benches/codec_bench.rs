//! Criterion benchmarks for the input channel codec.
//!
//! A full touch frame (64 contacts with every optional field) is the worst
//! case the client produces every 20 ms; it should stay far below that budget.
//!
//! Run with:
//! ```bash
//! cargo bench --package rdpei-core --bench codec_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rdpei_core::protocol::codec::{decode_pdu, encode_pdu};
use rdpei_core::protocol::messages::{
    ContactFlags, ContactRect, CsReadyPdu, PenContact, PenEventPdu, PenFlags, PenFrame, RdpeiPdu,
    ScReadyPdu, TouchContact, TouchEventPdu, TouchFrame, PROTOCOL_V300,
};

// ── PDU fixtures ──────────────────────────────────────────────────────────────

fn make_touch_frame(contacts: u8) -> RdpeiPdu {
    let contacts = (0..contacts)
        .map(|id| {
            let x = 100 + i32::from(id) * 25;
            let y = 900 - i32::from(id) * 10;
            TouchContact {
                contact_id: id,
                x,
                y,
                contact_flags: ContactFlags::ONGOING,
                rect: Some(ContactRect {
                    left: (x - 2) as i16,
                    top: (y - 2) as i16,
                    right: (x + 2) as i16,
                    bottom: (y + 2) as i16,
                }),
                orientation: Some(u32::from(id) * 5),
                pressure: Some(512),
            }
        })
        .collect();
    RdpeiPdu::Touch(TouchEventPdu {
        encode_time: 20,
        frames: vec![TouchFrame {
            frame_offset: 20_000,
            contacts,
        }],
    })
}

fn make_pen_frame() -> RdpeiPdu {
    RdpeiPdu::Pen(PenEventPdu {
        encode_time: 20,
        frames: vec![PenFrame {
            frame_offset: 20,
            contacts: vec![PenContact {
                device_id: 0,
                x: 1200,
                y: 700,
                contact_flags: ContactFlags::ONGOING,
                pen_flags: Some(PenFlags::BARREL_PRESSED),
                pressure: Some(800),
                rotation: Some(45),
                tilt_x: Some(-20),
                tilt_y: Some(15),
            }],
        }],
    })
}

fn make_sc_ready() -> RdpeiPdu {
    RdpeiPdu::ScReady(ScReadyPdu {
        protocol_version: PROTOCOL_V300,
        features: Some(1),
    })
}

fn make_cs_ready() -> RdpeiPdu {
    RdpeiPdu::CsReady(CsReadyPdu {
        flags: 0x7,
        protocol_version: PROTOCOL_V300,
        max_touch_contacts: 64,
    })
}

fn fixtures() -> Vec<(&'static str, RdpeiPdu)> {
    vec![
        ("Touch(1)", make_touch_frame(1)),
        ("Touch(10)", make_touch_frame(10)),
        ("Touch(64)", make_touch_frame(64)),
        ("Pen", make_pen_frame()),
        ("ScReady", make_sc_ready()),
        ("CsReady", make_cs_ready()),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks `encode_pdu` for every fixture.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_pdu");
    for (name, pdu) in fixtures() {
        group.bench_with_input(BenchmarkId::new("pdu", name), &pdu, |b, pdu| {
            b.iter(|| encode_pdu(black_box(pdu)).expect("encode must succeed"))
        });
    }
    group.finish();
}

/// Benchmarks `decode_pdu` from pre-encoded bytes.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_pdu");
    for (name, pdu) in fixtures() {
        let bytes = encode_pdu(&pdu).expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("pdu", name), &bytes, |b, bytes| {
            b.iter(|| decode_pdu(black_box(bytes)).expect("decode must succeed"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
