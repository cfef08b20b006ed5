use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use redpacket_sync::model::{
    Address, ChainEvent, Distribution, EventId, EventKind, PacketId, TxHash,
};
use redpacket_sync::{Amount, Reconciler};

const WEI_PER_UNIT: u128 = 1_000_000_000_000_000_000;

/// Generates valid event sequences for benchmarking.
///
/// Pattern per packet: one creation followed by `claims_per_packet`
/// claims, each from a distinct address, draining one share and one
/// whole unit at a time. This keeps every event admissible.
pub struct EventGenerator {
    num_packets: PacketId,
    claims_per_packet: u32,
    current_packet: PacketId,
    current_step: u32,
}

impl EventGenerator {
    pub fn new(num_packets: PacketId, claims_per_packet: u32) -> Self {
        Self {
            num_packets,
            claims_per_packet,
            current_packet: 1,
            current_step: 0,
        }
    }
}

impl Iterator for EventGenerator {
    type Item = ChainEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_packet > self.num_packets {
            return None;
        }

        let packet = self.current_packet;
        let step = self.current_step;
        let tx = TxHash::new(format!("0x{packet:08x}{step:04x}"));

        let event = if step == 0 {
            ChainEvent::Created {
                id: EventId::new(EventKind::Created, tx, 0),
                packet,
                creator: Address::new(format!("0xc{packet:08x}")),
                total_amount: Amount::from_wei(self.claims_per_packet.max(1) as u128 * WEI_PER_UNIT),
                count: self.claims_per_packet.max(1),
                distribution: Distribution::Random,
                message: "bench".into(),
                timestamp: 1_700_000_000 + step as u64,
            }
        } else {
            let remaining = self.claims_per_packet - step;
            ChainEvent::Claimed {
                id: EventId::new(EventKind::Claimed, tx, 0),
                packet,
                claimer: Address::new(format!("0xd{packet:08x}{step:04x}")),
                amount: Amount::from_wei(WEI_PER_UNIT),
                remaining_count: remaining,
                remaining_amount: Amount::from_wei(remaining as u128 * WEI_PER_UNIT),
                timestamp: 1_700_000_000 + step as u64,
            }
        };

        self.current_step += 1;
        if self.current_step > self.claims_per_packet {
            self.current_step = 0;
            self.current_packet += 1;
        }

        Some(event)
    }
}

fn bench_create_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("creates");

    for count in [1_000u64, 10_000, 100_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut reconciler = Reconciler::new();
                let generator = EventGenerator::new(count, 0);
                for event in generator {
                    let _ = black_box(reconciler.apply(event));
                }
                reconciler
            });
        });
    }

    group.finish();
}

fn bench_mixed_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");

    for (packets, claims_per) in [(1_000u64, 10u32), (100, 100), (10_000, 4)] {
        let label = format!("{}p_{}c", packets, claims_per);
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(packets, claims_per),
            |b, &(packets, claims_per)| {
                b.iter(|| {
                    let mut reconciler = Reconciler::new();
                    let generator = EventGenerator::new(packets, claims_per);
                    for event in generator {
                        let _ = black_box(reconciler.apply(event));
                    }
                    reconciler
                });
            },
        );
    }

    group.finish();
}

fn bench_replayed_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("replayed");
    group.sample_size(10);

    // every event delivered twice: half the stream is dedup work
    group.bench_function("10k_duplicated", |b| {
        let events: Vec<ChainEvent> = EventGenerator::new(1_000, 9).collect();
        b.iter(|| {
            let mut reconciler = Reconciler::new();
            for event in events.iter().flat_map(|e| [e.clone(), e.clone()]) {
                let _ = black_box(reconciler.apply(event));
            }
            reconciler
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_create_only,
    bench_mixed_events,
    bench_replayed_events,
);

criterion_main!(benches);
