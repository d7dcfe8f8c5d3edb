//! Benchmarks for the keyword intent classifier.
//!
//! The keyword pass runs on every utterance before any gateway is touched,
//! so it should stay well under a millisecond per message.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use mentor_chat::classifier::{extract_timeframe, IntentClassifier};

const UTTERANCES: &[&str] = &[
    "Remember that I prefer morning study sessions",
    "What do you know about my preferences?",
    "What are my meetings today?",
    "Forget that I live in Baker Hall",
    "What do you remember about my study habits and what's on my calendar next week?",
    "Am I free on Friday?",
    "Any exams on Oct 20th?",
    "Can you explain the difference between a stack and a queue?",
    "",
    "Note that my advisor is Dr. Patel",
];

fn bench_classify(c: &mut Criterion) {
    let classifier = IntentClassifier::default();

    let mut group = c.benchmark_group("intent_classifier");
    group.sample_size(200);
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("classify_single", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let verdict = classifier.classify(UTTERANCES[idx % UTTERANCES.len()]);
            idx += 1;
            verdict
        });
    });

    group.bench_function("classify_batch_10", |b| {
        b.iter(|| {
            UTTERANCES
                .iter()
                .map(|u| classifier.classify(u))
                .collect::<Vec<_>>()
        });
    });

    group.bench_function("extract_timeframe", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let tf = extract_timeframe(UTTERANCES[idx % UTTERANCES.len()]);
            idx += 1;
            tf
        });
    });

    group.finish();
}

/// Per-utterance p95 latency, asserted against a 1ms budget.
fn bench_classify_latency(_c: &mut Criterion) {
    let classifier = IntentClassifier::default();
    let target = Duration::from_micros(1000);

    // Warm the lazily compiled patterns.
    classifier.classify("warm up");

    let mut times = Vec::with_capacity(1000);
    for i in 0..1000 {
        let start = std::time::Instant::now();
        let _verdict = classifier.classify(UTTERANCES[i % UTTERANCES.len()]);
        times.push(start.elapsed());
    }

    times.sort();
    let p95 = times[949];
    let median = times[499];

    eprintln!("\n=== Intent classification latency (1000 utterances) ===");
    eprintln!("Median:  {:?}", median);
    eprintln!("p95:     {:?} (target: {:?})", p95, target);

    assert!(
        p95 < target,
        "classification p95 {:?} exceeds target {:?}",
        p95,
        target
    );
}

criterion_group!(benches, bench_classify, bench_classify_latency);
criterion_main!(benches);
