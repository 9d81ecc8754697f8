use chrono::Utc;
use criterion::{Criterion, black_box, criterion_group, criterion_main};

use keytrace::client::api::StoredKeystroke;
use keytrace::client::reconcile::reconcile;
use keytrace::keyboard::finger::qwerty_finger;
use keytrace::session::Mode;
use keytrace::session::metrics::SessionMetrics;
use keytrace::session::record::{Keystroke, RecordedKeystroke, Session, with_durations};

const TEXT: &str = "the quick brown fox jumps over the lazy dog ";

fn make_keystrokes(count: usize) -> Vec<Keystroke> {
    let chars: Vec<char> = TEXT.chars().collect();
    (0..count)
        .map(|i| Keystroke {
            key: chars[i % chars.len()],
            timestamp: 1_000.0 + i as f64 * 140.0 + (i % 13) as f64 * 9.0,
            prev_key: i.checked_sub(1).map(|p| chars[p % chars.len()]),
            index: i,
        })
        .collect()
}

fn stored(keystrokes: &[RecordedKeystroke]) -> Vec<StoredKeystroke> {
    keystrokes
        .iter()
        .enumerate()
        .map(|(i, rk)| {
            let finger = qwerty_finger(rk.keystroke.key);
            StoredKeystroke {
                id: Some(i as i64 + 1),
                key: rk.keystroke.key.to_string(),
                prev_key: rk.keystroke.prev_key.map(|c| c.to_string()),
                timestamp: rk.keystroke.timestamp / 1000.0,
                finger: Some(finger.as_str().to_string()),
                hand: Some(finger.hand().as_str().to_string()),
            }
        })
        .collect()
}

fn bench_positional(c: &mut Criterion) {
    let local = with_durations(&make_keystrokes(500));
    let server = stored(&local);

    c.bench_function("reconcile positional (500 keystrokes)", |b| {
        b.iter(|| {
            let mut client = local.clone();
            reconcile(black_box(&mut client), black_box(&server))
        })
    });
}

fn bench_skewed(c: &mut Criterion) {
    let local = with_durations(&make_keystrokes(500));
    // Server dropped every space, so most records land off-position.
    let server: Vec<StoredKeystroke> = stored(&local)
        .into_iter()
        .filter(|s| s.key != " ")
        .collect();

    c.bench_function("reconcile skewed fallback (500 keystrokes)", |b| {
        b.iter(|| {
            let mut client = local.clone();
            reconcile(black_box(&mut client), black_box(&server))
        })
    });
}

fn bench_metrics(c: &mut Criterion) {
    let keystrokes = make_keystrokes(2_000);
    let session = Session::assemble(Mode::Top200, TEXT, &keystrokes, 1_000.0, Utc::now());

    c.bench_function("session metrics (2K keystrokes)", |b| {
        b.iter(|| SessionMetrics::from_session(black_box(&session)))
    });
}

criterion_group!(benches, bench_positional, bench_skewed, bench_metrics);
criterion_main!(benches);
