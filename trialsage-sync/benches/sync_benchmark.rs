use criterion::{black_box, criterion_group, criterion_main, Criterion};
use trialsage_sync::api::DocumentRecord;
use trialsage_sync::protocol::{LiveEvent, QcStatus, Region};
use trialsage_sync::tree::{TreeStore, ROOT_ID};

fn documents(count: u64) -> Vec<DocumentRecord> {
    (1..=count)
        .map(|i| DocumentRecord {
            id: i,
            title: format!("Document {i}"),
            module: format!("m{}.{}", (i % 5) + 1, i % 9),
            qc_status: None,
        })
        .collect()
}

fn bench_event_parse(c: &mut Criterion) {
    let raw = r#"{"type":"qc_status","id":42,"status":"passed","profile":"FDA_eCTD"}"#;

    c.bench_function("parse_qc_status_event", |b| {
        b.iter(|| {
            black_box(LiveEvent::parse(black_box(raw)).unwrap());
        })
    });
}

fn bench_event_parse_unknown(c: &mut Criterion) {
    let raw = r#"{"type":"server_gossip","ttl":9,"payload":[1,2,3,4]}"#;

    c.bench_function("parse_unknown_event", |b| {
        b.iter(|| {
            black_box(LiveEvent::parse(black_box(raw)).unwrap());
        })
    });
}

fn bench_tree_load_1000(c: &mut Criterion) {
    let docs = documents(1000);

    c.bench_function("tree_load_1000_docs", |b| {
        b.iter(|| {
            let mut tree = TreeStore::new();
            tree.load(black_box(&docs), Region::Fda);
            black_box(tree.len());
        })
    });
}

fn bench_tree_move(c: &mut Criterion) {
    let docs = documents(1000);
    let mut tree = TreeStore::new();
    tree.load(&docs, Region::Fda);
    let folders: Vec<u64> = tree.children_of(ROOT_ID).to_vec();

    c.bench_function("tree_move_node", |b| {
        let mut target = 0usize;
        b.iter(|| {
            target = (target + 1) % folders.len();
            black_box(tree.move_node(black_box(500), folders[target], 0));
        })
    });
}

fn bench_merge_status(c: &mut Criterion) {
    let docs = documents(1000);
    let mut tree = TreeStore::new();
    tree.load(&docs, Region::Fda);

    c.bench_function("tree_merge_status", |b| {
        b.iter(|| {
            black_box(tree.merge_status(black_box(777), QcStatus::Passed, Some("FDA_eCTD")));
        })
    });
}

fn bench_to_ordered_list_1000(c: &mut Criterion) {
    let docs = documents(1000);
    let mut tree = TreeStore::new();
    tree.load(&docs, Region::Fda);

    c.bench_function("tree_ordered_list_1000_docs", |b| {
        b.iter(|| {
            black_box(tree.to_ordered_list());
        })
    });
}

criterion_group!(
    benches,
    bench_event_parse,
    bench_event_parse_unknown,
    bench_tree_load_1000,
    bench_tree_move,
    bench_merge_status,
    bench_to_ordered_list_1000,
);
criterion_main!(benches);
