//! Integration tests for batch semantics over in-memory maps.

use ipnet::IpNet;
use prefilter::cidrmap::MemoryMapOpener;
use prefilter::{parse_cidr, Error, PreFilter, PreFilterConfig};
use std::sync::Arc;
use std::thread;

fn prefilter() -> PreFilter {
    let prefilter = PreFilter::new(&PreFilterConfig::new(true), Box::new(MemoryMapOpener));
    prefilter.start().unwrap();
    prefilter
}

fn cidrs(list: &[&str]) -> Vec<IpNet> {
    list.iter().map(|s| parse_cidr(s).unwrap()).collect()
}

fn snapshot(prefilter: &PreFilter) -> Vec<String> {
    let (mut entries, _) = prefilter.dump(Vec::new());
    entries.sort();
    entries
}

#[test]
fn test_round_trip_restores_content() {
    let prefilter = prefilter();
    let before = snapshot(&prefilter);

    let set = cidrs(&[
        "10.0.0.0/8",
        "192.168.1.1",
        "0.0.0.0/0",
        "fc00::/7",
        "2001:4860:4860::8888",
    ]);
    let rev = prefilter.insert(0, &set).unwrap();
    assert_eq!(snapshot(&prefilter).len(), set.len());

    let rev = prefilter.delete(rev, &set).unwrap();
    assert_eq!(rev, 3);
    assert_eq!(snapshot(&prefilter), before);
}

#[test]
fn test_revision_counts_successful_batches() {
    let prefilter = prefilter();
    let mut successes = 0;

    for i in 0..20u8 {
        let prefix = format!("10.{}.0.0/16", i);
        let cidr = cidrs(&[prefix.as_str()]);
        if prefilter.insert(0, &cidr).is_ok() {
            successes += 1;
        }
        // Duplicate always fails and must not count
        assert!(prefilter.insert(0, &cidr).is_err());
        if i % 2 == 0 && prefilter.delete(0, &cidr).is_ok() {
            successes += 1;
        }
    }

    assert_eq!(prefilter.revision(), 1 + successes);
}

#[test]
fn test_failed_batch_leaves_dump_unchanged() {
    let prefilter = prefilter();
    prefilter
        .insert(0, &cidrs(&["10.0.0.0/8", "2001:db8::/32"]))
        .unwrap();
    let (before, rev_before) = prefilter.dump(Vec::new());

    // Fails on the last element, after three successful inserts
    let err = prefilter
        .insert(
            0,
            &cidrs(&["172.16.0.0/12", "172.16.0.1", "fd00::1", "2001:db8::/32"]),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Insert { .. }));

    let (after, rev_after) = prefilter.dump(Vec::new());
    assert_eq!(after, before);
    assert_eq!(rev_after, rev_before);
}

#[test]
fn test_stale_revision_then_resync() {
    let prefilter = prefilter();
    prefilter.insert(0, &cidrs(&["10.0.0.0/8"])).unwrap();

    let batch = cidrs(&["192.168.0.0/16"]);
    let current = match prefilter.insert(1, &batch) {
        Err(Error::StaleRevision { current, expected }) => {
            assert_eq!(expected, 1);
            current
        }
        other => panic!("expected stale revision, got {:?}", other),
    };
    assert_eq!(snapshot(&prefilter), vec!["10.0.0.0/8"]);

    assert_eq!(prefilter.insert(current, &batch).unwrap(), current + 1);
}

#[test]
fn test_disabled_prefilter_is_inert() {
    let prefilter = PreFilter::new(&PreFilterConfig::default(), Box::new(MemoryMapOpener));
    prefilter.start().unwrap();

    for batch in [cidrs(&[]), cidrs(&["10.0.0.0/8"])] {
        assert!(matches!(prefilter.insert(0, &batch), Err(Error::Disabled)));
        assert!(matches!(prefilter.delete(7, &batch), Err(Error::Disabled)));
    }
    assert_eq!(prefilter.dump(Vec::new()), (Vec::<String>::new(), 0));
}

#[test]
fn test_concurrent_batches_are_serialized() {
    let prefilter = Arc::new(prefilter());
    let threads = 8;
    let per_thread = 25;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let prefilter = Arc::clone(&prefilter);
            thread::spawn(move || {
                for i in 0..per_thread {
                    let net = format!("10.{}.{}.0/24", t, i);
                    let host = format!("10.{}.{}.1", t, i);
                    let batch = cidrs(&[net.as_str(), host.as_str()]);
                    prefilter.insert(0, &batch).unwrap();
                    let (entries, _) = prefilter.dump(Vec::new());
                    // A batch is never observed half-applied
                    assert_eq!(entries.len() % 2, 0);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let (entries, revision) = prefilter.dump(Vec::new());
    assert_eq!(entries.len(), threads * per_thread * 2);
    assert_eq!(revision, 1 + (threads * per_thread) as u64);
}

#[test]
fn test_optimistic_writers_conflict() {
    let prefilter = prefilter();
    let seen = prefilter.revision();

    prefilter.insert(seen, &cidrs(&["10.0.0.0/8"])).unwrap();
    let err = prefilter.insert(seen, &cidrs(&["11.0.0.0/8"])).unwrap_err();
    assert!(matches!(err, Error::StaleRevision { .. }));
}
