/// Fuzzing tests for the thread-safe handles.
///
/// The fuzzing tests are heavy, and best run one at a time.
///
/// Reminder: to run only fuzzing tests, run `cargo test --test fuzz`.
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use bursty::BurstyBuilder;

use endor_shared::{SyncStrong, SyncWeak};

//  Change this variable to use a different number of threads.
const NUMBER_THREADS: usize = 8;

//  Change this variable to use a different number of clones per thread.
const NUMBER_CLONES: usize = 64;

#[test]
fn clone_storm() {
    //  The simplest fuzz test: clone, downgrade, and upgrade a single handle, coordinated across all threads.

    let destroyed = Arc::new(AtomicUsize::new(0));

    let shared = SyncStrong::new(Counter::new(42, &destroyed));

    let locals: Vec<(Vec<SyncStrong<Counter>>, Vec<SyncWeak<Counter>>)> =
        vec![(Vec::new(), Vec::new()); NUMBER_THREADS];

    let mut builder = BurstyBuilder::new(shared, locals);

    builder.add_simple_step(|| {
        |shared, local| {
            for _ in 0..NUMBER_CLONES {
                let strong = shared.clone();
                let weak = SyncStrong::downgrade(&strong);

                let upgraded = SyncWeak::upgrade(&weak).expect("alive");

                assert_eq!(42, upgraded.value);

                local.0.push(strong);
                local.1.push(weak);
            }
        }
    });

    let bursty = builder.launch(1);

    let shared = bursty.global();
    let locals = bursty.into_locals();

    assert_eq!(NUMBER_THREADS, locals.len());
    assert!(locals.iter().all(|local| local.0.len() == NUMBER_CLONES && local.1.len() == NUMBER_CLONES));

    assert_eq!(1 + NUMBER_THREADS * NUMBER_CLONES, SyncStrong::use_count(&shared));
    assert_eq!(NUMBER_THREADS * NUMBER_CLONES, SyncStrong::weak_count(&shared));
    assert_eq!(0, destroyed.load(Ordering::Relaxed));

    drop(locals);

    assert_eq!(1, SyncStrong::use_count(&shared));
    assert_eq!(0, SyncStrong::weak_count(&shared));
    assert_eq!(0, destroyed.load(Ordering::Relaxed));
}

#[test]
fn racing_promotion() {
    //  A high-contention test: all threads release their strong handle, then attempt to promote the global weak
    //  handle, racing against the destruction of the object.
    //
    //  Whichever thread releases the last strong handle, be it an original or a promoted one, destroys the object, and
    //  no promotion may succeed afterwards.

    for _ in 0..iterations() {
        let destroyed = Arc::new(AtomicUsize::new(0));

        let shared = SyncStrong::new(Counter::new(7, &destroyed));
        let weak = SyncStrong::downgrade(&shared);

        let locals: Vec<(Option<SyncStrong<Counter>>, bool)> = vec![(Some(shared.clone()), false); NUMBER_THREADS];

        drop(shared);

        let mut builder = BurstyBuilder::new(weak, locals);

        builder.add_simple_step(|| {
            |weak, local| {
                local.0 = None;

                let promoted = SyncWeak::lock(weak);

                if let Some(value) = SyncStrong::get(&promoted) {
                    assert_eq!(7, value.value);

                    local.1 = true;
                }
            }
        });

        let bursty = builder.launch(1);

        let weak = bursty.global();
        let locals = bursty.into_locals();

        assert!(locals.iter().all(|local| local.0.is_none()));

        assert_eq!(1, destroyed.load(Ordering::Relaxed));
        assert!(SyncWeak::expired(&weak));
        assert!(SyncWeak::upgrade(&weak).is_none());
    }
}

#[test]
fn racing_release() {
    //  A high-contention test: all threads release both their strong and weak handles simultaneously, racing to
    //  destroy the object and deallocate the control block.
    //
    //  Miri flags any double-free, or leak.

    for _ in 0..iterations() {
        let destroyed = Arc::new(AtomicUsize::new(0));

        let shared = SyncStrong::new(Counter::new(3, &destroyed));

        let locals: Vec<_> = (0..NUMBER_THREADS)
            .map(|i| {
                let strong = shared.clone();
                let weak = SyncStrong::downgrade(&shared);

                //  Alternate the release order, so that both orders race.
                (i % 2 == 0, Some(strong), Some(weak))
            })
            .collect();

        drop(shared);

        let mut builder = BurstyBuilder::new((), locals);

        builder.add_simple_step(|| {
            |_, local| {
                if local.0 {
                    local.1 = None;
                    local.2 = None;
                } else {
                    local.2 = None;
                    local.1 = None;
                }
            }
        });

        let bursty = builder.launch(1);

        let locals = bursty.into_locals();

        assert!(locals.iter().all(|local| local.1.is_none() && local.2.is_none()));
        assert_eq!(1, destroyed.load(Ordering::Relaxed));
    }
}

//  Too expensive for MIRI to run.
#[cfg(not(miri))]
#[test]
fn weak_churn() {
    //  A more idiomatic test: threads constantly downgrade and promote while one strong handle is held globally,
    //  hence every promotion must succeed.

    let destroyed = Arc::new(AtomicUsize::new(0));

    let shared = SyncStrong::new(Counter::new(5, &destroyed));

    let locals: Vec<usize> = vec![0; NUMBER_THREADS];

    let mut builder = BurstyBuilder::new(shared, locals);

    builder.add_simple_step(|| {
        |shared, local| {
            let mut weak = SyncWeak::empty();

            for _ in 0..4096 {
                SyncWeak::assign(&mut weak, shared);

                let promoted = SyncWeak::upgrade(&weak).expect("alive");

                *local += promoted.value as usize;

                SyncWeak::reset(&mut weak);
            }
        }
    });

    let bursty = builder.launch(1);

    let shared = bursty.global();
    let locals = bursty.into_locals();

    assert_eq!(1, SyncStrong::use_count(&shared));
    assert_eq!(0, SyncStrong::weak_count(&shared));
    assert_eq!(0, destroyed.load(Ordering::Relaxed));

    assert!(locals.iter().all(|&sum| sum == 5 * 4096), "{locals:?}");
}

fn iterations() -> usize {
    if cfg!(miri) {
        8
    } else {
        512
    }
}

#[derive(Debug)]
struct Counter {
    value: u32,
    destroyed: Arc<AtomicUsize>,
}

impl Counter {
    fn new(value: u32, destroyed: &Arc<AtomicUsize>) -> Self {
        let destroyed = destroyed.clone();

        Self { value, destroyed }
    }
}

impl Drop for Counter {
    fn drop(&mut self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }
}
