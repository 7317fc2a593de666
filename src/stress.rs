//! Stress Driver
//!
//! Runs concurrent writers and readers against one registry and checks that
//! every reader only ever sees complete, internally consistent data.
//!
//! ## Payload Format
//! ```text
//! ┌──────────┬──────────┬──────────────────┬──────────┐
//! │ Key (8)  │ Seq (8)  │ Body (pattern)   │ CRC (4)  │
//! └──────────┴──────────┴──────────────────┴──────────┘
//! ```
//! Key and sequence are little endian; the CRC32 covers everything before
//! it. A torn, stale-freed or misfiled payload fails the check.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;

use crate::boundary::{ArenaBoundary, Destination, RemoteAddr};
use crate::config::{Config, MAX_GROUPS};
use crate::error::{ErrorKind, Result, StoreError};
use crate::index::Key;
use crate::reclaim::ReclaimStats;
use crate::registry::{GroupId, Registry};

/// Fixed bytes around the body: key, sequence, checksum
pub const PAYLOAD_OVERHEAD: usize = 8 + 8 + 4;

/// Base address of the simulated reader address space
const ARENA_BASE: RemoteAddr = 0x1000_0000;

/// Workload parameters
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Groups to allocate and exercise (1..=MAX_GROUPS)
    pub groups: usize,

    /// Writer threads per group
    pub writers_per_group: usize,

    /// Reader threads (each reads every group)
    pub readers: usize,

    /// Distinct keys per group
    pub keys: u64,

    /// Operations issued by each writer
    pub ops_per_writer: u64,

    /// Every n-th writer operation is a remove (0 disables removes)
    pub remove_every: u64,

    /// Payload size in bytes, at least PAYLOAD_OVERHEAD
    pub payload_len: usize,

    /// Passed through to [`Config::eager_reclaim`]
    pub eager_reclaim: bool,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            groups: 2,
            writers_per_group: 2,
            readers: 4,
            keys: 64,
            ops_per_writer: 10_000,
            remove_every: 5,
            payload_len: 64,
            eager_reclaim: false,
        }
    }
}

/// Outcome of a stress run
#[derive(Debug, Clone, Default)]
pub struct StressReport {
    pub puts: u64,
    pub removes: u64,
    pub gets: u64,
    pub reads: u64,
    pub lists: u64,
    pub scans: u64,
    pub violations: u64,

    /// Entry count of each group at the end of the run
    pub final_sizes: Vec<usize>,

    /// Reclamation counters after a final quiesce
    pub reclaim: ReclaimStats,
}

impl StressReport {
    pub fn is_clean(&self) -> bool {
        self.violations == 0
    }
}

#[derive(Default)]
struct Tally {
    puts: AtomicU64,
    removes: AtomicU64,
    gets: AtomicU64,
    reads: AtomicU64,
    lists: AtomicU64,
    scans: AtomicU64,
    violations: AtomicU64,
}

impl Tally {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn violation(&self, what: std::fmt::Arguments<'_>) {
        tracing::error!("violation: {}", what);
        Self::bump(&self.violations);
    }
}

// =============================================================================
// Payload Encoding
// =============================================================================

/// Build a self-validating payload of `len` bytes for `key`
pub fn encode_payload(key: Key, seq: u64, len: usize) -> Vec<u8> {
    let len = len.max(PAYLOAD_OVERHEAD);
    let mut payload = Vec::with_capacity(len);
    payload.extend_from_slice(&key.to_le_bytes());
    payload.extend_from_slice(&seq.to_le_bytes());
    let body = len - PAYLOAD_OVERHEAD;
    payload.extend((0..body).map(|i| (seq as u8).wrapping_add(i as u8)));
    let crc = crc32fast::hash(&payload);
    payload.extend_from_slice(&crc.to_le_bytes());
    payload
}

/// Check a payload produced by [`encode_payload`]; returns its sequence
pub fn verify_payload(key: Key, payload: &[u8]) -> std::result::Result<u64, String> {
    if payload.len() < PAYLOAD_OVERHEAD {
        return Err(format!("payload of {} bytes is too short", payload.len()));
    }

    let (data, crc) = payload.split_at(payload.len() - 4);
    let expected = u32::from_le_bytes([crc[0], crc[1], crc[2], crc[3]]);
    let actual = crc32fast::hash(data);
    if expected != actual {
        return Err(format!("crc mismatch: stored {:#010x}, computed {:#010x}", expected, actual));
    }

    let mut word = [0u8; 8];
    word.copy_from_slice(&data[..8]);
    let stored_key = u64::from_le_bytes(word);
    if stored_key != key {
        return Err(format!("payload belongs to key {}, found under {}", stored_key, key));
    }

    word.copy_from_slice(&data[8..16]);
    Ok(u64::from_le_bytes(word))
}

/// Small xorshift generator; reproducible per thread
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

// =============================================================================
// Runner
// =============================================================================

/// Run the workload and collect a report
pub fn run(config: &StressConfig) -> Result<StressReport> {
    if config.groups == 0 || config.groups > MAX_GROUPS {
        return Err(StoreError::Config(format!(
            "stress groups must be between 1 and {}, got {}",
            MAX_GROUPS, config.groups
        )));
    }
    if config.keys == 0 || config.payload_len < PAYLOAD_OVERHEAD {
        return Err(StoreError::Config(format!(
            "stress needs at least one key and payloads of {} bytes or more",
            PAYLOAD_OVERHEAD
        )));
    }

    let registry = Registry::init(
        Config::builder()
            .max_groups(config.groups)
            .eager_reclaim(config.eager_reclaim)
            .build(),
    )?;
    let groups = (0..config.groups)
        .map(|_| registry.allocate_group())
        .collect::<Result<Vec<_>>>()?;

    // One private window per reader, large enough for a payload or a key list
    let slot_size = config.payload_len.max(config.keys as usize * 8);
    let arena = ArenaBoundary::new(ARENA_BASE, slot_size * config.readers.max(1));

    let tally = Tally::default();
    let writers_left = AtomicUsize::new(config.groups * config.writers_per_group);
    let done = AtomicBool::new(config.groups * config.writers_per_group == 0);

    tracing::info!(
        "stress: {} groups x {} writers, {} readers, {} keys, {} ops per writer",
        config.groups,
        config.writers_per_group,
        config.readers,
        config.keys,
        config.ops_per_writer
    );

    thread::scope(|scope| {
        for (g, &group) in groups.iter().enumerate() {
            for w in 0..config.writers_per_group {
                let seed = (g * config.writers_per_group + w) as u64 + 1;
                let (registry, tally, writers_left, done) = (&registry, &tally, &writers_left, &done);
                scope.spawn(move || {
                    write_loop(registry, group, seed, config, tally);
                    if writers_left.fetch_sub(1, Ordering::AcqRel) == 1 {
                        done.store(true, Ordering::Release);
                    }
                });
            }
        }

        for r in 0..config.readers {
            let addr = ARENA_BASE + (r * slot_size) as RemoteAddr;
            let (registry, groups, arena, tally, done) = (&registry, &groups, &arena, &tally, &done);
            scope.spawn(move || {
                let mut rng = XorShift::new(0xABCD + r as u64);
                // At least one full pass even when there are no writers
                loop {
                    let finished = done.load(Ordering::Acquire);
                    for &group in groups {
                        read_pass(registry, group, &mut rng, config, arena, addr, tally);
                    }
                    if finished {
                        break;
                    }
                }
            });
        }
    });

    let mut final_sizes = Vec::with_capacity(groups.len());
    for &group in &groups {
        let snapshot = registry.snapshot(group)?;
        if !snapshot.index().is_strictly_ascending() {
            tally.violation(format_args!("group {} final index out of order", group));
        }
        final_sizes.push(snapshot.len());
    }

    let reclaim = registry.quiesce();
    let report = StressReport {
        puts: tally.puts.into_inner(),
        removes: tally.removes.into_inner(),
        gets: tally.gets.into_inner(),
        reads: tally.reads.into_inner(),
        lists: tally.lists.into_inner(),
        scans: tally.scans.into_inner(),
        violations: tally.violations.into_inner(),
        final_sizes,
        reclaim,
    };

    tracing::info!(
        "stress finished: {} puts, {} removes, {} gets, {} reads, {} lists, {} scans, {} violations",
        report.puts,
        report.removes,
        report.gets,
        report.reads,
        report.lists,
        report.scans,
        report.violations
    );
    Ok(report)
}

fn write_loop(registry: &Registry, group: GroupId, seed: u64, config: &StressConfig, tally: &Tally) {
    let mut rng = XorShift::new(seed);

    for op in 1..=config.ops_per_writer {
        let key = rng.next_u64() % config.keys;

        if config.remove_every != 0 && op % config.remove_every == 0 {
            match registry.remove(group, key) {
                Ok(entry) => {
                    Tally::bump(&tally.removes);
                    if let Err(why) = verify_payload(key, entry.payload()) {
                        tally.violation(format_args!("group {} removed key {}: {}", group, key, why));
                    }
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => tally.violation(format_args!("group {} remove {}: {}", group, key, e)),
            }
            continue;
        }

        let payload = encode_payload(key, (seed << 32) | op, config.payload_len);
        match registry.put(group, key, &payload) {
            Ok(_) => Tally::bump(&tally.puts),
            Err(e) => tally.violation(format_args!("group {} put {}: {}", group, key, e)),
        }
    }
}

fn read_pass(
    registry: &Registry,
    group: GroupId,
    rng: &mut XorShift,
    config: &StressConfig,
    arena: &ArenaBoundary,
    addr: RemoteAddr,
    tally: &Tally,
) {
    let key = rng.next_u64() % config.keys;

    // Point lookup
    match registry.get(group, key) {
        Ok(entry) => {
            Tally::bump(&tally.gets);
            if let Err(why) = verify_payload(key, entry.payload()) {
                tally.violation(format_args!("group {} get {}: {}", group, key, why));
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tally.violation(format_args!("group {} get {}: {}", group, key, e)),
    }

    // Whole-payload read across the boundary
    match registry.read(group, key, 0, config.payload_len, Destination::remote(arena, addr)) {
        Ok(n) => {
            Tally::bump(&tally.reads);
            match arena.load(addr, n) {
                Ok(bytes) => {
                    if let Err(why) = verify_payload(key, &bytes) {
                        tally.violation(format_args!("group {} read {}: {}", group, key, why));
                    }
                }
                Err(fault) => tally.violation(format_args!("arena reload failed: {}", fault)),
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tally.violation(format_args!("group {} read {}: {}", group, key, e)),
    }

    // Key listing across the boundary
    let capacity = config.keys as usize;
    match registry.list_keys(group, capacity, Destination::remote(arena, addr)) {
        Ok(count) => {
            Tally::bump(&tally.lists);
            match arena.load_keys(addr, count) {
                Ok(keys) => {
                    if !keys.windows(2).all(|pair| pair[0] < pair[1]) {
                        tally.violation(format_args!("group {} list_keys not ascending", group));
                    }
                    if keys.iter().any(|&k| k >= config.keys) {
                        tally.violation(format_args!("group {} list_keys returned unknown key", group));
                    }
                }
                Err(fault) => tally.violation(format_args!("arena reload failed: {}", fault)),
            }
        }
        Err(e) => tally.violation(format_args!("group {} list_keys: {}", group, e)),
    }

    // Ordered scan of one snapshot
    let mut previous: Option<Key> = None;
    let scan = registry.for_each(group, |entry| {
        if previous.is_some_and(|p| p >= entry.key()) {
            return ControlFlow::Break(format!("key {} after {:?}", entry.key(), previous));
        }
        if entry.group() != group {
            return ControlFlow::Break(format!("entry of group {} in group {}", entry.group(), group));
        }
        if let Err(why) = verify_payload(entry.key(), entry.payload()) {
            return ControlFlow::Break(why);
        }
        previous = Some(entry.key());
        ControlFlow::Continue(())
    });
    match scan {
        Ok(ControlFlow::Continue(())) => Tally::bump(&tally.scans),
        Ok(ControlFlow::Break(why)) => tally.violation(format_args!("group {} scan: {}", group, why)),
        Err(e) => tally.violation(format_args!("group {} scan: {}", group, e)),
    }
}
