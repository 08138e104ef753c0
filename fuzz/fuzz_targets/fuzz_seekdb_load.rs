//! Fuzz `SeekDbCache::try_load` with arbitrary side-file contents.
//!
//! Writes random bytes where the cache expects an entry, then loads it
//! through `fuzz_try_load`. Goal: no panics and no huge allocations from a
//! forged entry count. Random input should essentially never load.
#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Fresh directory per iteration so files don't accumulate.
    let dir = tempfile::tempdir().unwrap();
    let _ = wordfeed::fuzz_try_load(dir.path(), data);
});
