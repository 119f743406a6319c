#![no_main]
use libfuzzer_sys::fuzz_target;
use roto_core::protocol::{Command, REPORT_LEN, Reassembler};

fuzz_target!(|data: &[u8]| {
    // Feed the input as a stream of packets of varying size; any sequence
    // must decode or drop without panicking, and angles stay in range.
    let mut r = Reassembler::new();
    let mut rest = data;
    while let Some((&len, tail)) = rest.split_first() {
        let n = usize::from(len) % (REPORT_LEN + 1);
        let (packet, next) = tail.split_at(n.min(tail.len()));
        if let Some(state) = r.push(packet) {
            assert!((0..360).contains(&state.angle));
        }
        let _ = Command::parse(packet);
        rest = next;
    }
});
