// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![no_main]

use ani2png::{Table, describe_png, walk_png};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Treat the first byte as the start offset to reach the sub-range path.
    let start = data.first().map_or(0, |&b| usize::from(b));
    if let Ok(walk) = walk_png(data, start) {
        for chunk in walk.chunks.iter() {
            assert!(chunk.payload.end <= data.len());
        }
    }
    if let Ok(narration) = describe_png(data, 0) {
        let table: Table<'_> = narration.collect();
        let _ = table.to_string();
    }
});
