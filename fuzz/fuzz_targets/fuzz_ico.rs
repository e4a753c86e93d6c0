// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![no_main]

use ani2png::{IcoFile, Table, describe_ico, walk_png};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(ico) = IcoFile::from_bytes(data) {
        for (i, entry) in ico.directory.iter().enumerate() {
            let _ = ico.image_format(data, i);
            if let Some(range) = entry.data_range() {
                let _ = walk_png(data, range.start);
            }
        }
    }
    if let Ok(narration) = describe_ico(data) {
        let table: Table<'_> = narration.collect();
        let _ = table.to_string();
    }
});
