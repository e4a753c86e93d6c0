// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![no_main]

use ani2png::{AniFile, DecodeConfig, Table, describe_ani_with_config};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let configs = [
        DecodeConfig::default().with_max_icons(64).with_peak_memory_limit(1 << 20),
        DecodeConfig::default().with_word_aligned_chunks(true).lenient(true),
    ];
    for config in &configs {
        if let Ok(ani) = AniFile::from_bytes_with_config(data, config) {
            for i in 0..ani.icons.len() {
                let _ = ani.icon_directory(i);
            }
        }
        if let Ok(narration) = describe_ani_with_config(data, config) {
            let table: Table<'_> = narration.filter_map(Result::ok).collect();
            let _ = table.to_string();
        }
    }
});
