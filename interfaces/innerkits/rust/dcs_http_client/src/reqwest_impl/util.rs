/*
 * Copyright (c) 2022 Huawei Device Co., Ltd.
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::cell::Cell;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// Generates a random `multipart/form-data` boundary made of 64 hex digits.
pub(crate) fn gen_boundary() -> String {
    let [a, b, c, d] = [next(), next(), next(), next()];
    format!("{a:016x}-{b:016x}-{c:016x}-{d:016x}")
}

// xorshift64*, seeded per thread.
fn next() -> u64 {
    thread_local! {
        static STATE: Cell<u64> = Cell::new(seed());
    }

    STATE.with(|state| {
        let mut x = state.get();
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        state.set(x);
        x.wrapping_mul(0x2545_f491_4f6c_dd1d)
    })
}

// A zero state would stay zero forever.
fn seed() -> u64 {
    let keys = RandomState::new();
    (0usize..)
        .map(|salt| {
            let mut hasher = keys.build_hasher();
            hasher.write_usize(salt);
            hasher.finish()
        })
        .find(|&n| n != 0)
        .unwrap_or(0x9e37_79b9_7f4a_7c15)
}

#[cfg(test)]
mod ut_util {
    use super::gen_boundary;

    #[test]
    fn ut_gen_boundary() {
        let first = gen_boundary();
        let second = gen_boundary();
        assert_eq!(first.len(), 67);
        assert!(first
            .chars()
            .all(|c| c == '-' || c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
