//! `seek(L)` followed by `next` yields exactly line `L` of a linear scan.

use proptest::prelude::*;
use wordfeed::PW_MAX;

use crate::{cases, next_word, Fixture};

fn line_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        8 => "[a-zA-Z0-9 ]{1,16}".prop_map(String::into_bytes),
        1 => "[a-z]{250,300}".prop_map(String::into_bytes),
        1 => "[a-z]{1,6}\r".prop_map(String::into_bytes),
    ]
}

fn expected(line: &[u8]) -> Vec<u8> {
    let mut end = line.len();
    while end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    line[..end.min(PW_MAX)].to_vec()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(cases()))]

    #[test]
    fn seek_matches_linear_scan(
        lines in prop::collection::vec(line_strategy(), 1..300),
        trailing_newline in any::<bool>(),
        step in 1u64..40,
        build_index in any::<bool>(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..40),
    ) {
        let mut fixture = Fixture::new(&lines, trailing_newline, step);
        if build_index {
            prop_assert_eq!(fixture.host.global_keyspace().unwrap(), lines.len() as u64);
        }

        let mut linear = fixture.host.thread_init(0).unwrap();
        let mut scanned = Vec::new();
        while let Some(word) = next_word(&mut linear) {
            scanned.push(word);
        }
        let reference: Vec<Vec<u8>> = lines.iter().map(|l| expected(l)).collect();
        prop_assert_eq!(&scanned, &reference);

        let mut device = fixture.host.thread_init(1).unwrap();
        for pick in picks {
            let target = pick.index(lines.len());
            device.seek(target as u64).unwrap();
            prop_assert_eq!(device.line(), target as u64);
            prop_assert_eq!(next_word(&mut device), Some(scanned[target].clone()));
        }
    }
}
