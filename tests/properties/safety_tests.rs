//! Decoders must reject malformed input with an error, never a panic.

use proptest::prelude::*;

use skillgate::codec;
use skillgate::install::{ContentValidator, SkillMdValidator};
use skillgate::target::TargetKind;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn decoders_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_manifest(&bytes);
        let _ = codec::decode_keyset(&bytes);
        let _ = codec::decode_snapshot(&bytes);
        let _ = codec::decode_legacy_store(&bytes);
    }

    #[test]
    fn skill_md_validator_never_panics(text in ".{0,400}", dir in "[a-z-]{1,20}") {
        for kind in TargetKind::ALL {
            let _ = SkillMdValidator.validate(&text, &dir, kind);
        }
    }

    #[test]
    fn frontmatter_like_text_never_panics(
        name in ".{0,40}",
        description in ".{0,80}",
    ) {
        let text = format!("---\nname: {name}\ndescription: {description}\n---\n");
        let _ = SkillMdValidator.validate(&text, "demo", TargetKind::Claude);
    }
}
