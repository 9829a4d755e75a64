//! Property tests for the leading-token classifier

use proptest::prelude::*;
use rk_lexer::{Classification, DeclarationKind, classify, tokenize};

fn class_leader() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("class"),
        Just("object"),
        Just("interface"),
        Just("sealed class"),
        Just("enum class"),
        Just("annotation class"),
        Just("companion object"),
        Just("data class"),
    ]
}

fn control_flow_leader() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("return"),
        Just("if"),
        Just("when"),
        Just("throw"),
        Just("break"),
        Just("continue"),
        Just("try"),
        Just("for"),
        Just("while"),
        Just("do"),
    ]
}

fn trivia() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just(" ".to_string()),
            Just("\n".to_string()),
            Just("\t".to_string()),
            Just("// comment\n".to_string()),
            Just("/* block */".to_string()),
            Just("/** doc */".to_string()),
        ],
        0..4,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn class_leaders_classify_as_class(
        lead in trivia(),
        keyword in class_leader(),
        name in "[A-Z][a-zA-Z0-9]{0,8}",
    ) {
        let fragment = format!("{lead}{keyword} {name}");
        prop_assert_eq!(classify(&fragment), Classification::Declaration(DeclarationKind::Class));
    }

    #[test]
    fn control_flow_is_never_a_declaration(
        lead in trivia(),
        keyword in control_flow_leader(),
        rest in "[ a-z0-9(){}]{0,12}",
    ) {
        let fragment = format!("{lead}{keyword} {rest}");
        let classification = classify(&fragment);
        prop_assert!(classification.is_expression());
        prop_assert_eq!(classification.declaration_kind(), DeclarationKind::None);
    }

    #[test]
    fn classification_ignores_everything_after_first_token(
        keyword in prop_oneof![Just("fun"), Just("val"), Just("typealias")],
        tail in "[ a-zA-Z0-9#$@!]{0,16}",
    ) {
        let alone = classify(keyword);
        let with_tail = classify(&format!("{keyword} {tail}"));
        prop_assert_eq!(alone, with_tail);
    }

    #[test]
    fn tokenizing_identifiers_never_fails(words in prop::collection::vec("[a-z_][a-z0-9_]{0,6}", 0..8)) {
        let source = words.join(" ");
        let tokens = tokenize(&source).expect("identifiers and keywords always lex");
        prop_assert_eq!(tokens.len(), words.len() + 1);
    }
}
